//! A from-scratch line tokenizer (spec AMBIENT STACK's `Tokenizer`, supplementing
//! the distilled spec from the original `Tokenizer.cpp`/`TokenEnums.hpp`).
//!
//! Paren/symbol/string scanning is a pure, stateless walk over the source text;
//! string literals additionally pass through three transient sub-states
//! (string-merge on a trailing backslash, string-continue across embedded
//! newlines, and here-strings delimited by `#"..."#`) that never produce their own
//! `Token` variant — they only affect how the literal's text is accumulated before
//! a single `TokenType::String` token is emitted.

use std::rc::Rc;

use sexpc_core::{validate_parens, Diagnostic, EvalErrorKind, EvalResult, Token, TokenType, Tokenizer as TokenizerTrait};

enum StringScan {
    /// Plain scanning: the next `"` ends the literal.
    Plain,
    /// Saw a trailing unescaped `\` at end of line: the newline is dropped and
    /// scanning continues as if the line had never broken.
    Merge,
    /// Inside a `#"` here-string: only a closing `"#` ends the literal; nothing is
    /// escaped.
    HereString,
}

pub struct LineTokenizer;

impl LineTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LineTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizerTrait for LineTokenizer {
    fn tokenize(&self, source: &str, file_name: &str) -> EvalResult<Vec<Token>> {
        let tokens = tokenize_source(source, file_name)?;
        validate_parens(&tokens)?;
        Ok(tokens)
    }
}

fn is_symbol_terminator(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';'
}

fn tokenize_source(source: &str, file_name: &str) -> EvalResult<Vec<Token>> {
    let file: Rc<str> = Rc::from(file_name);
    let mut tokens = Vec::new();
    let mut line_no: u32 = 1;
    let mut col: u32 = 0;

    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line_no += 1;
                col = 0;
                i += 1;
            }
            ';' => {
                // Line comment: skip to end of line, not emitted as a token.
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                    col += 1;
                }
            }
            c if c.is_whitespace() => {
                i += 1;
                col += 1;
            }
            '(' => {
                tokens.push(Token::new(TokenType::OpenParen, "(", file.clone(), line_no, col, col + 1));
                i += 1;
                col += 1;
            }
            ')' => {
                tokens.push(Token::new(TokenType::CloseParen, ")", file.clone(), line_no, col, col + 1));
                i += 1;
                col += 1;
            }
            '"' => {
                let start_line = line_no;
                let start_col = col;
                let (text, consumed, lines_advanced, end_col) = scan_string(&chars, i, false, col + 1, &file, start_line, start_col)?;
                tokens.push(Token::new(TokenType::String, text, file.clone(), start_line, start_col, end_col));
                i += consumed;
                line_no += lines_advanced;
                col = end_col;
            }
            '#' if chars.get(i + 1) == Some(&'"') => {
                let start_line = line_no;
                let start_col = col;
                let (text, consumed, lines_advanced, end_col) = scan_string(&chars, i + 1, true, col + 2, &file, start_line, start_col)?;
                tokens.push(Token::new(TokenType::String, text, file.clone(), start_line, start_col, end_col));
                i += consumed + 1;
                line_no += lines_advanced;
                col = end_col;
            }
            _ => {
                let start = i;
                let start_col = col;
                while i < chars.len() && !is_symbol_terminator(chars[i]) {
                    i += 1;
                    col += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::new(TokenType::Symbol, text, file.clone(), line_no, start_col, col));
            }
        }
    }

    Ok(tokens)
}

/// Scans a string literal body starting just past its opening quote, handling
/// backslash-newline merges, bare multi-line continuation, and (when
/// `here_string` is set) a `"#`-terminated here-string body instead of a
/// single `"`.
///
/// Returns (text, chars consumed including the opening and closing delimiter,
/// newlines advanced, resulting column). `col_after_open` is the column
/// immediately following the opening delimiter, so the returned column stays
/// correct even when the literal contains no embedded newline. `open_file`/
/// `open_line`/`open_col` are only used to blame an unterminated literal on
/// where it started.
fn scan_string(
    chars: &[char],
    open_quote_index: usize,
    here_string: bool,
    col_after_open: u32,
    open_file: &Rc<str>,
    open_line: u32,
    open_col: u32,
) -> EvalResult<(String, usize, u32, u32)> {
    let mut text = String::new();
    let mut i = open_quote_index + 1;
    let mut lines_advanced = 0u32;
    let mut col = col_after_open;
    let mut scan = StringScan::Plain;

    loop {
        if i >= chars.len() {
            return Err(Diagnostic {
                blame: sexpc_core::Blame { file: open_file.to_string(), line: open_line, column_start: open_col },
                kind: EvalErrorKind::LexicalError("unterminated string literal".to_string()),
                note: None,
            });
        }
        let c = chars[i];
        match scan {
            StringScan::Plain => {
                if here_string {
                    if c == '"' && chars.get(i + 1) == Some(&'#') {
                        return Ok((text, i - open_quote_index + 2, lines_advanced, col + 2));
                    }
                } else if c == '"' {
                    return Ok((text, i - open_quote_index + 1, lines_advanced, col + 1));
                } else if c == '\\' && chars.get(i + 1) == Some(&'\n') {
                    scan = StringScan::Merge;
                    i += 1;
                    continue;
                }
                if c == '\n' {
                    lines_advanced += 1;
                    col = 0;
                } else {
                    col += 1;
                }
                text.push(c);
                i += 1;
            }
            StringScan::Merge => {
                // The backslash-newline pair is dropped entirely; resume plain
                // scanning on the next character without emitting anything for it.
                scan = StringScan::Plain;
                lines_advanced += 1;
                col = 0;
                i += 1;
            }
            StringScan::HereString => unreachable!("here-string entry is handled via the `here_string` flag on Plain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_simple_call() {
        let tokens = LineTokenizer::new().tokenize("(defun main () (printf \"hi\"))", "t.sexp").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::OpenParen,
                TokenType::Symbol,
                TokenType::Symbol,
                TokenType::OpenParen,
                TokenType::CloseParen,
                TokenType::OpenParen,
                TokenType::Symbol,
                TokenType::String,
                TokenType::CloseParen,
                TokenType::CloseParen,
            ]
        );
        assert_eq!(tokens[7].text, "hi");
    }

    #[test]
    fn line_comments_are_skipped() {
        let tokens = LineTokenizer::new().tokenize("; a comment\n(foo)", "t.sexp").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "foo");
    }

    #[test]
    fn backslash_newline_merges_string_across_lines() {
        let tokens = LineTokenizer::new().tokenize("\"a\\\nb\"", "t.sexp").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "ab");
    }

    #[test]
    fn here_strings_do_not_interpret_quotes() {
        let tokens = LineTokenizer::new().tokenize(r####"#"he said "hi""#"####, "t.sexp").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "he said \"hi\"");
    }

    #[test]
    fn unterminated_string_is_a_lexical_error() {
        let result = LineTokenizer::new().tokenize("\"unterminated", "t.sexp");
        assert!(result.is_err());
    }
}
