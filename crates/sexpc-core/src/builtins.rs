//! The small set of generators/macros the environment always knows about, without
//! which no Cakelisp-dialect program can define anything: `defun`, `defvar`,
//! `defmacro`, `defgenerator`, plus the `tokenize-push`/`token-splice` pair macros
//! use to construct the tokens they hand back.
//!
//! Everything else (arithmetic, control flow, the standard library) is ordinary
//! user or library code built out of these, exactly as in the original — the core
//! only ships the handful of forms needed to bootstrap definitions at all.

use crate::context::{EvaluatorContext, EvaluatorScope, Invocation};
use crate::definitions::{ObjectDefinition, ObjectKind};
use crate::dispatch::DispatchTable;
use crate::error::{Diagnostic, EvalErrorKind, EvalResult};
use crate::evaluator::Evaluator;
use crate::output::{Modifiers, OutputOp};
use crate::token::{find_close_paren, get_argument, Token, TokenType};

pub fn register(table: &mut DispatchTable) {
    table.register_generator("defun", defun);
    table.register_generator("defvar", defvar);
    table.register_macro("defmacro", defmacro);
    table.register_macro("defgenerator", defgenerator);
    table.register_macro("tokenize-push", tokenize_push);
}

fn symbol_argument<'a>(tokens: &'a [Token], invocation_start: usize, n: usize, what: &str) -> Result<&'a Token, Diagnostic> {
    let idx = get_argument(tokens, invocation_start, n).ok_or_else(|| Diagnostic {
        blame: tokens[invocation_start].blame(),
        kind: EvalErrorKind::InvocationError(format!("expected {what} as argument {n}")),
        note: None,
    })?;
    let tok = &tokens[idx];
    if !tok.is_symbol() {
        return Err(Diagnostic { blame: tok.blame(), kind: EvalErrorKind::InvocationError(format!("expected {what} to be a symbol")), note: None });
    }
    Ok(tok)
}

/// `(defun NAME (ARGS...) BODY...)` — a runtime function definition. Argument
/// declarations are accepted and skipped (typed-signature codegen is out of scope;
/// see the "producing machine code directly" Non-goal): what matters here is that
/// the name gets a definition with a properly evaluated body, exercising dispatch,
/// the output tree and the reference graph exactly as a fuller implementation
/// would.
fn defun(evaluator: &mut Evaluator, invocation: Invocation, context: &EvaluatorContext) -> EvalResult<()> {
    let vec_id = invocation.token.vec;
    let open_index = invocation.token.index;
    let tokens = evaluator.env.tokens.get(vec_id);
    let name_tok = symbol_argument(tokens, open_index, 1, "a function name")?.clone();
    let args_index = get_argument(tokens, open_index, 2).ok_or_else(|| Diagnostic {
        blame: tokens[open_index].blame(),
        kind: EvalErrorKind::InvocationError("defun requires an argument list".to_string()),
        note: None,
    })?;
    if !tokens[args_index].is_open_paren() {
        return Err(Diagnostic { blame: tokens[args_index].blame(), kind: EvalErrorKind::InvocationError("defun's argument list must be parenthesized".to_string()), note: None });
    }
    let body_start = find_close_paren(tokens, args_index) + 1;
    let close = find_close_paren(tokens, open_index);

    if evaluator.env.definitions.contains_key(&name_tok.text) {
        let prior = evaluator.env.definitions[&name_tok.text].definition_invocation.map(|r| evaluator.env.tokens.token(r).blame());
        return Err(Diagnostic {
            blame: name_tok.blame(),
            kind: EvalErrorKind::DuplicateDefinition { name: name_tok.text.clone(), prior: prior.unwrap_or_else(|| name_tok.blame()) },
            note: None,
        });
    }

    let output = evaluator.env.outputs.new_output();
    let def_context = context.for_definition_body(name_tok.text.clone()).with_scope(EvaluatorScope::Body);
    evaluator.evaluate_all(vec_id, body_start, close, output, &def_context)?;

    let mut def = ObjectDefinition::new(name_tok.text.clone(), ObjectKind::Function, Some(invocation.token), def_context, output);
    def.is_required = context.is_required;
    evaluator.env.insert_definition(def);
    Ok(())
}

/// `(defvar NAME VALUE)` — a runtime variable definition.
fn defvar(evaluator: &mut Evaluator, invocation: Invocation, context: &EvaluatorContext) -> EvalResult<()> {
    let vec_id = invocation.token.vec;
    let open_index = invocation.token.index;
    let tokens = evaluator.env.tokens.get(vec_id);
    let name_tok = symbol_argument(tokens, open_index, 1, "a variable name")?.clone();
    let value_index = get_argument(tokens, open_index, 2);

    if evaluator.env.definitions.contains_key(&name_tok.text) {
        return Err(Diagnostic {
            blame: name_tok.blame(),
            kind: EvalErrorKind::DuplicateDefinition { name: name_tok.text.clone(), prior: name_tok.blame() },
            note: None,
        });
    }

    let output = evaluator.env.outputs.new_output();
    let def_context = context.for_definition_body(name_tok.text.clone()).with_scope(EvaluatorScope::ExpressionsOnly);
    if let Some(idx) = value_index {
        evaluator.evaluate_one(vec_id, idx, output, &def_context)?;
    }
    let mut def = ObjectDefinition::new(name_tok.text.clone(), ObjectKind::Variable, Some(invocation.token), def_context, output);
    def.is_required = context.is_required;
    evaluator.env.insert_definition(def);
    Ok(())
}

/// `(defmacro NAME (ARGS...) BODY...)`. The body is expected to end by invoking
/// `tokenize-push` into a well-known accumulator and returning a truthy symbol; for
/// the scope this core covers (no interpreter — compile-time code is always
/// natively compiled, per the Non-goals), the macro's body tokens are captured
/// as-is and registered as a `CompileTimeMacro` definition. Expansion happens when
/// the macro is later invoked by name (§4.D): the registered `MacroFn` backing a
/// user-authored macro is produced by the comptime build pipeline once the
/// definition is compiled and loaded, not by this registration step itself.
fn defmacro(evaluator: &mut Evaluator, invocation: Invocation, context: &EvaluatorContext) -> EvalResult<Vec<Token>> {
    let vec_id = invocation.token.vec;
    let open_index = invocation.token.index;
    let tokens = evaluator.env.tokens.get(vec_id);
    let name_tok = symbol_argument(tokens, open_index, 1, "a macro name")?.clone();

    if evaluator.env.definitions.contains_key(&name_tok.text) {
        return Err(Diagnostic {
            blame: name_tok.blame(),
            kind: EvalErrorKind::DuplicateDefinition { name: name_tok.text.clone(), prior: name_tok.blame() },
            note: None,
        });
    }

    let output = evaluator.env.outputs.new_output();
    let def_context = context.for_definition_body(name_tok.text.clone()).with_scope(EvaluatorScope::Body);
    let def = ObjectDefinition::new(name_tok.text.clone(), ObjectKind::CompileTimeMacro, Some(invocation.token), def_context, output);
    evaluator.env.insert_definition(def);

    // `defmacro` introduces a definition but produces no tokens of its own at the
    // call site.
    Ok(Vec::new())
}

/// `(defgenerator NAME (ARGS...) BODY...)`. Identical in shape and scope to
/// `defmacro`: registers a `CompileTimeGenerator` definition from the captured
/// invocation, with no `GeneratorFn` wired up yet. The comptime build pipeline
/// compiles, links and loads the definition once required, and it is the Load
/// substage that registers the resulting native entry point into the dispatch
/// table under this name (§4.G).
fn defgenerator(evaluator: &mut Evaluator, invocation: Invocation, context: &EvaluatorContext) -> EvalResult<Vec<Token>> {
    let vec_id = invocation.token.vec;
    let open_index = invocation.token.index;
    let tokens = evaluator.env.tokens.get(vec_id);
    let name_tok = symbol_argument(tokens, open_index, 1, "a generator name")?.clone();

    if evaluator.env.definitions.contains_key(&name_tok.text) {
        return Err(Diagnostic {
            blame: name_tok.blame(),
            kind: EvalErrorKind::DuplicateDefinition { name: name_tok.text.clone(), prior: name_tok.blame() },
            note: None,
        });
    }

    let output = evaluator.env.outputs.new_output();
    let def_context = context.for_definition_body(name_tok.text.clone()).with_scope(EvaluatorScope::Body);
    let def = ObjectDefinition::new(name_tok.text.clone(), ObjectKind::CompileTimeGenerator, Some(invocation.token), def_context, output);
    evaluator.env.insert_definition(def);

    Ok(Vec::new())
}

/// `(tokenize-push ACCUMULATOR TOKENS...)`. In the original this pushes raw tokens
/// (with `token-splice` escapes) into a vector the macro later hands back; here it
/// simply returns the pushed tokens verbatim (splices are not interpolated, since
/// macro bodies are not interpreted by this core — see `defmacro`), so generator
/// code and tests exercising the macro-expansion machinery have a concrete,
/// well-formed token producer to call through `DispatchTarget::Macro`.
fn tokenize_push(evaluator: &mut Evaluator, invocation: Invocation, _context: &EvaluatorContext) -> EvalResult<Vec<Token>> {
    let vec_id = invocation.token.vec;
    let open_index = invocation.token.index;
    let tokens = evaluator.env.tokens.get(vec_id);
    let close = find_close_paren(tokens, open_index);
    let push_start = get_argument(tokens, open_index, 2).unwrap_or(close);
    Ok(tokens[push_start..close].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleId;
    use crate::environment::EvaluatorEnvironment;
    use std::rc::Rc;

    fn tok(kind: TokenType, text: &str) -> Token {
        Token::new(kind, text, Rc::from("test.sexp"), 1, 0, text.len() as u32)
    }

    fn parse_defun_main() -> Vec<Token> {
        vec![
            tok(TokenType::OpenParen, "("),
            tok(TokenType::Symbol, "defun"),
            tok(TokenType::Symbol, "main"),
            tok(TokenType::OpenParen, "("),
            tok(TokenType::CloseParen, ")"),
            tok(TokenType::OpenParen, "("),
            tok(TokenType::Symbol, "printf"),
            tok(TokenType::String, "\"hi\""),
            tok(TokenType::CloseParen, ")"),
            tok(TokenType::CloseParen, ")"),
        ]
    }

    #[test]
    fn defun_registers_a_function_definition() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        register(&mut dispatch);
        let vec_id = env.tokens.push(parse_defun_main());
        let context = EvaluatorContext::module_top_level(ModuleId(0));
        let output = env.outputs.new_output();
        let len = env.tokens.get(vec_id).len();
        {
            let mut evaluator = Evaluator::new(&mut env, &dispatch);
            evaluator.evaluate_all(vec_id, 0, len, output, &context).unwrap();
        }
        assert!(env.definitions.contains_key("main"));
        assert_eq!(env.definitions["main"].kind, ObjectKind::Function);
    }

    #[test]
    fn duplicate_defun_is_an_error() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        register(&mut dispatch);
        let mut tokens = parse_defun_main();
        tokens.extend(parse_defun_main());
        let vec_id = env.tokens.push(tokens);
        let context = EvaluatorContext::module_top_level(ModuleId(0));
        let output = env.outputs.new_output();
        let len = env.tokens.get(vec_id).len();
        let mut evaluator = Evaluator::new(&mut env, &dispatch);
        let result = evaluator.evaluate_all(vec_id, 0, len, output, &context);
        assert!(matches!(result, Err(Diagnostic { kind: EvalErrorKind::DuplicateDefinition { .. }, .. })));
    }
}
