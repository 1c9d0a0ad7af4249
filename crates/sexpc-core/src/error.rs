//! Error kinds for every stage of the evaluator/reference-resolution fixpoint.
//!
//! Every error carries the (file, line, column) of the token that caused it, via
//! [`Blame`]. Warnings (diagnostic `note:` lines attached to an error, or emitted on
//! their own by the driver) never raise an error count; see [`crate::environment`] for
//! how the outer control loop treats an error count of zero as "no progress was blocked".

use std::fmt;

use crate::token::Token;

/// A source location blamed for a diagnostic. Cheap to copy out of a [`Token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blame {
    pub file: String,
    pub line: u32,
    pub column_start: u32,
}

impl Blame {
    pub fn from_token(token: &Token) -> Self {
        Self { file: token.file.to_string(), line: token.line, column_start: token.column_start }
    }
}

impl fmt::Display for Blame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column_start)
    }
}

/// A single error with its blame site and an optional note (e.g. a pretty-printed
/// dump of macro-returned tokens, or a pointer at a prior conflicting definition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub blame: Blame,
    pub kind: EvalErrorKind,
    pub note: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: error: {}", self.blame, self.kind)?;
        if let Some(note) = &self.note {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// The kinds of failure the evaluator itself can produce. See spec §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Invalid tokens; normally surfaced by the tokenizer, but also reachable when a
    /// macro-produced token vector fails post-hoc validation.
    LexicalError(String),
    /// Parens didn't balance, either in source or in macro output.
    UnbalancedParens,
    /// `addDefinition` found an existing name (in the definition table, or already a
    /// built-in macro/generator/compile-time function).
    DuplicateDefinition { name: String, prior: Blame },
    /// The invocation's head token is not a Symbol, or an expected argument index is
    /// missing.
    InvocationError(String),
    /// A generator or macro returned failure.
    GeneratorReportedFailure { invocation: String },
    /// At the final pass, a required reference remained unresolved (guess state
    /// `None`, or the referent is a compile-time object that never loaded).
    UnresolvedReference { name: String },
    /// Compile, link, or symbol-load failure for a compile-time object.
    ComptimeBuildFailure { name: String, stage: &'static str, detail: String },
    /// A hook or compile-time-variable destructor's parameter list didn't match what
    /// was expected.
    SignatureMismatch { name: String, expected: String, found: String },
    /// A reference was marked resolved with a resolution kind other than Splice or
    /// AlreadyLoaded, or some other state the evaluator should never produce.
    InternalInvariantFailure(String),
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LexicalError(msg) => write!(f, "lexical error: {msg}"),
            Self::UnbalancedParens => write!(f, "unbalanced parens"),
            Self::DuplicateDefinition { name, prior } => {
                write!(f, "'{name}' is already defined (first defined at {prior})")
            }
            Self::InvocationError(msg) => write!(f, "invocation error: {msg}"),
            Self::GeneratorReportedFailure { invocation } => {
                write!(f, "'{invocation}' reported failure")
            }
            Self::UnresolvedReference { name } => write!(f, "unresolved reference to '{name}'"),
            Self::ComptimeBuildFailure { name, stage, detail } => {
                write!(f, "compile-time build of '{name}' failed during {stage}: {detail}")
            }
            Self::SignatureMismatch { name, expected, found } => {
                write!(f, "'{name}' has signature '{found}', expected '{expected}'")
            }
            Self::InternalInvariantFailure(msg) => write!(f, "internal invariant failure: {msg}"),
        }
    }
}

pub type EvalResult<T> = Result<T, Diagnostic>;
