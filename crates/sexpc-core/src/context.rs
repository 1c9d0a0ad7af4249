//! The small, frequently-copied value that threads through every recursive
//! evaluation step (spec §3's `EvaluatorContext`).

use crate::output::OutputOp;
use crate::token::TokenRef;

/// Governs which invocation forms are legal and how bare symbols are emitted.
/// Lets generators react differently depending on where they were invoked, since
/// few generators are valid in every scope (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluatorScope {
    /// Plain-old declarations: a function body, a block.
    Body,
    /// Top-level invocations in a module.
    Module,
    /// Nested inside a C expression, e.g. a function call's arguments — a C
    /// expression position cannot hold an `if` statement.
    ExpressionsOnly,
}

/// An opaque handle to whichever module this context's evaluation belongs to.
/// Multi-module orchestration (loading files, tracking per-module dependencies) is a
/// driver-level concern; the core only needs a stable, comparable id to thread
/// through contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Context copied into every `ObjectReference` and every definition, so a splice can
/// be replayed later with exactly the scope/requiredness it was first evaluated
/// under.
#[derive(Debug, Clone)]
pub struct EvaluatorContext {
    pub scope: EvaluatorScope,
    pub is_required: bool,
    /// The enclosing definition this invocation's references should be attributed
    /// to. `None` means the global (module top-level) pseudo-object.
    pub definition_name: Option<String>,
    /// While re-resolving a reference to `N`, set to `Some(N)` so that re-evaluation
    /// doesn't spuriously record a brand-new reference to the very name being
    /// resolved.
    pub resolving_reference: Option<String>,
    pub module: ModuleId,
    /// Inserted between sibling expressions/statements during `evaluate_all`. Only
    /// consulted there.
    pub delimiter_template: Option<OutputOp>,
}

impl EvaluatorContext {
    pub fn module_top_level(module: ModuleId) -> Self {
        Self {
            scope: EvaluatorScope::Module,
            is_required: true,
            definition_name: None,
            resolving_reference: None,
            module,
            delimiter_template: None,
        }
    }

    /// A context for evaluating inside a definition's body: same requiredness and
    /// module, but scoped to `Body` and attributed to `name`.
    pub fn for_definition_body(&self, name: impl Into<String>) -> Self {
        Self {
            scope: EvaluatorScope::Body,
            is_required: self.is_required,
            definition_name: Some(name.into()),
            resolving_reference: self.resolving_reference.clone(),
            module: self.module,
            delimiter_template: None,
        }
    }

    pub fn with_delimiter(&self, delimiter: OutputOp) -> Self {
        let mut ctx = self.clone();
        ctx.delimiter_template = Some(delimiter);
        ctx
    }

    pub fn with_scope(&self, scope: EvaluatorScope) -> Self {
        let mut ctx = self.clone();
        ctx.scope = scope;
        ctx
    }

    /// The name references created under this context should be attributed to: the
    /// enclosing definition, or the well-known global pseudo-object name.
    pub fn owning_definition(&self) -> &str {
        self.definition_name.as_deref().unwrap_or(crate::definitions::GLOBAL_DEFINITION_NAME)
    }
}

/// The invocation's own blame token, threaded alongside context in a few call sites
/// that need both without re-deriving the token from the invocation index.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub token: TokenRef,
}
