//! `ObjectReference` / `ReferenceStatus` / the reference pool (spec §3, §4.C, §4.H).
//!
//! A reference always lives in two places at once: under the enclosing
//! definition's `references: IndexMap<String, ReferenceStatus>` (for iterating "what
//! does this definition depend on" during a build wave), and under the global
//! per-name pool (for "every call site of N", which the resolver needs when N's
//! meaning becomes known). Both indexes must always agree — see the `reference
//! duality` property in spec §8.

use indexmap::IndexMap;

use crate::context::EvaluatorContext;
use crate::output::OutputId;
use crate::token::TokenVecId;

/// How an unresolved symbol was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceResolutionKind {
    /// An output splice was allocated; the resolver will fill it in once the name's
    /// meaning is known.
    Splice,
    /// The referenced compile-time function is already loaded (this invocation
    /// wasn't itself the one resolving it); nothing further to do when re-resolving.
    AlreadyLoaded,
}

/// The tentative/confirmed state of a (definition, name) pair's understanding of
/// what `name` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuessState {
    /// Never touched.
    None,
    /// Assumed to be an externally-linked C/C++ function; emitted as a direct call.
    Guessed,
    /// Known to be a compile-time object that has not yet finished building.
    WaitingForLoad,
    /// Known, and the splice has been (re)evaluated against the correct
    /// interpretation.
    Resolved,
}

/// A single call site referencing an as-yet-unknown (or already-loaded
/// compile-time) name.
#[derive(Debug, Clone)]
pub struct ObjectReference {
    pub token_vec: TokenVecId,
    pub start_index: usize,
    pub context: EvaluatorContext,
    pub kind: ReferenceResolutionKind,
    /// Present for `Splice`-kind references: the output the resolver will reset and
    /// re-evaluate into.
    pub splice: Option<OutputId>,
    pub is_resolved: bool,
}

/// Every reference recorded from one definition to one name, plus that pair's guess
/// state.
///
/// Rather than duplicating `ObjectReference` values here and in the per-name
/// [`ReferencePool`] (and having to keep two copies' `is_resolved` bits in sync by
/// hand), a `ReferenceStatus` stores indices into that name's pool. The pool is the
/// single source of truth; this is purely a view over it, which makes the "reference
/// duality" property (spec §8) true by construction rather than by convention.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStatus {
    pub pool_indices: Vec<usize>,
    pub guess_state: GuessStateCell,
}

/// `GuessState` plus the "did this guess state change on the current pass" bit the
/// build pipeline's candidate selection needs (spec §4.G: "at least one Guess
/// produced an observable state change on this pass").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessStateCell {
    pub state: GuessState,
    pub changed_this_pass: bool,
}

impl Default for GuessStateCell {
    fn default() -> Self {
        Self { state: GuessState::None, changed_this_pass: false }
    }
}

impl GuessStateCell {
    pub fn set(&mut self, state: GuessState) {
        if state != self.state {
            self.changed_this_pass = true;
        }
        self.state = state;
    }

    pub fn clear_pass_flag(&mut self) {
        self.changed_this_pass = false;
    }
}

/// All call sites referencing one name, across every definition. Keyed separately
/// (in `EvaluatorEnvironment`) by name; this is just the Vec side of that map.
#[derive(Debug, Clone, Default)]
pub struct ReferencePool {
    pub references: Vec<ObjectReference>,
}

/// Per-definition reference table: which names this definition refers to, and the
/// status of each.
pub type ReferenceStatusMap = IndexMap<String, ReferenceStatus>;
