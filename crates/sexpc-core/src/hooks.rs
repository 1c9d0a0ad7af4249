//! Named splice points and compile-time hooks (spec §4.I).
//!
//! A splice point is a named [`OutputId`] that built-in or user generators can
//! append to at any time during evaluation (e.g. a module's top-level "imports"
//! splice point, filled in as code discovers it needs a given header). A hook is a
//! callback the environment invokes at a fixed point in the control loop — today,
//! "a references-resolution pass just finished and produced no further change" —
//! ordered by priority so e.g. a user hook can run before or after a built-in one
//! with the same name.

use std::collections::HashMap;

use crate::output::OutputId;

/// Which point in the control loop a hook fires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs once, after the fixpoint (propagate-required / build-and-resolve) loop
    /// stabilizes for a pass, before the next outer iteration decides whether to
    /// repeat.
    PostReferencesResolved,
    /// Runs once, immediately before the driver links the final output together.
    /// Lets generators perform last-minute whole-program bookkeeping (e.g. emitting
    /// a generated registration table) with full knowledge of everything built.
    PreLink,
}

/// A hook's expected native signature, recorded so a dynamically loaded compile-time
/// function can be validated before being registered (spec §4.I, "signature
/// validation").
pub type HookFn = fn(&mut crate::evaluator::Evaluator) -> crate::error::EvalResult<bool>;

/// One registered hook: its callback plus the two-level priority the original uses
/// to order same-kind hooks deterministically (`user_priority` breaks ties first,
/// `environment_priority` second, both descending).
#[derive(Clone, Copy)]
pub struct CompileTimeHook {
    pub name: &'static str,
    pub kind: HookKind,
    pub user_priority: i32,
    pub environment_priority: i32,
    pub run: HookFn,
}

impl std::fmt::Debug for CompileTimeHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileTimeHook")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("user_priority", &self.user_priority)
            .field("environment_priority", &self.environment_priority)
            .finish()
    }
}

/// Every registered hook, kept sorted by priority as new hooks are added so the
/// control loop never has to sort before running them.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: Vec<CompileTimeHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: CompileTimeHook) {
        self.hooks.push(hook);
        self.hooks.sort_by(|a, b| (b.user_priority, b.environment_priority).cmp(&(a.user_priority, a.environment_priority)));
    }

    pub fn of_kind(&self, kind: HookKind) -> impl Iterator<Item = &CompileTimeHook> {
        self.hooks.iter().filter(move |h| h.kind == kind)
    }
}

/// A named location generators can splice into without owning the output
/// themselves, e.g. a module's "top of file" includes block.
#[derive(Debug, Default)]
pub struct SplicePointRegistry {
    points: HashMap<String, OutputId>,
}

impl SplicePointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named splice point's output, allocating a fresh one the first
    /// time this name is requested.
    pub fn get_or_create(&mut self, name: &str, outputs: &mut crate::output::OutputArena) -> OutputId {
        if let Some(id) = self.points.get(name) {
            return *id;
        }
        let id = outputs.new_output();
        self.points.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<OutputId> {
        self.points.get(name).copied()
    }
}
