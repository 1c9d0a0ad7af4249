//! Mapping a head symbol to the thing that handles its invocation (spec §4.D).
//!
//! Dispatch itself never runs code: it only decides, given a name, which of the
//! environment's tables a match was found in. [`crate::evaluator`] is the only
//! caller that actually invokes a generator/macro/compile-time function once
//! [`DispatchTarget`] tells it which.

use crate::definitions::{ObjectDefinitionMap, ObjectKind};

/// A generator receives the full invocation (including its own head symbol and
/// enclosing parens) and writes directly into the calling context's current output;
/// it returns nothing of its own.
pub type GeneratorFn = fn(&mut crate::evaluator::Evaluator, crate::context::Invocation, &crate::context::EvaluatorContext) -> crate::error::EvalResult<()>;

/// A macro receives the full invocation and produces a fresh token vector that is
/// spliced into the source in the macro call's place, then evaluated as though it
/// had appeared there literally.
pub type MacroFn = fn(&mut crate::evaluator::Evaluator, crate::context::Invocation, &crate::context::EvaluatorContext) -> crate::error::EvalResult<Vec<crate::token::Token>>;

/// An opaque handle to a dynamically loaded compile-time function's native entry
/// point. The core never calls through this itself — only the driver's
/// `DynamicLoader` does — but definitions and dispatch need to name the concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileTimeFn(pub usize);

/// What a name resolves to, as far as the dispatcher is concerned.
///
/// Deliberately holds no borrow into the definition table: the evaluator needs a
/// `&mut` on the environment in every arm (to emit output or record a reference),
/// so a borrowed payload here would outlive its usefulness and fight the borrow
/// checker for no benefit — the head token is available at the call site anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    Generator(GeneratorFn),
    Macro(MacroFn),
    CompileTimeFunction(CompileTimeFn),
    /// A plain runtime function/variable definition already known by this name.
    RuntimeDefinition,
    /// Not found in any table; the evaluator should record a forward reference and
    /// guess at an external C/C++ symbol.
    Unknown,
}

/// Where built-in and user-defined generators/macros/compile-time functions are
/// looked up by name. Generators and macros are populated once at environment
/// construction (built-ins) and whenever a `defGenerator`/`defMacro`-style
/// definition successfully builds and loads; compile-time functions are populated
/// once their backing definition finishes loading.
#[derive(Debug, Default)]
pub struct DispatchTable {
    generators: std::collections::HashMap<String, GeneratorFn>,
    macros: std::collections::HashMap<String, MacroFn>,
    compile_time_functions: std::collections::HashMap<String, CompileTimeFn>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_generator(&mut self, name: impl Into<String>, f: GeneratorFn) {
        self.generators.insert(name.into(), f);
    }

    pub fn register_macro(&mut self, name: impl Into<String>, f: MacroFn) {
        self.macros.insert(name.into(), f);
    }

    pub fn register_compile_time_function(&mut self, name: impl Into<String>, f: CompileTimeFn) {
        self.compile_time_functions.insert(name.into(), f);
    }

    /// Resolution order: generators and macros are checked before the definition
    /// table, because a user definition sharing a built-in generator's name would
    /// otherwise be unreachable; compile-time functions and runtime definitions are
    /// checked last since those names only exist once something has actually been
    /// defined.
    pub fn dispatch(&self, name: &str, definitions: &ObjectDefinitionMap) -> DispatchTarget {
        if let Some(f) = self.generators.get(name) {
            return DispatchTarget::Generator(*f);
        }
        if let Some(f) = self.macros.get(name) {
            return DispatchTarget::Macro(*f);
        }
        if let Some(f) = self.compile_time_functions.get(name) {
            return DispatchTarget::CompileTimeFunction(*f);
        }
        if let Some(def) = definitions.get(name) {
            if !def.kind.is_compile_time() || matches!(def.kind, ObjectKind::CompileTimeFunction) {
                return DispatchTarget::RuntimeDefinition;
            }
        }
        DispatchTarget::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_generator(_: &mut crate::evaluator::Evaluator, _: crate::context::Invocation, _: &crate::context::EvaluatorContext) -> crate::error::EvalResult<()> {
        Ok(())
    }

    #[test]
    fn generators_take_priority_over_definitions() {
        let mut table = DispatchTable::new();
        table.register_generator("defun", noop_generator);
        let defs = ObjectDefinitionMap::new();
        assert!(matches!(table.dispatch("defun", &defs), DispatchTarget::Generator(_)));
    }

    #[test]
    fn unknown_name_dispatches_to_unknown() {
        let table = DispatchTable::new();
        let defs = ObjectDefinitionMap::new();
        assert!(matches!(table.dispatch("mystery", &defs), DispatchTarget::Unknown));
    }
}
