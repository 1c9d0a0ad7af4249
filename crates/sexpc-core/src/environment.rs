//! `EvaluatorEnvironment`: everything that persists across the whole build (spec
//! §3's `EvaluatorEnvironment`, §4's control loop).

use indexmap::IndexMap;

use crate::context::EvaluatorContext;
use crate::definitions::{ObjectDefinition, ObjectDefinitionMap, ObjectKind, GLOBAL_DEFINITION_NAME};
use crate::dispatch::DispatchTable;
use crate::hooks::{HookKind, HookRegistry, SplicePointRegistry};
use crate::output::OutputArena;
use crate::references::{ReferencePool, ReferenceStatus};
use crate::token::TokenArena;

/// Which stage of the fixpoint control loop last ran, surfaced mainly for
/// diagnostics ("evaluation did not converge after N passes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStage {
    PropagateRequired,
    BuildAndEvaluate,
    ResolveReferences,
    Hooks,
}

/// Owns every arena and table that must outlive any single evaluation call: the
/// token and output arenas, the definition table, the per-name reference pools, the
/// hook and splice-point registries, and the handful of control-loop counters.
#[derive(Debug)]
pub struct EvaluatorEnvironment {
    pub tokens: TokenArena,
    pub outputs: OutputArena,
    pub definitions: ObjectDefinitionMap,
    pub reference_pools: IndexMap<String, ReferencePool>,
    pub hooks: HookRegistry,
    pub splice_points: SplicePointRegistry,
    /// Set by any generator/resolver action that changed state this pass; cleared at
    /// the start of each inner-loop iteration. Drives the "no progress" fixpoint
    /// check (spec §4, outer control loop).
    pub was_code_evaluated_this_phase: bool,
    /// Incremented once per build wave; used to label per-wave temp directories and
    /// cache-staleness checks (spec §6).
    pub build_id: u32,
    pub last_stage: Option<LoopStage>,
}

impl EvaluatorEnvironment {
    pub fn new() -> Self {
        let mut outputs = OutputArena::new();
        let pseudo_output = outputs.new_output();
        let mut definitions = ObjectDefinitionMap::new();
        let mut pseudo_object = ObjectDefinition::new(
            GLOBAL_DEFINITION_NAME,
            ObjectKind::PseudoObject,
            None,
            EvaluatorContext::module_top_level(crate::context::ModuleId(0)),
            pseudo_output,
        );
        // The module top level is required by construction, same as the original's
        // `moduleDefinition.isRequired = true` — otherwise nothing module-scoped
        // would ever have a required root to propagate from.
        pseudo_object.is_required = true;
        pseudo_object.environment_required = true;
        definitions.insert(GLOBAL_DEFINITION_NAME.to_string(), pseudo_object);
        Self {
            tokens: TokenArena::new(),
            outputs,
            definitions,
            reference_pools: IndexMap::new(),
            hooks: HookRegistry::new(),
            splice_points: SplicePointRegistry::new(),
            was_code_evaluated_this_phase: false,
            build_id: 0,
            last_stage: None,
        }
    }

    /// Returns the named reference pool, creating an empty one if this is the first
    /// reference ever recorded against `name`.
    pub fn reference_pool_mut(&mut self, name: &str) -> &mut ReferencePool {
        self.reference_pools.entry(name.to_string()).or_default()
    }

    pub fn reference_pool(&self, name: &str) -> Option<&ReferencePool> {
        self.reference_pools.get(name)
    }

    /// Returns the `owner`'s `ReferenceStatus` entry for `name`, creating the
    /// definition-side table entry if this is the first reference `owner` has made
    /// to `name`. Does not touch the definition itself: callers resolve the owning
    /// `ObjectDefinition` (or the module-level pseudo-object) separately.
    pub fn status_for(&mut self, owner: &str, name: &str) -> &mut ReferenceStatus {
        self.definitions
            .get_mut(owner)
            .expect("status_for called with an unknown owning definition")
            .references
            .entry(name.to_string())
            .or_default()
    }

    pub fn mark_changed(&mut self) {
        self.was_code_evaluated_this_phase = true;
    }

    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.was_code_evaluated_this_phase)
    }

    pub fn insert_definition(&mut self, def: ObjectDefinition) {
        self.definitions.insert(def.name.clone(), def);
    }

    pub fn run_hooks(&mut self, dispatch: &DispatchTable, kind: HookKind) -> crate::error::EvalResult<bool> {
        let hooks: Vec<_> = self.hooks.of_kind(kind).copied().collect();
        let mut any_mutated = false;
        for hook in hooks {
            let mut evaluator = crate::evaluator::Evaluator::new(self, dispatch);
            if (hook.run)(&mut evaluator)? {
                any_mutated = true;
            }
        }
        Ok(any_mutated)
    }
}

impl Default for EvaluatorEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
