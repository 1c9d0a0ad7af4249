//! Evaluates Cakelisp-dialect-style S-expressions into a C/C++ output tree,
//! dispatching to built-in generators/macros and to user-defined compile-time
//! macros, generators, and functions once they are compiled and dynamically
//! loaded. See [`environment::EvaluatorEnvironment`] for the top-level control loop
//! and [`interfaces`] for the external collaborators (tokenizer, writer, process
//! runner, dynamic loader, filesystem) a driver crate must supply.

mod builtins;
mod cache;
mod context;
mod definitions;
mod dispatch;
mod environment;
mod error;
mod evaluator;
mod hooks;
mod interfaces;
mod output;
mod pipeline;
mod references;
mod required;
mod resolver;
mod token;

pub use cache::{crc32, parse as parse_cache, serialize as serialize_cache, Cache, CacheEntry};
pub use context::{EvaluatorContext, EvaluatorScope, Invocation, ModuleId};
pub use definitions::{MacroExpansion, ObjectDefinition, ObjectDefinitionMap, ObjectKind, RequiredFeatureReason, RequiredFeatures, GLOBAL_DEFINITION_NAME};
pub use dispatch::{CompileTimeFn, DispatchTable, DispatchTarget, GeneratorFn, MacroFn};
pub use environment::{EvaluatorEnvironment, LoopStage};
pub use error::{Blame, Diagnostic, EvalErrorKind, EvalResult};
pub use evaluator::Evaluator;
pub use hooks::{CompileTimeHook, HookKind, HookRegistry, SplicePointRegistry};
pub use interfaces::{DynamicLoader, Filesystem, LibraryHandle, ProcessInvocation, ProcessOutcome, ProcessRunner, RenderedOutput, Tokenizer, Writer};
pub use output::{flatten, has_meaningful_output, Modifiers, NameKind, Output, OutputArena, OutputId, OutputOp};
pub use pipeline::{advance as advance_build_stage, drive_build_wave, select_build_candidates, BuildConfig, BuildStage};
pub use references::{GuessState, GuessStateCell, ObjectReference, ReferencePool, ReferenceResolutionKind, ReferenceStatus, ReferenceStatusMap};
pub use required::{final_check, propagate_required};
pub use resolver::resolve_references;
pub use token::{find_close_paren, get_argument, validate_parens, Token, TokenArena, TokenRef, TokenType, TokenVecId};

/// Registers every built-in generator/macro (`defun`, `defvar`, `defmacro`,
/// `defgenerator`, `tokenize-push`) into a fresh dispatch table. Drivers extend the
/// returned table with anything else they want available by default before
/// starting a build.
pub fn default_dispatch_table() -> DispatchTable {
    let mut table = DispatchTable::new();
    builtins::register(&mut table);
    table
}

/// Runs the fixpoint control loop described in spec §4's component table and the
/// top-level pseudocode's `buildAndEvaluateRefs() = §4.G + §4.H`: repeat
/// {drive one comptime build wave; propagate required-ness; run required-references
/// resolution against every name with newly-changed state} until a pass makes no
/// further progress, then run post-references-resolved hooks, and repeat the whole
/// thing until a hook pass makes no mutation either; finally runs `final_check`.
///
/// `dispatch` is `&mut` because the build pipeline's Load substage registers every
/// newly-compiled macro/generator/compile-time function into it, which is exactly
/// what makes a `defmacro`-defined name callable by the very next reference
/// resolution pass instead of forever dispatching to `Unknown`.
#[allow(clippy::too_many_arguments)]
pub fn run_until_stable<W, P, D, F>(
    env: &mut EvaluatorEnvironment,
    dispatch: &mut DispatchTable,
    writer: &W,
    process_runner: &P,
    dynamic_loader: &D,
    filesystem: &F,
    cache: &mut Cache,
    config: &BuildConfig,
) -> EvalResult<()>
where
    W: Writer,
    P: ProcessRunner,
    D: DynamicLoader,
    F: Filesystem,
{
    loop {
        loop {
            let required_changed = propagate_required(env);
            let built_any = drive_build_wave(env, dispatch, writer, process_runner, dynamic_loader, filesystem, cache, config)?;
            let names: Vec<String> = env.reference_pools.keys().cloned().collect();
            let mut resolved_any = false;
            for name in names {
                if resolve_references(env, dispatch, &name)? > 0 {
                    resolved_any = true;
                }
            }
            if !required_changed && !built_any && !resolved_any {
                break;
            }
        }
        let hooks_mutated = env.run_hooks(dispatch, HookKind::PostReferencesResolved)?;
        if !hooks_mutated {
            break;
        }
    }
    final_check(env)
}
