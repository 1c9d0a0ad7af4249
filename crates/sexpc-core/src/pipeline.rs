//! Comptime build pipeline (spec §4.G): the stage machine that takes a compile-time
//! definition from freshly-evaluated tokens to a loaded, callable function pointer.
//!
//! The core decides *which* definitions are candidates, renders and names each
//! artifact, and drives every substage transition; the driver only supplies the
//! [`crate::interfaces::Writer`], [`crate::interfaces::ProcessRunner`],
//! [`crate::interfaces::DynamicLoader`] and [`crate::interfaces::Filesystem`]
//! collaborators the substages actually call through. This split mirrors the
//! original's own separation between `Build.cpp`'s scheduling and the OS-specific
//! process/library calls it delegates to.

use crate::cache::Cache;
use crate::definitions::{ObjectDefinitionMap, ObjectKind};
use crate::dispatch::{CompileTimeFn, DispatchTable, GeneratorFn, MacroFn};
use crate::environment::EvaluatorEnvironment;
use crate::error::{Blame, Diagnostic, EvalErrorKind, EvalResult};
use crate::interfaces::{DynamicLoader, Filesystem, ProcessInvocation, ProcessRunner, Writer};
use crate::output::flatten;
use crate::references::GuessState;
use crate::resolver::resolve_references;

/// One compile-time definition's progress through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStage {
    #[default]
    None,
    Compiling,
    Linking,
    Loading,
    ResolvingReferences,
    Finished,
}

/// Scans the definition table for compile-time definitions eligible to start (or
/// continue) building this pass. A definition is a candidate when: it is required,
/// not yet loaded, not forbidden from building, and its references are either
/// empty, all Resolved, or include at least one Guess that changed state this pass
/// (spec §4.G "Selection step").
pub fn select_build_candidates(definitions: &ObjectDefinitionMap) -> Vec<String> {
    let mut candidates = Vec::new();
    for (name, def) in definitions {
        if !def.kind.is_compile_time() || !def.is_required || def.forbid_build {
            continue;
        }
        // `is_loaded` flips true as soon as the Load substage resolves a symbol
        // (see `final_check`'s `WaitingForLoad` case), which happens a stage before
        // `Finished` — only the stage itself is a terminal marker here.
        if def.build_stage == BuildStage::Finished {
            continue;
        }
        let references_ready = def.references.is_empty()
            || def.references.values().all(|status| {
                matches!(status.guess_state.state, GuessState::Resolved)
                    || (matches!(status.guess_state.state, GuessState::Guessed) && status.guess_state.changed_this_pass)
            });
        if references_ready {
            candidates.push(name.clone());
        }
    }
    candidates
}

/// Advances `stage` to the next stage in sequence. Each substage's actual work
/// (spawning a compiler, linking, loading a symbol) happens in [`drive_build_wave`];
/// this only encodes the legal transition order so callers agree on what "done"
/// means at each point.
pub fn advance(stage: BuildStage) -> BuildStage {
    match stage {
        BuildStage::None => BuildStage::Compiling,
        BuildStage::Compiling => BuildStage::Linking,
        BuildStage::Linking => BuildStage::Loading,
        BuildStage::Loading => BuildStage::ResolvingReferences,
        BuildStage::ResolvingReferences | BuildStage::Finished => BuildStage::Finished,
    }
}

/// Everything the pipeline needs to know to name and invoke an artifact build that
/// isn't itself part of the definition graph: where the per-candidate `.cpp`/`.h`
/// pair and their compiled object/library siblings live, and what compiler to
/// invoke. One `BuildConfig` is shared across an entire build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub cache_dir: String,
    pub compiler: String,
    pub compiler_flags: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { cache_dir: ".".to_string(), compiler: "c++".to_string(), compiler_flags: Vec::new() }
    }
}

fn source_path(config: &BuildConfig, name: &str) -> String {
    format!("{}/comptime_{name}.cpp", config.cache_dir)
}

fn header_path(config: &BuildConfig, name: &str) -> String {
    format!("{}/comptime_{name}.h", config.cache_dir)
}

fn object_path(config: &BuildConfig, name: &str) -> String {
    format!("{}/comptime_{name}.o", config.cache_dir)
}

fn library_path(config: &BuildConfig, name: &str) -> String {
    format!("{}/comptime_{name}.{}", config.cache_dir, dynamic_library_extension())
}

fn dynamic_library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Only meaningful on import-library-using toolchains (Windows); every other
/// platform resolves compile-time cross-references straight off the shared object,
/// so there is nothing to name.
fn platform_import_library_name(config: &BuildConfig, name: &str) -> Option<String> {
    if cfg!(target_os = "windows") {
        Some(format!("{}/comptime_{name}.lib", config.cache_dir))
    } else {
        None
    }
}

/// The symbol a compiled compile-time definition exports. Only covers the one
/// conversion a Cakelisp-dialect name needs to become a valid C identifier (hyphens
/// to underscores); the fuller per-[`crate::output::NameKind`] casing rules stay a
/// [`Writer`]-only concern applied when emitting call sites, not symbol lookup.
fn function_name_style_symbol(name: &str) -> String {
    name.replace('-', "_")
}

/// Builds the auto-generated header an emitted candidate gets in addition to its
/// own rendered header text: an `#include` for every referenced compile-time
/// definition's own header, plus (Windows only) an import-library pragma so the
/// linker can find it.
fn render_auto_header(env: &EvaluatorEnvironment, name: &str, body: &str) -> String {
    let mut out = String::new();
    if let Some(def) = env.definitions.get(name) {
        for referenced_name in def.references.keys() {
            if let Some(referent) = env.definitions.get(referenced_name) {
                if let Some(header) = &referent.compile_time_header_name {
                    out.push_str(&format!("#include \"{header}\"\n"));
                }
                if let Some(import_library) = &referent.compile_time_import_library_name {
                    out.push_str(&format!("#pragma comment(lib, \"{import_library}\")\n"));
                }
            }
        }
    }
    out.push_str(body);
    out
}

fn definition_blame(env: &EvaluatorEnvironment, name: &str) -> Blame {
    env.definitions
        .get(name)
        .and_then(|d| d.definition_invocation)
        .map(|r| env.tokens.token(r).blame())
        .unwrap_or(Blame { file: String::new(), line: 0, column_start: 0 })
}

/// Re-blames a diagnostic a collaborator returned with no location of its own (the
/// driver's `DynamicLoader` has no token to point at) onto the definition whose
/// build actually failed.
fn rebrand_build_failure(env: &EvaluatorEnvironment, name: &str, stage: &'static str, err: Diagnostic) -> Diagnostic {
    let detail = match err.kind {
        EvalErrorKind::ComptimeBuildFailure { detail, .. } => detail,
        other => other.to_string(),
    };
    Diagnostic { blame: definition_blame(env, name), kind: EvalErrorKind::ComptimeBuildFailure { name: name.to_string(), stage, detail }, note: err.note }
}

fn compile_command_args(config: &BuildConfig, source_path: &str, object_path: &str) -> Vec<String> {
    let mut args = vec!["-c".to_string(), source_path.to_string(), "-o".to_string(), object_path.to_string(), "-I".to_string(), config.cache_dir.clone()];
    args.extend(config.compiler_flags.iter().cloned());
    args
}

fn link_command_args(config: &BuildConfig, object_path: &str, library_path: &str) -> Vec<String> {
    let mut args = vec!["-shared".to_string(), object_path.to_string(), "-o".to_string(), library_path.to_string()];
    args.extend(config.compiler_flags.iter().cloned());
    args
}

/// Inserts a just-loaded compile-time definition's native entry point into the
/// dispatch table under the kind its definition calls for, so the very next
/// dispatch of its name finds it instead of guessing an external call.
///
/// # Safety expectations
/// The transmute below assumes the artifact `handle` points into was compiled and
/// linked by this same build, by the same writer that would render a call to it —
/// i.e. the native entry point really does have the `MacroFn`/`GeneratorFn` ABI the
/// core expects, not merely some `extern "C" fn()`. See DESIGN.md for why this is
/// an accepted assumption rather than a marshaled FFI boundary.
fn register_loaded_definition(env: &EvaluatorEnvironment, dispatch: &mut DispatchTable, name: &str, handle: CompileTimeFn) {
    match env.definitions[name].kind {
        ObjectKind::CompileTimeMacro => {
            let f: MacroFn = unsafe { std::mem::transmute::<usize, MacroFn>(handle.0) };
            dispatch.register_macro(name, f);
        }
        ObjectKind::CompileTimeGenerator | ObjectKind::CompileTimeExternalGenerator => {
            let f: GeneratorFn = unsafe { std::mem::transmute::<usize, GeneratorFn>(handle.0) };
            dispatch.register_generator(name, f);
        }
        ObjectKind::CompileTimeFunction => {
            dispatch.register_compile_time_function(name, handle);
        }
        ObjectKind::PseudoObject | ObjectKind::Function | ObjectKind::Variable => {}
    }
}

/// Renders and writes each `None`-stage candidate's source/header pair, then spawns
/// one compile subprocess per artifact whose command-CRC/header-CRC pair isn't
/// already cache-current, batched as a single wave. A zero-reference candidate
/// whose compile fails is marked `forbid_build` (spec §4.G "Fail semantics") —
/// there is nothing left to wait on, so retrying would just fail again.
fn run_compile_substage<W, P, F>(env: &mut EvaluatorEnvironment, process_runner: &P, filesystem: &F, cache: &mut Cache, config: &BuildConfig, writer: &W, names: &[String]) -> EvalResult<bool>
where
    W: Writer,
    P: ProcessRunner,
    F: Filesystem,
{
    struct Prepared {
        name: String,
        source_path: String,
        object_path: String,
        header_crc: u32,
    }

    let mut prepared = Vec::new();
    for name in names {
        let output_id = env.definitions[name].output;
        let rendered = writer.render(&flatten(&env.outputs, output_id)?)?;
        let src = source_path(config, name);
        let hdr = header_path(config, name);
        let obj = object_path(config, name);
        let header_text = render_auto_header(env, name, &rendered.header_text);
        filesystem.write_string(&src, &rendered.source_text)?;
        filesystem.write_string(&hdr, &header_text)?;
        let header_crc = crate::cache::crc32(header_text.as_bytes());

        let import_library = platform_import_library_name(config, name);
        let def = env.definitions.get_mut(name).expect("candidate name always resolves");
        def.compile_time_header_name = Some(hdr);
        def.compile_time_import_library_name = import_library;

        prepared.push(Prepared { name: name.clone(), source_path: src, object_path: obj, header_crc });
    }

    let mut invocations = Vec::new();
    let mut pending = Vec::new();
    for p in &prepared {
        let args = compile_command_args(config, &p.source_path, &p.object_path);
        let command_crc = crate::cache::crc32(args.join(" ").as_bytes());
        if filesystem.exists(&p.object_path) && cache.is_up_to_date(&p.object_path, command_crc, p.header_crc) {
            continue;
        }
        let debug_path = format!("{}.pdb", p.object_path);
        if filesystem.exists(&debug_path) {
            filesystem.remove_file(&debug_path)?;
        }
        invocations.push(ProcessInvocation { program: config.compiler.clone(), args, label: format!("compile {}", p.name) });
        pending.push((p.name.clone(), p.object_path.clone(), command_crc, p.header_crc));
    }

    if !invocations.is_empty() {
        let outcomes = process_runner.run_wave(&invocations);
        for (outcome, (name, object_path, command_crc, header_crc)) in outcomes.into_iter().zip(pending) {
            if outcome.success {
                cache.update(object_path, command_crc, header_crc);
            } else {
                cache.invalidate(&object_path);
                let blame = definition_blame(env, &name);
                let def = env.definitions.get_mut(&name).expect("candidate name always resolves");
                if def.references.is_empty() {
                    def.forbid_build = true;
                }
                return Err(Diagnostic { blame, kind: EvalErrorKind::ComptimeBuildFailure { name, stage: "compile", detail: outcome.stderr }, note: None });
            }
        }
    }

    for p in &prepared {
        env.definitions.get_mut(&p.name).expect("candidate name always resolves").build_stage = advance(BuildStage::None);
    }
    Ok(true)
}

/// Links every `Compiling`-stage candidate's object into a loadable shared library,
/// skipping ones whose link command-CRC is already cache-current, batched as a
/// single wave.
fn run_link_substage<P, F>(env: &mut EvaluatorEnvironment, process_runner: &P, filesystem: &F, cache: &mut Cache, config: &BuildConfig, names: &[String]) -> EvalResult<bool>
where
    P: ProcessRunner,
    F: Filesystem,
{
    let mut invocations = Vec::new();
    let mut pending = Vec::new();
    for name in names {
        let object = object_path(config, name);
        let library = library_path(config, name);
        let header_crc = cache.find(&object).map(|e| e.header_crc).unwrap_or(0);
        let args = link_command_args(config, &object, &library);
        let command_crc = crate::cache::crc32(args.join(" ").as_bytes());
        if filesystem.exists(&library) && cache.is_up_to_date(&library, command_crc, header_crc) {
            continue;
        }
        invocations.push(ProcessInvocation { program: config.compiler.clone(), args, label: format!("link {name}") });
        pending.push((name.clone(), library, command_crc, header_crc));
    }

    if !invocations.is_empty() {
        let outcomes = process_runner.run_wave(&invocations);
        for (outcome, (name, library, command_crc, header_crc)) in outcomes.into_iter().zip(pending) {
            if outcome.success {
                cache.update(library, command_crc, header_crc);
            } else {
                cache.invalidate(&library);
                let blame = definition_blame(env, &name);
                let def = env.definitions.get_mut(&name).expect("candidate name always resolves");
                if def.references.is_empty() {
                    def.forbid_build = true;
                }
                return Err(Diagnostic { blame, kind: EvalErrorKind::ComptimeBuildFailure { name, stage: "link", detail: outcome.stderr }, note: None });
            }
        }
    }

    for name in names {
        env.definitions.get_mut(name).expect("candidate name always resolves").build_stage = advance(BuildStage::Compiling);
    }
    Ok(true)
}

/// Loads every `Linking`-stage candidate's shared library and resolves its exported
/// symbol, registering the result into `dispatch` under the appropriate kind so the
/// very next evaluation of its name finds a real macro/generator/compile-time
/// function instead of guessing an external call.
fn run_load_substage<D>(env: &mut EvaluatorEnvironment, dispatch: &mut DispatchTable, dynamic_loader: &D, config: &BuildConfig, names: &[String]) -> EvalResult<bool>
where
    D: DynamicLoader,
{
    for name in names {
        let library_path = library_path(config, name);
        let library = dynamic_loader.load_library(&library_path).map_err(|err| rebrand_build_failure(env, name, "load", err))?;
        let symbol_name = function_name_style_symbol(name);
        let handle = dynamic_loader.find_symbol(library, &symbol_name).map_err(|err| rebrand_build_failure(env, name, "load", err))?;

        register_loaded_definition(env, dispatch, name, handle);

        let def = env.definitions.get_mut(name).expect("candidate name always resolves");
        def.is_loaded = true;
        def.build_stage = advance(BuildStage::Linking);
    }
    Ok(true)
}

/// Re-evaluates every not-yet-resolved reference to each `Loading`-stage
/// candidate's name (spec §4.H), now that it dispatches to something real.
fn run_resolve_substage(env: &mut EvaluatorEnvironment, dispatch: &DispatchTable, names: &[String]) -> EvalResult<bool> {
    for name in names {
        resolve_references(env, dispatch, name)?;
        env.definitions.get_mut(name).expect("candidate name always resolves").build_stage = advance(BuildStage::Loading);
    }
    Ok(true)
}

fn run_finish_substage(env: &mut EvaluatorEnvironment, names: &[String]) -> bool {
    for name in names {
        env.definitions.get_mut(name).expect("candidate name always resolves").build_stage = advance(BuildStage::ResolvingReferences);
    }
    !names.is_empty()
}

/// Drives one wave of the comptime build pipeline: selects candidates, then for
/// each one advances exactly one substage (emit+compile, link, load, resolve, or
/// finish) according to its current [`BuildStage`], batching every candidate
/// sharing a substage into one [`ProcessRunner::run_wave`] call. Call this
/// repeatedly from the outer fixpoint loop — `buildAndEvaluateRefs()` (spec's
/// top-level control loop) — until it returns `false`, meaning no candidate made
/// progress this pass.
#[allow(clippy::too_many_arguments)]
pub fn drive_build_wave<W, P, D, F>(
    env: &mut EvaluatorEnvironment,
    dispatch: &mut DispatchTable,
    writer: &W,
    process_runner: &P,
    dynamic_loader: &D,
    filesystem: &F,
    cache: &mut Cache,
    config: &BuildConfig,
) -> EvalResult<bool>
where
    W: Writer,
    P: ProcessRunner,
    D: DynamicLoader,
    F: Filesystem,
{
    let candidates = select_build_candidates(&env.definitions);
    if candidates.is_empty() {
        return Ok(false);
    }

    let mut need_compile = Vec::new();
    let mut need_link = Vec::new();
    let mut need_load = Vec::new();
    let mut need_resolve = Vec::new();
    let mut need_finish = Vec::new();
    for name in candidates {
        match env.definitions[&name].build_stage {
            BuildStage::None => need_compile.push(name),
            BuildStage::Compiling => need_link.push(name),
            BuildStage::Linking => need_load.push(name),
            BuildStage::Loading => need_resolve.push(name),
            BuildStage::ResolvingReferences => need_finish.push(name),
            BuildStage::Finished => {}
        }
    }

    let mut progressed = false;
    if !need_compile.is_empty() {
        progressed |= run_compile_substage(env, process_runner, filesystem, cache, config, writer, &need_compile)?;
    }
    if !need_link.is_empty() {
        progressed |= run_link_substage(env, process_runner, filesystem, cache, config, &need_link)?;
    }
    if !need_load.is_empty() {
        progressed |= run_load_substage(env, dispatch, dynamic_loader, config, &need_load)?;
    }
    if !need_resolve.is_empty() {
        progressed |= run_resolve_substage(env, dispatch, &need_resolve)?;
    }
    if !need_finish.is_empty() {
        progressed |= run_finish_substage(env, &need_finish);
    }

    Ok(progressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EvaluatorContext, ModuleId};
    use crate::definitions::{ObjectDefinition, ObjectKind};
    use crate::dispatch::DispatchTarget;
    use crate::interfaces::{LibraryHandle, RenderedOutput};
    use crate::output::Output;
    use crate::references::ReferenceStatus;
    use crate::token::{Token, TokenType};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn comptime_def(name: &str) -> ObjectDefinition {
        let context = EvaluatorContext::module_top_level(ModuleId(0));
        let mut def = ObjectDefinition::new(name, ObjectKind::CompileTimeMacro, None, context, crate::output::OutputId::new(0));
        def.is_required = true;
        def
    }

    #[test]
    fn a_definition_with_no_references_is_immediately_a_candidate() {
        let mut defs = ObjectDefinitionMap::new();
        defs.insert("m".to_string(), comptime_def("m"));
        assert_eq!(select_build_candidates(&defs), vec!["m".to_string()]);
    }

    #[test]
    fn an_unresolved_non_guessed_reference_blocks_candidacy() {
        let mut defs = ObjectDefinitionMap::new();
        let mut def = comptime_def("m");
        def.references.insert("helper".to_string(), ReferenceStatus::default());
        defs.insert("m".to_string(), def);
        assert!(select_build_candidates(&defs).is_empty());
    }

    #[test]
    fn not_required_is_never_a_candidate() {
        let mut defs = ObjectDefinitionMap::new();
        let mut def = comptime_def("m");
        def.is_required = false;
        defs.insert("m".to_string(), def);
        assert!(select_build_candidates(&defs).is_empty());
    }

    #[test]
    fn stage_advances_in_order_and_saturates_at_finished() {
        let mut stage = BuildStage::None;
        for expected in [BuildStage::Compiling, BuildStage::Linking, BuildStage::Loading, BuildStage::ResolvingReferences, BuildStage::Finished] {
            stage = advance(stage);
            assert_eq!(stage, expected);
        }
        assert_eq!(advance(stage), BuildStage::Finished);
    }

    struct FakeWriter;
    impl Writer for FakeWriter {
        fn render(&self, _output: &Output) -> EvalResult<RenderedOutput> {
            Ok(RenderedOutput { source_text: "void add_greet() {}".to_string(), header_text: "void add_greet();".to_string() })
        }
    }

    struct SucceedingProcessRunner;
    impl ProcessRunner for SucceedingProcessRunner {
        fn run_wave(&self, invocations: &[ProcessInvocation]) -> Vec<crate::interfaces::ProcessOutcome> {
            invocations
                .iter()
                .map(|inv| crate::interfaces::ProcessOutcome { label: inv.label.clone(), success: true, stdout: String::new(), stderr: String::new() })
                .collect()
        }
    }

    struct FailingProcessRunner;
    impl ProcessRunner for FailingProcessRunner {
        fn run_wave(&self, invocations: &[ProcessInvocation]) -> Vec<crate::interfaces::ProcessOutcome> {
            invocations
                .iter()
                .map(|inv| crate::interfaces::ProcessOutcome { label: inv.label.clone(), success: false, stdout: String::new(), stderr: "boom".to_string() })
                .collect()
        }
    }

    struct PanickingProcessRunner;
    impl ProcessRunner for PanickingProcessRunner {
        fn run_wave(&self, _invocations: &[ProcessInvocation]) -> Vec<crate::interfaces::ProcessOutcome> {
            panic!("a cache-current candidate must not be recompiled");
        }
    }

    #[derive(Default)]
    struct FakeFilesystem {
        files: RefCell<HashMap<String, String>>,
    }
    impl Filesystem for FakeFilesystem {
        fn read_to_string(&self, path: &str) -> EvalResult<String> {
            self.files.borrow().get(path).cloned().ok_or_else(|| Diagnostic {
                blame: Blame { file: String::new(), line: 0, column_start: 0 },
                kind: EvalErrorKind::InvocationError(format!("no such file: {path}")),
                note: None,
            })
        }
        fn write_string(&self, path: &str, contents: &str) -> EvalResult<()> {
            self.files.borrow_mut().insert(path.to_string(), contents.to_string());
            Ok(())
        }
        fn modified_time(&self, _path: &str) -> EvalResult<u64> {
            Ok(0)
        }
        fn exists(&self, path: &str) -> bool {
            self.files.borrow().contains_key(path)
        }
        fn remove_file(&self, path: &str) -> EvalResult<()> {
            self.files.borrow_mut().remove(path);
            Ok(())
        }
    }

    fn stub_add_greet_macro(
        _evaluator: &mut crate::evaluator::Evaluator,
        _invocation: crate::context::Invocation,
        _context: &crate::context::EvaluatorContext,
    ) -> EvalResult<Vec<Token>> {
        Ok(vec![Token::new(TokenType::Symbol, "greet", Rc::from("stub"), 1, 0, 5)])
    }

    struct FakeDynamicLoader;
    impl DynamicLoader for FakeDynamicLoader {
        fn load_library(&self, _path: &str) -> EvalResult<LibraryHandle> {
            Ok(LibraryHandle(0))
        }
        fn find_symbol(&self, _library: LibraryHandle, _symbol_name: &str) -> EvalResult<CompileTimeFn> {
            Ok(CompileTimeFn(stub_add_greet_macro as usize))
        }
    }

    #[test]
    fn a_required_macro_compiles_links_loads_and_becomes_callable() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        env.definitions.insert("add-greet".to_string(), comptime_def("add-greet"));

        let writer = FakeWriter;
        let process_runner = SucceedingProcessRunner;
        let dynamic_loader = FakeDynamicLoader;
        let filesystem = FakeFilesystem::default();
        let mut cache = Cache::new();
        let config = BuildConfig { cache_dir: "/cache".to_string(), ..BuildConfig::default() };

        for _ in 0..5 {
            drive_build_wave(&mut env, &mut dispatch, &writer, &process_runner, &dynamic_loader, &filesystem, &mut cache, &config).unwrap();
        }

        assert_eq!(env.definitions["add-greet"].build_stage, BuildStage::Finished);
        assert!(env.definitions["add-greet"].is_loaded);
        assert!(matches!(dispatch.dispatch("add-greet", &env.definitions), DispatchTarget::Macro(_)));
    }

    #[test]
    fn a_zero_reference_compile_failure_forbids_further_builds() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        env.definitions.insert("m".to_string(), comptime_def("m"));

        let writer = FakeWriter;
        let process_runner = FailingProcessRunner;
        let dynamic_loader = FakeDynamicLoader;
        let filesystem = FakeFilesystem::default();
        let mut cache = Cache::new();
        let config = BuildConfig::default();

        let result = drive_build_wave(&mut env, &mut dispatch, &writer, &process_runner, &dynamic_loader, &filesystem, &mut cache, &config);
        assert!(result.is_err());
        assert!(env.definitions["m"].forbid_build);
        assert!(cache.find(&object_path(&config, "m")).is_none());
    }

    #[test]
    fn a_command_crc_cache_hit_skips_recompilation() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        env.definitions.insert("m".to_string(), comptime_def("m"));

        let config = BuildConfig { cache_dir: "/cache".to_string(), ..BuildConfig::default() };
        let obj = object_path(&config, "m");
        let src = source_path(&config, "m");

        let filesystem = FakeFilesystem::default();
        filesystem.files.borrow_mut().insert(obj.clone(), String::new());

        let header_text = render_auto_header(&env, "m", "void add_greet();");
        let header_crc = crate::cache::crc32(header_text.as_bytes());
        let args = compile_command_args(&config, &src, &obj);
        let command_crc = crate::cache::crc32(args.join(" ").as_bytes());
        let mut cache = Cache::new();
        cache.update(obj, command_crc, header_crc);

        let writer = FakeWriter;
        let process_runner = PanickingProcessRunner;
        let dynamic_loader = FakeDynamicLoader;

        drive_build_wave(&mut env, &mut dispatch, &writer, &process_runner, &dynamic_loader, &filesystem, &mut cache, &config).unwrap();
        assert_eq!(env.definitions["m"].build_stage, BuildStage::Compiling);
    }
}
