//! The driver crate's real logic, split out of `main.rs` so the evaluation pipeline
//! (tokenize → evaluate → resolve → render → cache → optional compile+execute) is
//! exercisable directly from integration tests, the same way `sexpc-core`'s own
//! logic is tested without going through any binary.

pub mod config;
pub mod dynamic_loader;
pub mod filesystem;
pub mod process_runner;
pub mod tokenizer;
pub mod writer;

use sexpc_core::{
    default_dispatch_table, flatten, run_until_stable, Blame, BuildConfig, Cache, Diagnostic, EvalErrorKind, EvaluatorContext, EvaluatorEnvironment, Filesystem as _, ModuleId,
    ObjectKind, ProcessInvocation, ProcessRunner as _, Tokenizer as TokenizerTrait, Writer as WriterTrait,
};

use config::Config;
use dynamic_loader::LibLoader;
use filesystem::StdFilesystem;
use process_runner::CappedProcessRunner;
use tokenizer::LineTokenizer;
use writer::PrettyWriter;

pub fn report(err: &Diagnostic) {
    eprintln!("{err}");
}

/// Tokenizes and evaluates every input file in order, runs the fixpoint control
/// loop (which itself drives the comptime build pipeline: compiling, linking and
/// loading every required macro/generator/compile-time function so it becomes
/// callable by name), renders every required runtime definition, writes the
/// `.cpp`/`.h` pair and the cache file, and optionally compiles and executes the
/// result. Mirrors the teacher's `ModuleManager.cpp`/`Main.cpp` orchestration
/// order: load → evaluate → build comptime code → resolve → write → build runtime
/// artifact.
pub fn run(config: &Config) -> Result<(), Diagnostic> {
    let fs = StdFilesystem::new();
    let tokenizer = LineTokenizer::new();
    let mut dispatch = default_dispatch_table();
    let mut env = EvaluatorEnvironment::new();

    for (module_index, input) in config.input_files.iter().enumerate() {
        let resolved = filesystem::search_for_file(input.to_string_lossy().as_ref(), &config.search_paths).unwrap_or_else(|| input.clone());
        let file_name = resolved.to_string_lossy().to_string();
        let source = fs.read_to_string(&file_name)?;
        let tokens = tokenizer.tokenize(&source, &file_name)?;
        let len = tokens.len();
        let vec_id = env.tokens.push(tokens);

        let module_context = EvaluatorContext::module_top_level(ModuleId(module_index as u32));
        let module_output = env.definitions[sexpc_core::GLOBAL_DEFINITION_NAME].output;
        let mut evaluator = sexpc_core::Evaluator::new(&mut env, &dispatch);
        evaluator.evaluate_all(vec_id, 0, len, module_output, &module_context)?;
    }

    let comptime_cache_dir = config.output_dir.join("comptime-cache");
    let comptime_writer = PrettyWriter::default();
    let comptime_process_runner = CappedProcessRunner::host_recommended();
    let dynamic_loader = LibLoader::new();
    let build_config = BuildConfig { cache_dir: comptime_cache_dir.to_string_lossy().to_string(), compiler: config.compiler.clone(), compiler_flags: Vec::new() };
    let comptime_cache_path = comptime_cache_dir.join("Cache.cake");
    let mut comptime_cache = if !config.ignore_cache && fs.exists(&comptime_cache_path.to_string_lossy()) {
        let text = fs.read_to_string(&comptime_cache_path.to_string_lossy())?;
        sexpc_core::parse_cache(&text)?
    } else {
        Cache::new()
    };

    run_until_stable(&mut env, &mut dispatch, &comptime_writer, &comptime_process_runner, &dynamic_loader, &fs, &mut comptime_cache, &build_config)?;

    fs.write_string(&comptime_cache_path.to_string_lossy(), &sexpc_core::serialize_cache(&comptime_cache))?;

    let rendered = render_required_definitions(&env, &PrettyWriter::default())?;

    let artifact_name = config
        .input_files
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "module".to_string());

    let source_path = config.output_dir.join(format!("{artifact_name}.cpp"));
    let header_path = config.output_dir.join(format!("{artifact_name}.h"));
    fs.write_string(&source_path.to_string_lossy(), &rendered.0)?;
    fs.write_string(&header_path.to_string_lossy(), &rendered.1)?;

    let command_crc = sexpc_core::crc32(rendered.0.as_bytes());
    let cache_path = config.output_dir.join("Cache.cake");
    let mut cache = if !config.ignore_cache && fs.exists(&cache_path.to_string_lossy()) {
        let text = fs.read_to_string(&cache_path.to_string_lossy())?;
        sexpc_core::parse_cache(&text)?
    } else {
        sexpc_core::Cache::new()
    };
    let header_crc = sexpc_core::crc32(rendered.1.as_bytes());
    let up_to_date = !config.ignore_cache && cache.is_up_to_date(&artifact_name, command_crc, header_crc);
    cache.update(&artifact_name, command_crc, header_crc);
    fs.write_string(&cache_path.to_string_lossy(), &sexpc_core::serialize_cache(&cache))?;

    if config.execute_after_build {
        let runner = CappedProcessRunner::host_recommended();
        let binary_path = config.output_dir.join(&artifact_name);
        if !up_to_date || !fs.exists(&binary_path.to_string_lossy()) {
            let compile = ProcessInvocation {
                program: config.compiler.clone(),
                args: vec![source_path.to_string_lossy().to_string(), "-o".to_string(), binary_path.to_string_lossy().to_string()],
                label: format!("compile {artifact_name}"),
            };
            let outcomes = runner.run_wave(&[compile]);
            if let Some(outcome) = outcomes.first() {
                if !outcome.success {
                    return Err(Diagnostic {
                        blame: Blame { file: source_path.to_string_lossy().to_string(), line: 0, column_start: 0 },
                        kind: EvalErrorKind::ComptimeBuildFailure { name: artifact_name.clone(), stage: "compile", detail: outcome.stderr.clone() },
                        note: None,
                    });
                }
            }
        }
        let run = ProcessInvocation { program: binary_path.to_string_lossy().to_string(), args: vec![], label: artifact_name.clone() };
        for outcome in runner.run_wave(&[run]) {
            print!("{}", outcome.stdout);
            eprint!("{}", outcome.stderr);
        }
    }

    Ok(())
}

/// Concatenates every required runtime (`Function`/`Variable`) definition's
/// flattened output, in definition order, plus anything the module top level wrote
/// directly into the global pseudo-object's own output.
pub fn render_required_definitions(env: &EvaluatorEnvironment, writer: &PrettyWriter) -> Result<(String, String), Diagnostic> {
    let mut source_text = String::new();
    let mut header_text = String::new();

    let global = &env.definitions[sexpc_core::GLOBAL_DEFINITION_NAME];
    let global_rendered = writer.render(&flatten(&env.outputs, global.output)?)?;
    source_text.push_str(&global_rendered.source_text);
    header_text.push_str(&global_rendered.header_text);

    for def in env.definitions.values() {
        if matches!(def.kind, ObjectKind::Function | ObjectKind::Variable) && def.is_required {
            let rendered = writer.render(&flatten(&env.outputs, def.output)?)?;
            source_text.push_str(&rendered.source_text);
            source_text.push('\n');
            header_text.push_str(&rendered.header_text);
            header_text.push('\n');
        }
    }

    Ok((source_text, header_text))
}
