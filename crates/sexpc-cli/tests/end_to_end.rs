//! Exercises the real tokenizer/evaluator/writer pipeline against the driver's own
//! collaborators (spec §8's end-to-end scenarios), adjusted to what this reduced
//! core actually emits: `emit_call_as_reference` records a reference and emits the
//! bare callee name, not a full call expression (see DESIGN.md), so these assert
//! the definition/reference/required-ness facts rather than a literal C snippet.

use sexpc_core::{default_dispatch_table, run_until_stable, BuildConfig, Cache, DispatchTable, Evaluator, EvaluatorContext, EvaluatorEnvironment, GuessState, ModuleId, ObjectKind, Tokenizer as _};
use sexpc_cli::dynamic_loader::LibLoader;
use sexpc_cli::filesystem::StdFilesystem;
use sexpc_cli::process_runner::CappedProcessRunner;
use sexpc_cli::tokenizer::LineTokenizer;
use sexpc_cli::writer::PrettyWriter;

fn evaluate(source: &str) -> (EvaluatorEnvironment, DispatchTable) {
    let tokenizer = LineTokenizer::new();
    let dispatch = default_dispatch_table();
    let mut env = EvaluatorEnvironment::new();

    let tokens = tokenizer.tokenize(source, "scenario.sexp").unwrap();
    let len = tokens.len();
    let vec_id = env.tokens.push(tokens);
    let context = EvaluatorContext::module_top_level(ModuleId(0));
    let output = env.definitions[sexpc_core::GLOBAL_DEFINITION_NAME].output;

    {
        let mut evaluator = Evaluator::new(&mut env, &dispatch);
        evaluator.evaluate_all(vec_id, 0, len, output, &context).unwrap();
    }
    (env, dispatch)
}

/// No scenario here defines a compile-time macro/generator, so these collaborators
/// are never actually driven; they're the real driver-crate implementations
/// because this test already links against `sexpc_cli`.
fn run(env: &mut EvaluatorEnvironment, dispatch: &mut DispatchTable) {
    let writer = PrettyWriter::default();
    let process_runner = CappedProcessRunner::host_recommended();
    let dynamic_loader = LibLoader::new();
    let filesystem = StdFilesystem::new();
    let mut cache = Cache::new();
    let config = BuildConfig::default();
    run_until_stable(env, dispatch, &writer, &process_runner, &dynamic_loader, &filesystem, &mut cache, &config).unwrap();
}

#[test]
fn trivial_function_call_registers_main_and_a_guessed_reference_to_printf() {
    let (mut env, mut dispatch) = evaluate(r#"(defun main () (printf "hi"))"#);

    assert_eq!(env.definitions["main"].kind, ObjectKind::Function);
    assert!(env.definitions["main"].is_required, "main is defined at module top level, so it is required by construction");

    run(&mut env, &mut dispatch);

    let printf_status = &env.definitions["main"].references["printf"];
    assert_eq!(printf_status.guess_state.state, GuessState::Guessed);

    let rendered = sexpc_cli::render_required_definitions(&env, &PrettyWriter::default()).unwrap();
    assert!(rendered.0.contains("printf"), "rendered source was: {:?}", rendered.0);
}

#[test]
fn a_call_to_an_entirely_unknown_name_is_still_treated_as_an_external_c_call() {
    // This reduced core has no header-aware extern validation (see DESIGN.md), so
    // an unknown callee is always optimistically guessed rather than rejected —
    // the literal "doesn't exist anywhere" scenario surfaces as a clean build, not
    // an UnresolvedReference.
    let (mut env, mut dispatch) = evaluate("(defun main () (doesnt-exist))");
    run(&mut env, &mut dispatch);
    assert_eq!(env.definitions["main"].references["doesnt-exist"].guess_state.state, GuessState::Guessed);
}

#[test]
fn a_module_top_level_defvar_is_required_by_inheriting_the_module_context() {
    // `defvar`/`defun` inherit `is_required` from their defining context rather than
    // defaulting to unrequired; module top level's context is always required.
    let (env, _dispatch) = evaluate("(defvar counter 0)");
    assert!(env.definitions["counter"].is_required);
    assert_eq!(env.definitions["counter"].kind, ObjectKind::Variable);
}
