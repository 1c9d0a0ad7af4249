//! Exercises the comptime build pipeline driving a user-defined macro all the way
//! to becoming a callable dispatch target (spec §8, scenarios 2 and 3), using an
//! in-process stub in place of a real compiler/linker/dynamic loader, per the
//! end-to-end scenarios' own prescribed test strategy.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sexpc_core::{
    default_dispatch_table, run_until_stable, BuildConfig, Cache, CompileTimeFn, Diagnostic, DispatchTable, DynamicLoader, EvalResult, Evaluator, EvaluatorContext,
    EvaluatorEnvironment, Filesystem, GuessState, LibraryHandle, ModuleId, Output, ProcessInvocation, ProcessOutcome, ProcessRunner, RenderedOutput, Token, TokenType,
    Tokenizer as _, Writer,
};
use sexpc_cli::tokenizer::LineTokenizer;

/// Compile/link never actually run; every invocation is reported as a success so
/// the build pipeline advances straight to the Load substage.
struct StubProcessRunner;
impl ProcessRunner for StubProcessRunner {
    fn run_wave(&self, invocations: &[ProcessInvocation]) -> Vec<ProcessOutcome> {
        invocations.iter().map(|inv| ProcessOutcome { label: inv.label.clone(), success: true, stdout: String::new(), stderr: String::new() }).collect()
    }
}

/// Writes rendered artifact text into an in-memory map instead of a real
/// filesystem; `modified_time` is constant since no real mtime comparison is
/// exercised by these scenarios.
#[derive(Default)]
struct StubFilesystem {
    files: RefCell<HashMap<String, String>>,
}
impl Filesystem for StubFilesystem {
    fn read_to_string(&self, path: &str) -> EvalResult<String> {
        self.files.borrow().get(path).cloned().ok_or_else(|| not_found(path))
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

fn not_found(path: &str) -> Diagnostic {
    Diagnostic {
        blame: sexpc_core::Blame { file: String::new(), line: 0, column_start: 0 },
        kind: sexpc_core::EvalErrorKind::ComptimeBuildFailure { name: String::new(), stage: "compile", detail: format!("no such file: {path}") },
        note: None,
    }
}

/// Renders nothing useful (no real C++ codegen in this test); only its success is
/// observed.
struct StubWriter;
impl Writer for StubWriter {
    fn render(&self, _output: &Output) -> EvalResult<RenderedOutput> {
        Ok(RenderedOutput { source_text: String::new(), header_text: String::new() })
    }
}

fn stub_token(text: &str) -> Token {
    Token::new(TokenType::Symbol, text, Rc::from("stub"), 1, 0, text.len() as u32)
}

fn paren(text: &str) -> Token {
    let kind = if text == "(" { TokenType::OpenParen } else { TokenType::CloseParen };
    Token::new(kind, text, Rc::from("stub"), 1, 0, 1)
}

/// Stands in for a natively-compiled `add-greet`: expands to
/// `(defun greet () (printf "hi"))`, matching scenario 2's macro body verbatim.
fn stub_add_greet_macro(
    _evaluator: &mut sexpc_core::Evaluator,
    _invocation: sexpc_core::Invocation,
    _context: &EvaluatorContext,
) -> EvalResult<Vec<Token>> {
    Ok(vec![
        paren("("),
        stub_token("defun"),
        stub_token("greet"),
        paren("("),
        paren(")"),
        paren("("),
        stub_token("printf"),
        Token::new(TokenType::String, "\"hi\"", Rc::from("stub"), 1, 0, 4),
        paren(")"),
        paren(")"),
    ])
}

/// Stands in for a natively-compiled `my-macro`: expands to `(* 1 1)`, matching
/// scenario 3's expansion for a call site of `(my-macro 1)`.
fn stub_my_macro(_evaluator: &mut sexpc_core::Evaluator, _invocation: sexpc_core::Invocation, _context: &EvaluatorContext) -> EvalResult<Vec<Token>> {
    Ok(vec![paren("("), stub_token("*"), stub_token("1"), stub_token("1"), paren(")")])
}

struct StubDynamicLoader {
    symbols: HashMap<&'static str, CompileTimeFn>,
}
impl DynamicLoader for StubDynamicLoader {
    fn load_library(&self, _path: &str) -> EvalResult<LibraryHandle> {
        Ok(LibraryHandle(0))
    }
    fn find_symbol(&self, _library: LibraryHandle, symbol_name: &str) -> EvalResult<CompileTimeFn> {
        self.symbols.get(symbol_name).copied().ok_or_else(|| not_found(symbol_name))
    }
}

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

fn run_with_stub(env: &mut EvaluatorEnvironment, dispatch: &mut DispatchTable, symbols: HashMap<&'static str, CompileTimeFn>) {
    let writer = StubWriter;
    let process_runner = StubProcessRunner;
    let dynamic_loader = StubDynamicLoader { symbols };
    let filesystem = StubFilesystem::default();
    let mut cache = Cache::new();
    let config = BuildConfig { cache_dir: "/comptime".to_string(), ..BuildConfig::default() };
    run_until_stable(env, dispatch, &writer, &process_runner, &dynamic_loader, &filesystem, &mut cache, &config).unwrap();
}

#[test]
fn a_macro_creating_a_definition_contributes_it_to_the_build() {
    let (mut env, mut dispatch) = evaluate(r#"(defmacro add-greet () (tokenize-push output (defun greet () (printf "hi"))) true) (add-greet) (defun main () (greet))"#);

    let mut symbols = HashMap::new();
    symbols.insert("add_greet", CompileTimeFn(stub_add_greet_macro as usize));
    run_with_stub(&mut env, &mut dispatch, symbols);

    assert!(env.definitions.contains_key("greet"), "add-greet's expansion should have inserted a `greet` definition");
    assert!(env.definitions["greet"].is_required, "main's call to greet makes it required");
    assert!(env.definitions["add-greet"].is_loaded);
}

#[test]
fn a_forward_reference_to_a_later_macro_resolves_once_it_is_built() {
    let (mut env, mut dispatch) =
        evaluate("(defun user () (my-macro 1)) (defmacro my-macro (x) (tokenize-push output (* (token-splice x) (token-splice x))) true)");

    assert_eq!(env.definitions["user"].references["my-macro"].guess_state.state, GuessState::Guessed);

    let mut symbols = HashMap::new();
    symbols.insert("my_macro", CompileTimeFn(stub_my_macro as usize));
    run_with_stub(&mut env, &mut dispatch, symbols);

    assert_eq!(env.definitions["user"].references["my-macro"].guess_state.state, GuessState::Resolved);
    assert!(env.definitions["my-macro"].is_loaded);
}
