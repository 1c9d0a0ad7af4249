//! External collaborator traits (spec §6): the core evaluates and builds the
//! definition graph but never touches a filesystem, spawns a process, or loads a
//! shared library itself. The driver crate provides real implementations; tests in
//! this crate use small in-memory stand-ins.

use crate::dispatch::CompileTimeFn;
use crate::error::EvalResult;
use crate::output::Output;
use crate::token::Token;

/// Produces tokens from raw source text. Pure lexing — no evaluation semantics —
/// which is why it is entirely a driver concern (spec AMBIENT STACK).
pub trait Tokenizer {
    fn tokenize(&self, source: &str, file_name: &str) -> EvalResult<Vec<Token>>;
}

/// Renders a resolved [`Output`] (every splice already filled) to source and header
/// text, applying modifier-driven name-style conversion.
pub trait Writer {
    fn render(&self, output: &Output) -> EvalResult<RenderedOutput>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedOutput {
    pub source_text: String,
    pub header_text: String,
}

/// One subprocess invocation: argv plus a human-readable label for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub label: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns compiler/linker subprocesses in capped concurrent waves (spec §5, §4.G).
/// `run_wave` blocks until every invocation in the batch has finished, mirroring the
/// original's drain-before-next-wave scheduling.
pub trait ProcessRunner {
    fn run_wave(&self, invocations: &[ProcessInvocation]) -> Vec<ProcessOutcome>;
}

/// Opens a compiled shared library and resolves a function-name-style-converted
/// symbol (spec §4.G Load substage).
pub trait DynamicLoader {
    fn load_library(&self, path: &str) -> EvalResult<LibraryHandle>;
    fn find_symbol(&self, library: LibraryHandle, symbol_name: &str) -> EvalResult<CompileTimeFn>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(pub usize);

/// Reads/writes artifact and cache files. Kept as a trait (rather than calling
/// `std::fs` directly from the core) so evaluator-level tests never touch a real
/// filesystem.
pub trait Filesystem {
    fn read_to_string(&self, path: &str) -> EvalResult<String>;
    fn write_string(&self, path: &str, contents: &str) -> EvalResult<()>;
    fn modified_time(&self, path: &str) -> EvalResult<u64>;
    fn exists(&self, path: &str) -> bool;
    fn remove_file(&self, path: &str) -> EvalResult<()>;
}
