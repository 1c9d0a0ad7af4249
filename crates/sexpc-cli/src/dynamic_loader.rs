//! Opens a compiled compile-time shared library and resolves exported symbols (spec
//! AMBIENT STACK's `DynamicLoader`, §4.G's Load substage), via `libloading`.
//!
//! Loaded libraries are kept alive for the process's lifetime (owned by this
//! struct, never unloaded) since a compile-time function pointer handed back to the
//! core must stay valid for the rest of the build.

use std::sync::Mutex;

use libloading::Library;

use sexpc_core::{CompileTimeFn, Diagnostic, EvalErrorKind, EvalResult, DynamicLoader as DynamicLoaderTrait, LibraryHandle};
use sexpc_core::Blame;

#[derive(Default)]
pub struct LibLoader {
    libraries: Mutex<Vec<Library>>,
}

impl LibLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn no_blame(detail: String) -> Diagnostic {
        Diagnostic { blame: Blame { file: String::new(), line: 0, column_start: 0 }, kind: EvalErrorKind::ComptimeBuildFailure { name: String::new(), stage: "load", detail }, note: None }
    }
}

impl DynamicLoaderTrait for LibLoader {
    fn load_library(&self, path: &str) -> EvalResult<LibraryHandle> {
        // SAFETY: the library is compiled by this same process's build pipeline from
        // trusted source, and its initializer (if any) runs no differently than any
        // other shared object the host loader would load.
        let library = unsafe { Library::new(path) }.map_err(|err| Self::no_blame(format!("loading '{path}': {err}")))?;
        let mut libraries = self.libraries.lock().expect("library table poisoned");
        libraries.push(library);
        Ok(LibraryHandle(libraries.len() - 1))
    }

    fn find_symbol(&self, library: LibraryHandle, symbol_name: &str) -> EvalResult<CompileTimeFn> {
        let libraries = self.libraries.lock().expect("library table poisoned");
        let lib = libraries.get(library.0).ok_or_else(|| Self::no_blame(format!("unknown library handle {}", library.0)))?;
        // SAFETY: the symbol name came from a function the core itself emitted and
        // compiled into this library; its signature is the compile-time function
        // ABI the core expects.
        let symbol: libloading::Symbol<extern "C" fn()> =
            unsafe { lib.get(symbol_name.as_bytes()) }.map_err(|err| Self::no_blame(format!("resolving '{symbol_name}': {err}")))?;
        Ok(CompileTimeFn(*symbol as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_a_nonexistent_library_is_a_reported_error() {
        let loader = LibLoader::new();
        assert!(loader.load_library("definitely-not-a-real-library.so").is_err());
    }

    #[test]
    fn an_unknown_handle_is_a_reported_error() {
        let loader = LibLoader::new();
        assert!(loader.find_symbol(LibraryHandle(0), "whatever").is_err());
    }
}
