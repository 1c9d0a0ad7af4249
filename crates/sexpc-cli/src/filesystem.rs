//! Plain `std::fs` implementation of the core's `Filesystem` trait (spec AMBIENT
//! STACK), plus the search-path-aware lookup helper the CLI and cache layer use
//! (`searchForFileInPaths`'s equivalent).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sexpc_core::{Diagnostic, EvalErrorKind, EvalResult, Filesystem as FilesystemTrait};
use sexpc_core::Blame;

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFilesystem;

impl StdFilesystem {
    pub fn new() -> Self {
        Self
    }

    fn io_error(path: &str, err: std::io::Error) -> Diagnostic {
        Diagnostic {
            blame: Blame { file: path.to_string(), line: 0, column_start: 0 },
            kind: EvalErrorKind::LexicalError(format!("filesystem error on '{path}': {err}")),
            note: None,
        }
    }
}

impl FilesystemTrait for StdFilesystem {
    fn read_to_string(&self, path: &str) -> EvalResult<String> {
        fs::read_to_string(path).map_err(|err| Self::io_error(path, err))
    }

    fn write_string(&self, path: &str, contents: &str) -> EvalResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| Self::io_error(path, err))?;
            }
        }
        fs::write(path, contents).map_err(|err| Self::io_error(path, err))
    }

    fn modified_time(&self, path: &str) -> EvalResult<u64> {
        let metadata = fs::metadata(path).map_err(|err| Self::io_error(path, err))?;
        let modified = metadata.modified().map_err(|err| Self::io_error(path, err))?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(since_epoch.as_secs())
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn remove_file(&self, path: &str) -> EvalResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_error(path, err)),
        }
    }
}

/// Finds `file_name` in `search_paths` (tried in order), falling back to treating it
/// as already-resolvable relative to the current directory. Mirrors the original's
/// `searchForFileInPaths`: first match wins, no merging across directories.
pub fn search_for_file(file_name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    if Path::new(file_name).exists() {
        return Some(PathBuf::from(file_name));
    }
    for dir in search_paths {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
