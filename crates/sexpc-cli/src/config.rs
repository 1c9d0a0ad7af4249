//! Command-line configuration (spec AMBIENT STACK). Parsed by hand from
//! `std::env::args()`, matching the driver's existing style of reading argv
//! directly rather than pulling in an argument-parsing crate for a handful of
//! flags.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub input_files: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub execute_after_build: bool,
    pub ignore_cache: bool,
    pub build_config_label: Option<String>,
    /// The toolchain command used to compile the final generated source. No
    /// config-file format is mandated for this, same as the rest of the toolchain
    /// settings — it's a plain field with a documented default, overridable by flag.
    pub compiler: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            search_paths: Vec::new(),
            output_dir: PathBuf::from("sexpc-build"),
            execute_after_build: false,
            ignore_cache: false,
            build_config_label: None,
            compiler: "c++".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Parses argv (excluding the program name). Recognized flags: `--search-path
/// DIR`, `--output-dir DIR`, `--execute`, `--ignore-cache`, `--build-config-label
/// NAME`. Every other bare argument is treated as an input file.
pub fn parse(args: &[String]) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--search-path" => {
                let dir = iter.next().ok_or_else(|| ConfigError("--search-path requires a directory argument".to_string()))?;
                config.search_paths.push(PathBuf::from(dir));
            }
            "--output-dir" => {
                let dir = iter.next().ok_or_else(|| ConfigError("--output-dir requires a directory argument".to_string()))?;
                config.output_dir = PathBuf::from(dir);
            }
            "--execute" => config.execute_after_build = true,
            "--ignore-cache" => config.ignore_cache = true,
            "--build-config-label" => {
                let label = iter.next().ok_or_else(|| ConfigError("--build-config-label requires a value".to_string()))?;
                config.build_config_label = Some(label.clone());
            }
            "--compiler" => {
                let compiler = iter.next().ok_or_else(|| ConfigError("--compiler requires a value".to_string()))?;
                config.compiler = compiler.clone();
            }
            other if other.starts_with("--") => {
                return Err(ConfigError(format!("unrecognized flag: {other}")));
            }
            input => config.input_files.push(PathBuf::from(input)),
        }
    }
    if config.input_files.is_empty() {
        return Err(ConfigError("no input files given".to_string()));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_bare_inputs() {
        let config = parse(&args(&["main.sexp", "--search-path", "lib", "--execute", "--ignore-cache"])).unwrap();
        assert_eq!(config.input_files, vec![PathBuf::from("main.sexp")]);
        assert_eq!(config.search_paths, vec![PathBuf::from("lib")]);
        assert!(config.execute_after_build);
        assert!(config.ignore_cache);
    }

    #[test]
    fn requires_at_least_one_input_file() {
        assert!(parse(&args(&["--execute"])).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&args(&["main.sexp", "--bogus"])).is_err());
    }
}
