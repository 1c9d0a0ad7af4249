use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match sexpc_cli::config::parse(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match sexpc_cli::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            sexpc_cli::report(&err);
            ExitCode::FAILURE
        }
    }
}
