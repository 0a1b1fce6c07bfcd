use std::process::ExitCode;
use tagdir_pipeline::errors::AppError;

fn main() -> ExitCode {
    tagdir_pipeline::init_tracing();
    match tagdir_pipeline::cli::parse_from_env().and_then(tagdir_pipeline::run_from_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::HelpRequested) => {
            println!("{}", tagdir_pipeline::cli::usage());
            ExitCode::from(AppError::HelpRequested.category().exit_code())
        }
        Err(error) => {
            eprintln!("tagdir_pipeline: {error}");
            if error.shows_usage() {
                eprintln!("\n{}", tagdir_pipeline::cli::usage());
            }
            ExitCode::from(error.category().exit_code())
        }
    }
}
