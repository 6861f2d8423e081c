mod actions;
mod cli;
mod completions;
mod errors;

pub use errors::{ReportedError, exit_code_for};

pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    cli::dispatch::run()
}

/// Print a failure from [`run_cli`] and return the exit code to use.
pub fn report_error(err: &(dyn std::error::Error + 'static)) -> i32 {
    errors::report(err)
}
