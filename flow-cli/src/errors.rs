use std::error::Error;

use flow_core::display;
use flow_kernel::FlowError;

/// An error whose explanation has already been written to the terminal.
#[derive(Debug)]
pub struct ReportedError {
    code: i32,
}

impl ReportedError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

impl std::fmt::Display for ReportedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command failed with exit code {}", self.code)
    }
}

impl Error for ReportedError {}

/// Exit code for an error returned by [`crate::run_cli`].
pub fn exit_code_for(err: &(dyn Error + 'static)) -> i32 {
    if let Some(reported) = err.downcast_ref::<ReportedError>() {
        return reported.code();
    }
    if let Some(flow) = err.downcast_ref::<FlowError>() {
        return flow.exit_code();
    }
    1
}

/// Print `err` unless it was already shown, and return the process exit code.
pub fn report(err: &(dyn Error + 'static)) -> i32 {
    if err.downcast_ref::<ReportedError>().is_none() {
        display::error(render_chain(err));
        if let Some(FlowError::HookRejection { stderr, .. }) = err.downcast_ref::<FlowError>() {
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                eprintln!("{stderr}");
            }
        }
    }
    exit_code_for(err)
}

fn render_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
