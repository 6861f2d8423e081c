use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{context}: {source}")]
    Tool {
        context: String,
        #[source]
        source: BoxedSource,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("branch `{0}` does not exist")]
    BranchNotFound(String),

    #[error("branch `{0}` already exists")]
    BranchAlreadyExists(String),

    #[error("branch `{branch}` is {status} its remote counterpart; {message}")]
    RemoteState {
        branch: String,
        status: String,
        message: String,
    },

    #[error("{step} stopped on conflicts while updating `{branch}`")]
    MergeConflict {
        step: String,
        branch: String,
        files: Vec<String>,
    },

    #[error("hook `{hook}` rejected the operation (exit {exit_code})")]
    HookRejection {
        hook: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("filter `{filter}` failed (exit {exit_code}){}", render_stderr(.stderr))]
    FilterFailure {
        filter: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{0}")]
    OperationInProgress(String),

    #[error("{0}")]
    InvalidInput(String),
}

fn render_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl FlowError {
    pub fn tool<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FlowError::Tool {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Process exit status the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::Tool { .. } => 1,
            FlowError::Configuration(_) => 2,
            FlowError::BranchNotFound(_) => 3,
            FlowError::BranchAlreadyExists(_) => 4,
            FlowError::RemoteState { .. } => 5,
            FlowError::MergeConflict { .. } => 6,
            FlowError::HookRejection { .. } => 7,
            FlowError::FilterFailure { .. } => 8,
            FlowError::OperationInProgress(_) => 9,
            FlowError::InvalidInput(_) => 10,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, FlowError::MergeConflict { .. })
    }
}
