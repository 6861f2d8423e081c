use crate::state::MergeOperationState;
use crate::sync::AheadBehind;
use crate::topology::MergeStrategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeDirection {
    /// A topic branch flowing into its parent.
    Upstream,
    /// A parent flowing into a child base branch or topic branch.
    Downstream,
}

/// One integration step between two branches. The backend checks out whatever it needs and
/// leaves `target` checked out when it returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeRequest {
    pub strategy: MergeStrategy,
    pub source: String,
    pub target: String,
    pub direction: MergeDirection,
    pub message: Option<String>,
    pub no_verify: bool,
    pub fast_forward: bool,
    pub preserve_merges: bool,
    pub interactive: bool,
}

impl MergeRequest {
    pub fn new(
        strategy: MergeStrategy,
        source: &str,
        target: &str,
        direction: MergeDirection,
    ) -> Self {
        Self {
            strategy,
            source: source.to_string(),
            target: target.to_string(),
            direction,
            message: None,
            no_verify: false,
            fast_forward: direction == MergeDirection::Downstream,
            preserve_merges: false,
            interactive: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Success,
    Conflict { files: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagRequest {
    pub name: String,
    pub target: String,
    pub message: String,
    pub sign: bool,
    pub signing_key: Option<String>,
}

pub trait RepoPort {
    type Error: std::error::Error + Send + Sync + 'static;

    fn current_branch(&self) -> Result<Option<String>, Self::Error>;
    fn branch_exists(&self, branch: &str) -> Result<bool, Self::Error>;
    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, Self::Error>;
    fn list_branches(&self) -> Result<Vec<String>, Self::Error>;
    fn is_clean(&self) -> Result<bool, Self::Error>;

    fn create_branch(&self, branch: &str, start_point: &str) -> Result<(), Self::Error>;
    fn create_tracking_branch(&self, branch: &str, remote: &str) -> Result<(), Self::Error>;
    fn checkout(&self, branch: &str) -> Result<(), Self::Error>;
    fn delete_branch(&self, branch: &str, force: bool) -> Result<(), Self::Error>;
    fn rename_branch(&self, from: &str, to: &str) -> Result<(), Self::Error>;
    fn is_merged_into(&self, branch: &str, target: &str) -> Result<bool, Self::Error>;

    fn tracking_counts(
        &self,
        branch: &str,
        remote: &str,
    ) -> Result<Option<AheadBehind>, Self::Error>;
    fn fetch(&self, remote: &str, branches: &[String]) -> Result<(), Self::Error>;
    fn push(
        &self,
        remote: &str,
        refspecs: &[String],
        push_options: &[String],
    ) -> Result<(), Self::Error>;
    fn set_upstream(&self, branch: &str, remote: &str) -> Result<(), Self::Error>;
    fn delete_remote_branch(
        &self,
        remote: &str,
        branch: &str,
        push_options: &[String],
    ) -> Result<(), Self::Error>;

    fn apply_strategy(&self, request: &MergeRequest) -> Result<MergeOutcome, Self::Error>;
    /// Resume a step that previously returned a conflict.
    fn continue_strategy(&self, request: &MergeRequest) -> Result<MergeOutcome, Self::Error>;
    fn abort_in_progress(&self) -> Result<(), Self::Error>;

    fn tag_exists(&self, tag: &str) -> Result<bool, Self::Error>;
    fn create_tag(&self, request: &TagRequest) -> Result<(), Self::Error>;

    fn stored_base(&self, branch: &str) -> Result<Option<String>, Self::Error>;
    fn set_stored_base(&self, branch: &str, base: &str) -> Result<(), Self::Error>;
    fn clear_stored_base(&self, branch: &str) -> Result<(), Self::Error>;

    /// Patch of `branch` against its merge base with `base`.
    fn diff_against(&self, base: &str, branch: &str) -> Result<String, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

/// Everything a hook script learns about the operation it wraps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HookContext {
    pub branch_type: String,
    pub action: String,
    pub full_branch: String,
    pub short_name: String,
    pub base_branch: String,
    pub remote: String,
    pub version: Option<String>,
    pub exit_code: Option<i32>,
}

impl HookContext {
    pub fn hook_name(&self, phase: HookPhase) -> String {
        format!("{}-flow-{}-{}", phase.as_str(), self.branch_type, self.action)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Missing,
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

pub trait HookPort {
    type Error: std::error::Error + Send + Sync + 'static;

    fn run_hook(
        &self,
        phase: HookPhase,
        context: &HookContext,
    ) -> Result<HookOutcome, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    StartVersion,
    FinishTagMessage,
}

impl FilterKind {
    pub fn script_name(&self, branch_type: &str) -> String {
        match self {
            FilterKind::StartVersion => format!("filter-flow-{branch_type}-start-version"),
            FilterKind::FinishTagMessage => {
                format!("filter-flow-{branch_type}-finish-tag-message")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Missing,
    Output(String),
    Failed { exit_code: i32, stderr: String },
}

pub trait FilterPort {
    type Error: std::error::Error + Send + Sync + 'static;

    fn run_filter(
        &self,
        kind: FilterKind,
        branch_type: &str,
        args: &[String],
    ) -> Result<FilterOutcome, Self::Error>;
}

/// Single-slot storage for the in-progress operation record.
pub trait StateStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, state: &MergeOperationState) -> Result<(), Self::Error>;
    fn load(&self) -> Result<Option<MergeOperationState>, Self::Error>;
    fn clear(&self) -> Result<(), Self::Error>;
    fn exists(&self) -> Result<bool, Self::Error>;
    fn location(&self) -> String;
}

pub trait ClockPort {
    fn now_rfc3339(&self) -> String;
}

pub trait EventSink {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn progress(&self, message: &str);
}
