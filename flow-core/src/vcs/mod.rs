mod branches;
mod config;
mod credentials;
mod merge;
mod rebase;
mod remotes;
mod status;
mod tags;
mod verify;

pub use branches::{
    branch_exists_in, checkout_branch_in, create_branch_from_in, create_root_commit_in,
    create_tracking_branch_in, current_branch_name_in, delete_branch_in, head_is_unborn_in,
    is_merged_into_in, list_local_branches_in, remote_branch_exists_in, rename_branch_in,
    set_upstream_in,
};
pub use config::{
    ConfigScope, config_entries_in, get_config_in, parse_config_bool, remove_section_in,
    set_config_in, unset_config_in,
};
pub use credentials::{AttemptResult, CredentialAttempt, CredentialSource};
pub use merge::{
    CommitSettings, StepOutcome, continue_merge_in, continue_squash_in, merge_into_head_in,
    squash_into_head_in,
};
pub use rebase::{
    RebaseSettings, abort_in_progress_in, continue_rebase_and_advance_in, continue_rebase_in,
    rebase_and_advance_in, rebase_branch_in,
};
pub use remotes::{
    RemoteError, RemoteErrorKind, TrackingCounts, ahead_behind_in, delete_remote_branch_in,
    fetch_in, push_refspecs_in,
};
pub use status::{diff_against_merge_base_in, git_dir_in, is_clean_in, repo_root};
pub use tags::{TagSettings, create_annotated_tag_in, tag_exists_in};
pub use verify::{hooks_dir_in, is_executable};
