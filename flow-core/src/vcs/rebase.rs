use git2::build::CheckoutBuilder;
use git2::{BranchType, Error, ErrorCode, Rebase, RebaseOptions, Repository, RepositoryState};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::branches::{checkout_branch_impl, is_merged_impl, resolve_commit};
use super::merge::{
    StepOutcome, abort_merge_impl, collect_conflict_paths, fast_forward_head, squash_pending,
};
use super::verify::verify_rebase;

#[derive(Debug, Clone, Default)]
pub struct RebaseSettings {
    pub no_verify: bool,
    pub preserve_merges: bool,
    pub interactive: bool,
}

impl RebaseSettings {
    fn needs_git_binary(&self) -> bool {
        self.preserve_merges || self.interactive
    }
}

/// Marks a rebase driven by the `git` binary, which libgit2 cannot resume.
fn cli_marker(repo: &Repository) -> PathBuf {
    repo.path().join("gitflow").join("rebase-cli")
}

pub(crate) fn rebase_in_progress(repo: &Repository) -> bool {
    matches!(
        repo.state(),
        RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge
            | RepositoryState::ApplyMailboxOrRebase
    )
}

fn rebase_options<'cb>() -> RebaseOptions<'cb> {
    let mut checkout = CheckoutBuilder::new();
    checkout
        .allow_conflicts(true)
        .conflict_style_merge(true)
        .safe();
    let mut opts = RebaseOptions::new();
    opts.checkout_options(checkout);
    opts
}

/// Replay `branch` onto `onto`, leaving `branch` checked out.
pub fn rebase_branch_in<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    onto: &str,
    settings: &RebaseSettings,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    rebase_branch_impl(&repo, branch, onto, settings)
}

fn rebase_branch_impl(
    repo: &Repository,
    branch: &str,
    onto: &str,
    settings: &RebaseSettings,
) -> Result<StepOutcome, Error> {
    if repo.state() != RepositoryState::Clean {
        return Err(Error::from_str(
            "cannot start a rebase while another git operation is in progress",
        ));
    }

    checkout_branch_impl(repo, branch)?;
    if is_merged_impl(repo, onto, branch)? {
        return Ok(StepOutcome::Completed);
    }

    if settings.needs_git_binary() {
        return rebase_with_git(repo, onto, settings);
    }

    verify_rebase(repo, onto, branch, settings.no_verify)?;
    let onto_commit = resolve_commit(repo, onto)?;
    let branch_ref = repo.find_branch(branch, BranchType::Local)?.into_reference();
    let branch_annotated = repo.reference_to_annotated_commit(&branch_ref)?;
    let onto_annotated = repo.find_annotated_commit(onto_commit.id())?;

    let mut opts = rebase_options();
    let mut rebase = repo.rebase(
        Some(&branch_annotated),
        Some(&onto_annotated),
        None,
        Some(&mut opts),
    )?;
    drive_rebase(repo, &mut rebase)
}

fn commit_current(repo: &Repository, rebase: &mut Rebase<'_>) -> Result<(), Error> {
    let sig = repo
        .signature()
        .or_else(|_| git2::Signature::now("git-flow", "git-flow@localhost"))?;
    match rebase.commit(None, &sig, None) {
        Ok(_) => Ok(()),
        Err(err) if err.code() == ErrorCode::Applied => Ok(()),
        Err(err) => Err(err),
    }
}

fn drive_rebase(repo: &Repository, rebase: &mut Rebase<'_>) -> Result<StepOutcome, Error> {
    while let Some(operation) = rebase.next() {
        operation?;
        let mut index = repo.index()?;
        if index.has_conflicts() {
            return Ok(StepOutcome::Conflicted {
                files: collect_conflict_paths(&mut index),
            });
        }
        commit_current(repo, rebase)?;
    }
    rebase.finish(None)?;
    Ok(StepOutcome::Completed)
}

/// Resume an interrupted rebase. A rebase the user already finished counts as completed.
pub fn continue_rebase_in<P: AsRef<Path>>(repo_path: P) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    continue_rebase_impl(&repo)
}

fn continue_rebase_impl(repo: &Repository) -> Result<StepOutcome, Error> {
    if cli_marker(repo).exists() {
        return continue_with_git(repo);
    }

    let mut rebase = match repo.open_rebase(None) {
        Ok(rebase) => rebase,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(StepOutcome::Completed),
        Err(err) => return Err(err),
    };

    let mut index = repo.index()?;
    if index.has_conflicts() {
        return Ok(StepOutcome::Conflicted {
            files: collect_conflict_paths(&mut index),
        });
    }
    if rebase.operation_current().is_some() {
        commit_current(repo, &mut rebase)?;
    }
    drive_rebase(repo, &mut rebase)
}

/// Rebase `source` onto `target`, then fast-forward `target` to the result.
pub fn rebase_and_advance_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    target: &str,
    settings: &RebaseSettings,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    match rebase_branch_impl(&repo, source, target, settings)? {
        StepOutcome::Completed => advance(&repo, source, target),
        conflicted => Ok(conflicted),
    }
}

pub fn continue_rebase_and_advance_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    target: &str,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    match continue_rebase_impl(&repo)? {
        StepOutcome::Completed => advance(&repo, source, target),
        conflicted => Ok(conflicted),
    }
}

fn advance(repo: &Repository, source: &str, target: &str) -> Result<StepOutcome, Error> {
    checkout_branch_impl(repo, target)?;
    let tip = resolve_commit(repo, source)?.id();
    let head = repo.head()?.peel_to_commit()?.id();
    if tip == head || repo.graph_descendant_of(head, tip)? {
        return Ok(StepOutcome::Completed);
    }
    if !repo.graph_descendant_of(tip, head)? {
        return Err(Error::from_str(&format!(
            "cannot fast-forward {target} to {source}; the rebased branch does not contain it"
        )));
    }
    fast_forward_head(repo, tip)?;
    Ok(StepOutcome::Completed)
}

fn git_command(repo: &Repository) -> Command {
    let mut command = Command::new("git");
    if let Some(workdir) = repo.workdir() {
        command.current_dir(workdir);
    }
    command.env("GIT_EDITOR", "true");
    command
}

fn rebase_with_git(
    repo: &Repository,
    onto: &str,
    settings: &RebaseSettings,
) -> Result<StepOutcome, Error> {
    let marker = cli_marker(repo);
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| Error::from_str(&format!("failed to record rebase: {err}")))?;
    }
    fs::write(&marker, onto)
        .map_err(|err| Error::from_str(&format!("failed to record rebase: {err}")))?;

    let mut command = git_command(repo);
    command.arg("rebase");
    if settings.preserve_merges {
        command.arg("--rebase-merges");
    }
    if settings.interactive {
        command.arg("--interactive").env_remove("GIT_EDITOR");
    }
    if settings.no_verify {
        command.arg("--no-verify");
    }
    command.arg(onto);
    if !settings.interactive {
        command.stdout(Stdio::null());
    }

    let status = command
        .status()
        .map_err(|err| Error::from_str(&format!("failed to run git rebase: {err}")))?;
    finish_git_rebase(repo, status.success(), "git rebase")
}

fn continue_with_git(repo: &Repository) -> Result<StepOutcome, Error> {
    let fresh = Repository::open(repo.path())?;
    if !rebase_in_progress(&fresh) {
        let _ = fs::remove_file(cli_marker(repo));
        return Ok(StepOutcome::Completed);
    }

    let mut index = fresh.index()?;
    if index.has_conflicts() {
        return Ok(StepOutcome::Conflicted {
            files: collect_conflict_paths(&mut index),
        });
    }

    let status = git_command(repo)
        .args(["rebase", "--continue"])
        .stdout(Stdio::null())
        .status()
        .map_err(|err| Error::from_str(&format!("failed to run git rebase --continue: {err}")))?;
    finish_git_rebase(repo, status.success(), "git rebase --continue")
}

fn finish_git_rebase(repo: &Repository, succeeded: bool, what: &str) -> Result<StepOutcome, Error> {
    let fresh = Repository::open(repo.path())?;
    if rebase_in_progress(&fresh) {
        let mut index = fresh.index()?;
        return Ok(StepOutcome::Conflicted {
            files: collect_conflict_paths(&mut index),
        });
    }

    let _ = fs::remove_file(cli_marker(repo));
    if succeeded {
        Ok(StepOutcome::Completed)
    } else {
        Err(Error::from_str(&format!("{what} failed")))
    }
}

/// Abort whatever merge, squash or rebase is in progress and reset to HEAD.
pub fn abort_in_progress_in<P: AsRef<Path>>(repo_path: P) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;

    if cli_marker(&repo).exists() {
        let _ = fs::remove_file(cli_marker(&repo));
        if rebase_in_progress(&repo) {
            let status = git_command(&repo)
                .args(["rebase", "--abort"])
                .status()
                .map_err(|err| {
                    Error::from_str(&format!("failed to run git rebase --abort: {err}"))
                })?;
            if !status.success() {
                return Err(Error::from_str("git rebase --abort failed"));
            }
        }
        return Ok(());
    }

    if rebase_in_progress(&repo) {
        match repo.open_rebase(None) {
            Ok(mut rebase) => return rebase.abort(),
            Err(err) if err.code() == ErrorCode::NotFound => {}
            Err(err) => return Err(err),
        }
    }

    if repo.state() != RepositoryState::Clean || squash_pending(&repo) {
        abort_merge_impl(&repo)?;
    }
    Ok(())
}
