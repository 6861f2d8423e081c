use git2::build::CheckoutBuilder;
use git2::{
    AnnotatedCommit, Commit, Error, Index, MergeOptions as GitMergeOptions, Oid, Repository,
    RepositoryState, ResetType,
};
use std::fs;
use std::path::{Path, PathBuf};

use super::branches::{is_merged_impl, resolve_commit};
use super::verify::{verify_commit, verify_merge_commit};

/// Result of a merge-like step; fatal problems are reported as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Conflicted { files: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct CommitSettings {
    pub message: Option<String>,
    pub fast_forward: bool,
    pub no_verify: bool,
}

pub(crate) fn ensure_branch_head(repo: &Repository) -> Result<String, Error> {
    let head_ref = repo.head()?;
    if !head_ref.is_branch() {
        return Err(Error::from_str(
            "cannot merge into detached HEAD; checkout a branch first",
        ));
    }
    head_ref
        .shorthand()
        .map(|name| name.to_string())
        .ok_or_else(|| Error::from_str("current branch name is not valid UTF-8"))
}

fn ensure_clean_state(repo: &Repository) -> Result<(), Error> {
    if repo.state() != RepositoryState::Clean || squash_pending(repo) {
        return Err(Error::from_str(
            "cannot start a merge while another git operation is in progress",
        ));
    }
    Ok(())
}

fn annotated_for<'repo>(
    repo: &'repo Repository,
    spec: &str,
) -> Result<AnnotatedCommit<'repo>, Error> {
    let commit = resolve_commit(repo, spec)?;
    repo.find_annotated_commit(commit.id())
}

pub(crate) fn signature(repo: &Repository) -> Result<git2::Signature<'static>, Error> {
    repo.signature()
        .or_else(|_| git2::Signature::now("git-flow", "git-flow@localhost"))
}

fn force_checkout_head(repo: &Repository) -> Result<(), Error> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
}

fn default_merge_message(source: &str, target: &str) -> String {
    format!("Merge branch '{source}' into {target}")
}

/// Merge `source` into the checked-out branch.
///
/// Sources already contained in HEAD are a no-op; a fast-forward is taken only when
/// `settings.fast_forward` allows it. Conflicts are written to the work tree and index and
/// leave the repository in the merging state.
pub fn merge_into_head_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    merge_into_head_impl(&repo, source, settings)
}

fn merge_into_head_impl(
    repo: &Repository,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    ensure_clean_state(repo)?;
    let target = ensure_branch_head(repo)?;
    let annotated = annotated_for(repo, source)?;

    let (analysis, _) = repo.merge_analysis(&[&annotated])?;
    if analysis.is_up_to_date() {
        return Ok(StepOutcome::Completed);
    }
    if settings.fast_forward && analysis.is_fast_forward() {
        fast_forward_head(repo, annotated.id())?;
        return Ok(StepOutcome::Completed);
    }

    let head_commit = repo.head()?.peel_to_commit()?;
    let source_commit = repo.find_commit(annotated.id())?;
    let mut index = repo.merge_commits(&head_commit, &source_commit, None)?;
    if index.has_conflicts() {
        let files = collect_conflict_paths(&mut index);
        materialize_conflicts(repo, &annotated)?;
        return Ok(StepOutcome::Conflicted { files });
    }

    let message = settings
        .message
        .clone()
        .unwrap_or_else(|| default_merge_message(source, &target));
    let message = verify_merge_commit(repo, &message, settings.no_verify)?;
    let tree = repo.find_tree(index.write_tree_to(repo)?)?;
    let sig = signature(repo)?;
    repo.commit(
        Some("HEAD"),
        &sig,
        &sig,
        &message,
        &tree,
        &[&head_commit, &source_commit],
    )?;
    force_checkout_head(repo)?;

    Ok(StepOutcome::Completed)
}

pub(crate) fn fast_forward_head(repo: &Repository, target: Oid) -> Result<(), Error> {
    let mut head_ref = repo.head()?;
    let commit = repo.find_commit(target)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    head_ref.set_target(target, "fast-forward")?;
    Ok(())
}

/// Finish a merge that stopped on conflicts. When the user already committed it, or no merge
/// is pending at all, the merge is re-run and completes as a no-op if nothing is left.
pub fn continue_merge_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    let mut repo = Repository::open(repo_path)?;
    if repo.state() != RepositoryState::Merge {
        if is_merged_impl(&repo, source, "HEAD")? {
            return Ok(StepOutcome::Completed);
        }
        return merge_into_head_impl(&repo, source, settings);
    }

    let mut index = repo.index()?;
    if index.has_conflicts() {
        return Ok(StepOutcome::Conflicted {
            files: collect_conflict_paths(&mut index),
        });
    }

    let mut merge_heads = Vec::new();
    repo.mergehead_foreach(|oid| {
        merge_heads.push(*oid);
        true
    })?;
    let target = ensure_branch_head(&repo)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let mut parents: Vec<Commit<'_>> = vec![head_commit];
    for oid in merge_heads {
        parents.push(repo.find_commit(oid)?);
    }

    let message = match settings.message.clone() {
        Some(message) => message,
        None => repo
            .message()
            .map(|message| strip_comment_lines(&message))
            .ok()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| default_merge_message(source, &target)),
    };
    let message = verify_merge_commit(&repo, &message, settings.no_verify)?;

    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature(&repo)?;
    let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parent_refs)?;

    repo.cleanup_state()?;
    force_checkout_head(&repo)?;
    Ok(StepOutcome::Completed)
}

/// Apply the cumulative change of `source` to the checked-out branch as one commit.
pub fn squash_into_head_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    squash_into_head_impl(&repo, source, settings)
}

fn squash_into_head_impl(
    repo: &Repository,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    ensure_clean_state(repo)?;
    ensure_branch_head(repo)?;
    if is_merged_impl(repo, source, "HEAD")? {
        return Ok(StepOutcome::Completed);
    }

    let annotated = annotated_for(repo, source)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let source_commit = repo.find_commit(annotated.id())?;
    let mut index = repo.merge_commits(&head_commit, &source_commit, None)?;
    if index.has_conflicts() {
        let files = collect_conflict_paths(&mut index);
        materialize_conflicts(repo, &annotated)?;
        // Like `git merge --squash`: conflicted index, no MERGE_HEAD.
        repo.cleanup_state()?;
        record_pending_squash(repo, head_commit.id(), &squash_message(settings, source))?;
        return Ok(StepOutcome::Conflicted { files });
    }

    let tree_oid = index.write_tree_to(repo)?;
    if tree_oid == head_commit.tree_id() {
        return Ok(StepOutcome::Completed);
    }

    let message = squash_message(settings, source);
    let message = verify_commit(repo, &message, settings.no_verify)?;
    let tree = repo.find_tree(tree_oid)?;
    let sig = signature(repo)?;
    repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&head_commit])?;
    force_checkout_head(repo)?;

    Ok(StepOutcome::Completed)
}

fn squash_message(settings: &CommitSettings, source: &str) -> String {
    settings
        .message
        .clone()
        .unwrap_or_else(|| format!("Squashed commit of branch {source}"))
}

/// Records the commit a conflicted squash will be committed onto.
fn squash_marker(repo: &Repository) -> PathBuf {
    repo.path().join("gitflow").join("squash-onto")
}

fn squash_msg_path(repo: &Repository) -> PathBuf {
    repo.path().join("SQUASH_MSG")
}

pub(crate) fn squash_pending(repo: &Repository) -> bool {
    squash_marker(repo).exists()
}

fn record_pending_squash(repo: &Repository, onto: Oid, message: &str) -> Result<(), Error> {
    let marker = squash_marker(repo);
    let recorded = marker
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&marker, onto.to_string()))
        .and_then(|()| fs::write(squash_msg_path(repo), format!("{message}\n")));
    recorded.map_err(|err| Error::from_str(&format!("failed to record squash: {err}")))
}

fn pending_squash_onto(repo: &Repository) -> Result<Option<Oid>, Error> {
    match fs::read_to_string(squash_marker(repo)) {
        Ok(raw) => Oid::from_str(raw.trim()).map(Some),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::from_str(&format!("failed to read squash record: {err}"))),
    }
}

fn clear_pending_squash(repo: &Repository) {
    let _ = fs::remove_file(squash_marker(repo));
    let _ = fs::remove_file(squash_msg_path(repo));
}

fn merge_commit_error(head: &Commit<'_>, source: &str) -> Error {
    Error::from_str(&format!(
        "HEAD ({}) is a merge commit of `{source}`; a squash must be committed with a single parent",
        &head.id().to_string()[..7]
    ))
}

/// Commit a resolved squash with HEAD as its only parent. A squash the user already committed
/// is accepted unless that commit is a merge.
pub fn continue_squash_in<P: AsRef<Path>>(
    repo_path: P,
    source: &str,
    settings: &CommitSettings,
) -> Result<StepOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    let Some(onto) = pending_squash_onto(&repo)? else {
        if repo.state() == RepositoryState::Merge {
            return Err(Error::from_str(
                "a merge is in progress instead of a squash; abort it and finish again",
            ));
        }
        let head_commit = repo.head()?.peel_to_commit()?;
        let source_oid = resolve_commit(&repo, source)?.id();
        if head_commit.parent_ids().skip(1).any(|parent| parent == source_oid) {
            return Err(merge_commit_error(&head_commit, source));
        }
        return squash_into_head_impl(&repo, source, settings);
    };

    let mut index = repo.index()?;
    if index.has_conflicts() {
        return Ok(StepOutcome::Conflicted {
            files: collect_conflict_paths(&mut index),
        });
    }

    ensure_branch_head(&repo)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    if head_commit.id() != onto {
        if head_commit.parent_count() > 1 {
            return Err(merge_commit_error(&head_commit, source));
        }
        clear_pending_squash(&repo);
        return Ok(StepOutcome::Completed);
    }

    index.write()?;
    let tree_oid = index.write_tree()?;
    if tree_oid != head_commit.tree_id() {
        let message = squash_message(settings, source);
        let message = verify_commit(&repo, &message, settings.no_verify)?;
        let tree = repo.find_tree(tree_oid)?;
        let sig = signature(&repo)?;
        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&head_commit])?;
    }

    clear_pending_squash(&repo);
    force_checkout_head(&repo)?;
    Ok(StepOutcome::Completed)
}

/// Drop an in-progress merge or squash and reset the work tree to HEAD.
pub(crate) fn abort_merge_impl(repo: &Repository) -> Result<(), Error> {
    let head = repo.head()?.peel_to_commit()?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.reset(head.as_object(), ResetType::Hard, Some(&mut checkout))?;
    clear_pending_squash(repo);
    repo.cleanup_state()
}

pub(crate) fn collect_conflict_paths(index: &mut Index) -> Vec<String> {
    let mut files = Vec::new();
    if let Ok(mut conflicts) = index.conflicts() {
        for conflict in conflicts.by_ref().flatten() {
            let path_bytes = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref())
                .map(|entry| entry.path.clone());
            if let Some(bytes) = path_bytes {
                files.push(String::from_utf8_lossy(&bytes).to_string());
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

fn materialize_conflicts(repo: &Repository, source: &AnnotatedCommit<'_>) -> Result<(), Error> {
    let mut checkout = CheckoutBuilder::new();
    checkout
        .allow_conflicts(true)
        .conflict_style_merge(true)
        .force();

    let mut merge_opts = GitMergeOptions::new();
    merge_opts.fail_on_conflict(false);

    repo.merge(&[source], Some(&mut merge_opts), Some(&mut checkout))
}

fn strip_comment_lines(message: &str) -> String {
    message
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
