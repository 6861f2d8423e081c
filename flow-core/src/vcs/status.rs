use git2::{DiffFormat, DiffOptions, Error, Repository, StatusOptions};
use std::path::{Path, PathBuf};

use super::branches::resolve_commit;

/// Working directory of the repository containing `start`.
pub fn repo_root<P: AsRef<Path>>(start: P) -> Result<PathBuf, Error> {
    let repo = Repository::discover(start)?;
    repo.workdir()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| Error::from_str("repository has no working directory"))
}

/// The `.git` directory (or the worktree's private git directory).
pub fn git_dir_in<P: AsRef<Path>>(repo_path: P) -> Result<PathBuf, Error> {
    let repo = Repository::open(repo_path)?;
    Ok(repo.path().to_path_buf())
}

/// Whether tracked files match HEAD in both index and work tree; untracked files are ignored.
pub fn is_clean_in<P: AsRef<Path>>(repo_path: P) -> Result<bool, Error> {
    let repo = Repository::open(repo_path)?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(false)
        .include_ignored(false)
        .exclude_submodules(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses.iter().all(|entry| entry.status().is_empty()))
}

/// Patch of `branch` against its merge base with `base`, like `git diff base...branch`.
pub fn diff_against_merge_base_in<P: AsRef<Path>>(
    repo_path: P,
    base: &str,
    branch: &str,
) -> Result<String, Error> {
    let repo = Repository::open(repo_path)?;
    let base_commit = resolve_commit(&repo, base)?;
    let branch_commit = resolve_commit(&repo, branch)?;
    let merge_base = repo.merge_base(base_commit.id(), branch_commit.id())?;

    let from = repo.find_commit(merge_base)?.tree()?;
    let to = branch_commit.tree()?;
    let mut opts = DiffOptions::new();
    opts.ignore_submodules(true).id_abbrev(40);
    let diff = repo.diff_tree_to_tree(Some(&from), Some(&to), Some(&mut opts))?;

    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_, _, line| {
        // Context, additions and removals carry their marker outside the content.
        if let origin @ ('+' | '-' | ' ') = line.origin() {
            patch.push(origin as u8);
        }
        patch.extend_from_slice(line.content());
        true
    })?;
    Ok(String::from_utf8_lossy(&patch).into_owned())
}
