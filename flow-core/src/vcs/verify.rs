//! Git's own commit hooks, run around commits this crate creates.

use git2::{Error, Repository};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub(crate) fn hooks_dir(repo: &Repository) -> PathBuf {
    let configured = repo
        .config()
        .ok()
        .and_then(|cfg| cfg.get_path("core.hooksPath").ok());
    match configured {
        Some(path) if path.is_absolute() => path,
        Some(path) => repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .join(path),
        None => repo.path().join("hooks"),
    }
}

/// Directory git runs hooks from: `core.hooksPath`, else `.git/hooks`.
pub fn hooks_dir_in<P: AsRef<Path>>(repo_path: P) -> Result<PathBuf, Error> {
    let repo = Repository::open(repo_path)?;
    Ok(hooks_dir(&repo))
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn run_hook(repo: &Repository, name: &str, args: &[&str]) -> Result<(), Error> {
    let hook = hooks_dir(repo).join(name);
    if !is_executable(&hook) {
        return Ok(());
    }

    let cwd = repo.workdir().unwrap_or_else(|| repo.path());
    let output = Command::new(&hook)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|err| Error::from_str(&format!("failed to run {name} hook: {err}")))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let mut message = format!(
        "{name} hook exited with {}",
        output.status.code().unwrap_or(-1)
    );
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(&stderr);
    }
    Err(Error::from_str(&message))
}

/// Run `commit-msg` against `message`, returning the possibly edited message.
fn run_commit_msg(repo: &Repository, message: &str) -> Result<String, Error> {
    let hook = hooks_dir(repo).join("commit-msg");
    if !is_executable(&hook) {
        return Ok(message.to_string());
    }

    let path = repo.path().join("COMMIT_EDITMSG");
    fs::write(&path, message)
        .map_err(|err| Error::from_str(&format!("failed to write COMMIT_EDITMSG: {err}")))?;
    let path_arg = path.to_string_lossy().to_string();
    run_hook(repo, "commit-msg", &[path_arg.as_str()])?;
    fs::read_to_string(&path)
        .map_err(|err| Error::from_str(&format!("failed to read COMMIT_EDITMSG: {err}")))
}

/// Hooks for a merge commit: `pre-merge-commit`, then `commit-msg`.
pub(crate) fn verify_merge_commit(
    repo: &Repository,
    message: &str,
    no_verify: bool,
) -> Result<String, Error> {
    if no_verify {
        return Ok(message.to_string());
    }
    run_hook(repo, "pre-merge-commit", &[])?;
    run_commit_msg(repo, message)
}

/// Hooks for an ordinary commit: `pre-commit`, then `commit-msg`.
pub(crate) fn verify_commit(
    repo: &Repository,
    message: &str,
    no_verify: bool,
) -> Result<String, Error> {
    if no_verify {
        return Ok(message.to_string());
    }
    run_hook(repo, "pre-commit", &[])?;
    run_commit_msg(repo, message)
}

pub(crate) fn verify_rebase(
    repo: &Repository,
    upstream: &str,
    branch: &str,
    no_verify: bool,
) -> Result<(), Error> {
    if no_verify {
        return Ok(());
    }
    run_hook(repo, "pre-rebase", &[upstream, branch])
}
