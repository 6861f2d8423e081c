#![allow(dead_code, unused_imports)]

pub(crate) use git2::{BranchType, Oid, Repository};
pub(crate) use serde_json::{Value, json};
pub(crate) use std::env;
pub(crate) use std::fs;
pub(crate) use std::io;
#[cfg(unix)]
pub(crate) use std::os::unix::fs::PermissionsExt;
pub(crate) use std::path::{Path, PathBuf};
pub(crate) use std::process::{Command, Output};
pub(crate) use std::sync::{Mutex, OnceLock};
pub(crate) use tempfile::TempDir;

pub(crate) type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const REPO_ROOT_PREFIX: &str = "git-flow-tests-repo-";
const TARGET_DIR_ENV: &str = "GIT_FLOW_TEST_TARGET_DIR";
const FIXTURE_TARGET: &str = "fixture-build";

pub(crate) const EXIT_CONFIGURATION: i32 = 2;
pub(crate) const EXIT_BRANCH_NOT_FOUND: i32 = 3;
pub(crate) const EXIT_BRANCH_EXISTS: i32 = 4;
pub(crate) const EXIT_REMOTE_STATE: i32 = 5;
pub(crate) const EXIT_CONFLICT: i32 = 6;
pub(crate) const EXIT_HOOK_REJECTED: i32 = 7;
pub(crate) const EXIT_FILTER_FAILED: i32 = 8;
pub(crate) const EXIT_IN_PROGRESS: i32 = 9;
pub(crate) const EXIT_INVALID_INPUT: i32 = 10;

static BUILD_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn build_lock() -> &'static Mutex<()> {
    BUILD_LOCK.get_or_init(|| Mutex::new(()))
}

pub(crate) fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests crate lives under repo root")
        .to_path_buf()
}

/// Separate target dir so the nested build never waits on the outer `cargo test` lock.
fn fixture_target_dir(repo_root: &Path, override_dir: Option<&std::ffi::OsStr>) -> PathBuf {
    override_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| repo_root.join("target").join(FIXTURE_TARGET))
}

pub(crate) fn flow_binary() -> &'static PathBuf {
    static BIN: OnceLock<PathBuf> = OnceLock::new();
    BIN.get_or_init(build_flow_binary)
}

fn build_flow_binary() -> PathBuf {
    let _guard = build_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let root = repo_root();
    let target_dir = fixture_target_dir(&root, env::var_os(TARGET_DIR_ENV).as_deref());
    let status = Command::new("cargo")
        .current_dir(&root)
        .args(["build", "--release", "-p", "flow-cli", "--bin", "git-flow"])
        .env("CARGO_TARGET_DIR", &target_dir)
        .status()
        .expect("failed to invoke cargo build for git-flow");
    if !status.success() {
        panic!("cargo build for git-flow failed with status {status:?}");
    }
    let compiled_path = target_dir
        .join("release")
        .join(format!("git-flow{}", env::consts::EXE_SUFFIX));
    if !compiled_path.exists() {
        panic!("expected git-flow binary at {}", compiled_path.display());
    }
    compiled_path
}

/// Temporary repository with `main` holding one commit, plus an optional bare remote.
pub(crate) struct IntegrationRepo {
    dir: TempDir,
    repo_path: PathBuf,
    flow_bin: PathBuf,
}

impl IntegrationRepo {
    pub(crate) fn new() -> TestResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(REPO_ROOT_PREFIX)
            .tempdir()?;
        let repo_path = dir.path().join("repo");
        fs::create_dir_all(&repo_path)?;
        let repo = Self {
            dir,
            repo_path,
            flow_bin: flow_binary().clone(),
        };
        repo.git(&["init", "--quiet", "--initial-branch=main"])?;
        repo.git(&["config", "user.name", "Flow Tester"])?;
        repo.git(&["config", "user.email", "flow@test.invalid"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.git(&["config", "tag.gpgsign", "false"])?;
        repo.commit_file("README.md", "fixture\n", "init")?;
        Ok(repo)
    }

    /// New repository already initialized with the classic preset.
    pub(crate) fn classic() -> TestResult<Self> {
        let repo = Self::new()?;
        repo.flow_ok(&["init"])?;
        Ok(repo)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.repo_path
    }

    pub(crate) fn repo(&self) -> Repository {
        Repository::open(self.path()).expect("open repo")
    }

    /// Create a bare `origin` next to the repository and push `branches` to it.
    pub(crate) fn add_remote(&self, branches: &[&str]) -> TestResult<PathBuf> {
        let remote_path = self.dir.path().join("origin.git");
        let status = Command::new("git")
            .args(["init", "--quiet", "--bare"])
            .arg(&remote_path)
            .status()?;
        if !status.success() {
            return Err(format!("git init --bare failed with status {status:?}").into());
        }
        let url = remote_path.to_string_lossy().to_string();
        self.git(&["remote", "add", "origin", &url])?;
        for branch in branches {
            self.git(&["push", "--quiet", "-u", "origin", branch])?;
        }
        Ok(remote_path)
    }

    pub(crate) fn flow_cmd(&self) -> Command {
        let mut cmd = Command::new(&self.flow_bin);
        cmd.current_dir(self.path());
        cmd.env("GIT_EDITOR", "true");
        cmd.env("GIT_MERGE_AUTOEDIT", "no");
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env("HOME", self.dir.path());
        cmd.env("XDG_CONFIG_HOME", self.dir.path().join(".config"));
        cmd
    }

    pub(crate) fn flow(&self, args: &[&str]) -> io::Result<Output> {
        let mut cmd = self.flow_cmd();
        cmd.args(args);
        cmd.output()
    }

    /// Run git-flow and fail the test unless it succeeds.
    pub(crate) fn flow_ok(&self, args: &[&str]) -> TestResult<Output> {
        let output = self.flow(args)?;
        if !output.status.success() {
            return Err(format!(
                "git-flow {args:?} failed with {:?}\nstdout:\n{}\nstderr:\n{}",
                output.status.code(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }
        Ok(output)
    }

    /// Run git-flow and require a specific exit code.
    pub(crate) fn flow_code(&self, args: &[&str], code: i32) -> TestResult<Output> {
        let output = self.flow(args)?;
        if output.status.code() != Some(code) {
            return Err(format!(
                "git-flow {args:?} exited with {:?}, expected {code}\nstdout:\n{}\nstderr:\n{}",
                output.status.code(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }
        Ok(output)
    }

    pub(crate) fn git(&self, args: &[&str]) -> TestResult {
        let status = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .env("GIT_MERGE_AUTOEDIT", "no")
            .env("GIT_EDITOR", "true")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("HOME", self.dir.path())
            .args(args)
            .status()?;
        if !status.success() {
            return Err(format!("git {:?} failed with status {status:?}", args).into());
        }
        Ok(())
    }

    pub(crate) fn git_stdout(&self, args: &[&str]) -> TestResult<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("HOME", self.dir.path())
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(format!(
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) -> io::Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    pub(crate) fn read(&self, rel: &str) -> io::Result<String> {
        fs::read_to_string(self.path().join(rel))
    }

    /// Write, stage and commit one file on the checked-out branch.
    pub(crate) fn commit_file(&self, rel: &str, contents: &str, message: &str) -> TestResult {
        self.write(rel, contents)?;
        self.git(&["add", rel])?;
        self.git(&["commit", "--quiet", "-m", message])
    }

    /// Check out `branch` and commit one file on it.
    pub(crate) fn commit_on(
        &self,
        branch: &str,
        rel: &str,
        contents: &str,
        message: &str,
    ) -> TestResult {
        self.git(&["checkout", "--quiet", branch])?;
        self.commit_file(rel, contents, message)
    }

    pub(crate) fn current_branch(&self) -> TestResult<String> {
        self.git_stdout(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub(crate) fn branch_exists(&self, name: &str) -> bool {
        self.repo().find_branch(name, BranchType::Local).is_ok()
    }

    pub(crate) fn tip(&self, rev: &str) -> TestResult<String> {
        self.git_stdout(&["rev-parse", rev])
    }

    pub(crate) fn parent_count(&self, rev: &str) -> TestResult<usize> {
        let repo = self.repo();
        let commit = repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.parent_count())
    }

    pub(crate) fn commit_message(&self, rev: &str) -> TestResult<String> {
        self.git_stdout(&["log", "-1", "--format=%B", rev])
    }

    /// Whether `commit` is reachable from `branch`.
    pub(crate) fn contains(&self, branch: &str, commit: &str) -> TestResult<bool> {
        let status = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(["merge-base", "--is-ancestor", commit, branch])
            .status()?;
        Ok(status.success())
    }

    pub(crate) fn file_on(&self, branch: &str, rel: &str) -> TestResult<String> {
        self.git_stdout(&["show", &format!("{branch}:{rel}")])
    }

    pub(crate) fn tag_exists(&self, tag: &str) -> bool {
        self.repo()
            .revparse_single(&format!("refs/tags/{tag}"))
            .is_ok()
    }

    pub(crate) fn config_value(&self, key: &str) -> Option<String> {
        self.git_stdout(&["config", "--local", "--get", key]).ok()
    }

    pub(crate) fn state_path(&self) -> PathBuf {
        self.path().join(".git/gitflow/state/merge.json")
    }

    pub(crate) fn read_state(&self) -> TestResult<Value> {
        let raw = fs::read_to_string(self.state_path())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Install an executable hook script under `.git/hooks`.
    #[cfg(unix)]
    pub(crate) fn write_hook(&self, name: &str, body: &str) -> TestResult {
        let path = self.path().join(".git/hooks").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms)?;
        Ok(())
    }
}

pub(crate) fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_target_dir_prefers_override() {
        let root = Path::new("/work/repo");
        assert_eq!(
            fixture_target_dir(root, None),
            PathBuf::from("/work/repo/target/fixture-build")
        );
        assert_eq!(
            fixture_target_dir(root, Some(std::ffi::OsStr::new("/tmp/other"))),
            PathBuf::from("/tmp/other")
        );
    }
}
