//! [`RepoPort`] over libgit2.

use std::path::{Path, PathBuf};

use flow_kernel::ports::{MergeDirection, MergeOutcome, MergeRequest, RepoPort, TagRequest};
use flow_kernel::sync::AheadBehind;
use flow_kernel::topology::MergeStrategy;

use crate::error::CoreError;
use crate::vcs::{self, CommitSettings, ConfigScope, RebaseSettings, StepOutcome, TagSettings};

/// Repository handle rooted at a working directory. Every call reopens the repository so
/// subprocesses (hooks, `git rebase`) never race a cached index.
#[derive(Debug, Clone)]
pub struct GitBackend {
    root: PathBuf,
}

pub(crate) fn stored_base_key(branch: &str) -> String {
    format!("gitflow.branch.{branch}.base")
}

impl GitBackend {
    /// Discover the repository containing `start`.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self, CoreError> {
        let root = vcs::repo_root(start)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> Result<PathBuf, CoreError> {
        Ok(vcs::git_dir_in(&self.root)?)
    }

    fn commit_settings(request: &MergeRequest) -> CommitSettings {
        CommitSettings {
            message: request.message.clone(),
            fast_forward: request.fast_forward,
            no_verify: request.no_verify,
        }
    }

    fn rebase_settings(request: &MergeRequest) -> RebaseSettings {
        RebaseSettings {
            no_verify: request.no_verify,
            preserve_merges: request.preserve_merges,
            interactive: request.interactive,
        }
    }

    fn run_step(
        &self,
        request: &MergeRequest,
        resume: bool,
    ) -> Result<StepOutcome, CoreError> {
        let root = &self.root;
        let source = request.source.as_str();
        let target = request.target.as_str();
        let outcome = match (request.strategy, request.direction) {
            (MergeStrategy::None, _) => StepOutcome::Completed,
            (MergeStrategy::Merge, _) => {
                let settings = Self::commit_settings(request);
                if resume {
                    vcs::continue_merge_in(root, source, &settings)?
                } else {
                    vcs::checkout_branch_in(root, target)?;
                    vcs::merge_into_head_in(root, source, &settings)?
                }
            }
            (MergeStrategy::Squash, _) => {
                let settings = Self::commit_settings(request);
                if resume {
                    vcs::continue_squash_in(root, source, &settings)?
                } else {
                    vcs::checkout_branch_in(root, target)?;
                    vcs::squash_into_head_in(root, source, &settings)?
                }
            }
            (MergeStrategy::Rebase, MergeDirection::Downstream) => {
                if resume {
                    vcs::continue_rebase_in(root)?
                } else {
                    vcs::rebase_branch_in(root, target, source, &Self::rebase_settings(request))?
                }
            }
            (MergeStrategy::Rebase, MergeDirection::Upstream) => {
                if resume {
                    vcs::continue_rebase_and_advance_in(root, source, target)?
                } else {
                    vcs::rebase_and_advance_in(
                        root,
                        source,
                        target,
                        &Self::rebase_settings(request),
                    )?
                }
            }
        };
        Ok(outcome)
    }
}

fn into_outcome(step: StepOutcome) -> MergeOutcome {
    match step {
        StepOutcome::Completed => MergeOutcome::Success,
        StepOutcome::Conflicted { files } => MergeOutcome::Conflict { files },
    }
}

impl RepoPort for GitBackend {
    type Error = CoreError;

    fn current_branch(&self) -> Result<Option<String>, CoreError> {
        Ok(vcs::current_branch_name_in(&self.root)?)
    }

    fn branch_exists(&self, branch: &str) -> Result<bool, CoreError> {
        Ok(vcs::branch_exists_in(&self.root, branch)?)
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, CoreError> {
        Ok(vcs::remote_branch_exists_in(&self.root, remote, branch)?)
    }

    fn list_branches(&self) -> Result<Vec<String>, CoreError> {
        Ok(vcs::list_local_branches_in(&self.root)?)
    }

    fn is_clean(&self) -> Result<bool, CoreError> {
        Ok(vcs::is_clean_in(&self.root)?)
    }

    fn create_branch(&self, branch: &str, start_point: &str) -> Result<(), CoreError> {
        Ok(vcs::create_branch_from_in(&self.root, start_point, branch)?)
    }

    fn create_tracking_branch(&self, branch: &str, remote: &str) -> Result<(), CoreError> {
        Ok(vcs::create_tracking_branch_in(&self.root, remote, branch)?)
    }

    fn checkout(&self, branch: &str) -> Result<(), CoreError> {
        Ok(vcs::checkout_branch_in(&self.root, branch)?)
    }

    fn delete_branch(&self, branch: &str, force: bool) -> Result<(), CoreError> {
        Ok(vcs::delete_branch_in(&self.root, branch, force)?)
    }

    fn rename_branch(&self, from: &str, to: &str) -> Result<(), CoreError> {
        Ok(vcs::rename_branch_in(&self.root, from, to)?)
    }

    fn is_merged_into(&self, branch: &str, target: &str) -> Result<bool, CoreError> {
        Ok(vcs::is_merged_into_in(&self.root, branch, target)?)
    }

    fn tracking_counts(
        &self,
        branch: &str,
        remote: &str,
    ) -> Result<Option<AheadBehind>, CoreError> {
        let counts = vcs::ahead_behind_in(&self.root, branch, remote)?;
        Ok(counts.map(|counts| AheadBehind {
            ahead: counts.ahead,
            behind: counts.behind,
            tracking: counts.tracking,
        }))
    }

    fn fetch(&self, remote: &str, branches: &[String]) -> Result<(), CoreError> {
        Ok(vcs::fetch_in(&self.root, remote, branches)?)
    }

    fn push(
        &self,
        remote: &str,
        refspecs: &[String],
        push_options: &[String],
    ) -> Result<(), CoreError> {
        Ok(vcs::push_refspecs_in(&self.root, remote, refspecs, push_options)?)
    }

    fn set_upstream(&self, branch: &str, remote: &str) -> Result<(), CoreError> {
        Ok(vcs::set_upstream_in(&self.root, branch, remote)?)
    }

    fn delete_remote_branch(
        &self,
        remote: &str,
        branch: &str,
        push_options: &[String],
    ) -> Result<(), CoreError> {
        Ok(vcs::delete_remote_branch_in(&self.root, remote, branch, push_options)?)
    }

    fn apply_strategy(&self, request: &MergeRequest) -> Result<MergeOutcome, CoreError> {
        self.run_step(request, false).map(into_outcome)
    }

    fn continue_strategy(&self, request: &MergeRequest) -> Result<MergeOutcome, CoreError> {
        self.run_step(request, true).map(into_outcome)
    }

    fn abort_in_progress(&self) -> Result<(), CoreError> {
        Ok(vcs::abort_in_progress_in(&self.root)?)
    }

    fn tag_exists(&self, tag: &str) -> Result<bool, CoreError> {
        Ok(vcs::tag_exists_in(&self.root, tag)?)
    }

    fn create_tag(&self, request: &TagRequest) -> Result<(), CoreError> {
        let settings = TagSettings {
            sign: request.sign,
            signing_key: request.signing_key.clone(),
        };
        Ok(vcs::create_annotated_tag_in(
            &self.root,
            &request.name,
            &request.target,
            &request.message,
            &settings,
        )?)
    }

    fn stored_base(&self, branch: &str) -> Result<Option<String>, CoreError> {
        let value = vcs::get_config_in(&self.root, &ConfigScope::Local, &stored_base_key(branch))?;
        Ok(value.filter(|base| !base.trim().is_empty()))
    }

    fn set_stored_base(&self, branch: &str, base: &str) -> Result<(), CoreError> {
        Ok(vcs::set_config_in(
            &self.root,
            &ConfigScope::Local,
            &stored_base_key(branch),
            base,
        )?)
    }

    fn clear_stored_base(&self, branch: &str) -> Result<(), CoreError> {
        Ok(vcs::unset_config_in(
            &self.root,
            &ConfigScope::Local,
            &stored_base_key(branch),
        )?)
    }

    fn diff_against(&self, base: &str, branch: &str) -> Result<String, CoreError> {
        Ok(vcs::diff_against_merge_base_in(&self.root, base, branch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, RepositoryInitOptions, Signature};
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitBackend) {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Flow Tester").unwrap();
            config.set_str("user.email", "flow@example.com").unwrap();
        }
        commit_file(&repo, dir.path(), "a.txt", "base\n", "base");
        let backend = GitBackend::discover(dir.path()).unwrap();
        (dir, backend)
    }

    fn commit_file(repo: &Repository, root: &Path, name: &str, contents: &str, message: &str) {
        fs::write(root.join(name), contents).unwrap();
        let mut index = repo.index().unwrap();
        index.read(true).unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Flow Tester", "flow@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    #[test]
    fn stored_base_round_trips_through_local_config() {
        let (_dir, backend) = init_repo();
        assert_eq!(backend.stored_base("feature/login").unwrap(), None);

        backend.set_stored_base("feature/login", "develop").unwrap();
        assert_eq!(
            backend.stored_base("feature/login").unwrap().as_deref(),
            Some("develop")
        );

        backend.clear_stored_base("feature/login").unwrap();
        backend.clear_stored_base("feature/login").unwrap();
        assert_eq!(backend.stored_base("feature/login").unwrap(), None);
    }

    #[test]
    fn upstream_merge_leaves_target_checked_out() {
        let (dir, backend) = init_repo();
        backend.create_branch("feature/x", "main").unwrap();
        backend.checkout("feature/x").unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        commit_file(&repo, dir.path(), "b.txt", "feature\n", "feature work");

        let request = MergeRequest::new(
            MergeStrategy::Merge,
            "feature/x",
            "main",
            MergeDirection::Upstream,
        );
        assert_eq!(backend.apply_strategy(&request).unwrap(), MergeOutcome::Success);
        assert_eq!(backend.current_branch().unwrap().as_deref(), Some("main"));
        assert!(backend.is_merged_into("feature/x", "main").unwrap());

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 2);
    }

    #[test]
    fn none_strategy_touches_nothing() {
        let (_dir, backend) = init_repo();
        backend.create_branch("develop", "main").unwrap();
        let request = MergeRequest::new(
            MergeStrategy::None,
            "main",
            "develop",
            MergeDirection::Downstream,
        );
        assert_eq!(backend.apply_strategy(&request).unwrap(), MergeOutcome::Success);
        assert_eq!(backend.current_branch().unwrap().as_deref(), Some("main"));
    }

    #[test]
    fn downstream_rebase_replays_child_onto_parent() {
        let (dir, backend) = init_repo();
        let repo = Repository::open(dir.path()).unwrap();
        backend.create_branch("develop", "main").unwrap();
        commit_file(&repo, dir.path(), "main.txt", "hotfix\n", "hotfix");
        backend.checkout("develop").unwrap();
        commit_file(&repo, dir.path(), "dev.txt", "dev\n", "dev work");

        let request = MergeRequest::new(
            MergeStrategy::Rebase,
            "main",
            "develop",
            MergeDirection::Downstream,
        );
        assert_eq!(backend.apply_strategy(&request).unwrap(), MergeOutcome::Success);
        assert!(backend.is_merged_into("main", "develop").unwrap());
        let tip = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(tip.parent_count(), 1);
        assert_eq!(tip.summary(), Some("dev work"));
    }
}
