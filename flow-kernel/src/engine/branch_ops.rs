use crate::error::{FlowError, FlowResult};
use crate::ports::{FilterKind, FilterOutcome, FilterPort, HookPort, RepoPort, StateStore};
use crate::topology::BranchTypeConfig;

use super::{DeleteOptions, Engine, PortResultExt, StartOptions};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartReport {
    pub branch: String,
    pub base: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListedBranch {
    pub full: String,
    pub short: String,
    pub stored_base: Option<String>,
    pub current: bool,
}

impl<'a, R, H, F, S> Engine<'a, R, H, F, S>
where
    R: RepoPort,
    H: HookPort,
    F: FilterPort,
    S: StateStore,
{
    /// Create a topic branch from its base and record that base.
    pub fn start(
        &self,
        branch_type: &str,
        name: &str,
        options: StartOptions,
    ) -> FlowResult<StartReport> {
        self.ensure_idle()?;
        let topic = self.topology.topic_type(branch_type)?.clone();

        let mut short = topic.short_name(name.trim()).to_string();
        if short.is_empty() {
            return Err(FlowError::InvalidInput(format!(
                "a {} branch needs a name",
                topic.name
            )));
        }
        if topic.creates_tag {
            short = self.filter_start_version(&topic, short)?;
        }

        let full = topic.full_name(&short);
        let exists = self
            .ports
            .repo
            .branch_exists(&full)
            .context(format!("look up branch {full}"))?;
        if exists {
            return Err(FlowError::BranchAlreadyExists(full));
        }

        let base = options
            .base
            .clone()
            .filter(|base| !base.trim().is_empty())
            .or_else(|| topic.starting_point.clone())
            .or_else(|| topic.parent.clone())
            .ok_or_else(|| {
                FlowError::Configuration(format!("topic type `{}` has no parent", topic.name))
            })?;
        self.require_branch(&base)?;

        if options.fetch {
            if let Err(err) = self
                .ports
                .repo
                .fetch(&self.remote, std::slice::from_ref(&base))
            {
                self.ports
                    .events
                    .warn(&format!("fetch from {} failed: {err}", self.remote));
            }
        }

        let mut hook = self.hook_context(&topic.name, "start", &full, &short, &base);
        if topic.creates_tag {
            hook.version = Some(short.clone());
        }
        self.run_pre_hook(&hook)?;

        let result = self.create_topic(&full, &base);
        self.post_hook_for(&hook, &result);
        result?;

        Ok(StartReport { branch: full, base })
    }

    fn create_topic(&self, full: &str, base: &str) -> FlowResult<()> {
        let repo = self.ports.repo;
        repo.create_branch(full, base)
            .context(format!("create {full} from {base}"))?;
        repo.set_stored_base(full, base)
            .context(format!("record base of {full}"))?;
        repo.checkout(full).context(format!("checkout {full}"))?;
        Ok(())
    }

    fn filter_start_version(
        &self,
        topic: &BranchTypeConfig,
        version: String,
    ) -> FlowResult<String> {
        let kind = FilterKind::StartVersion;
        let outcome = self
            .ports
            .filters
            .run_filter(kind, &topic.name, std::slice::from_ref(&version))
            .context(format!("run {}", kind.script_name(&topic.name)))?;
        match outcome {
            FilterOutcome::Missing => Ok(version),
            FilterOutcome::Output(output) if output.trim().is_empty() => Ok(version),
            FilterOutcome::Output(output) => Ok(output.trim().to_string()),
            FilterOutcome::Failed { exit_code, stderr } => Err(FlowError::FilterFailure {
                filter: kind.script_name(&topic.name),
                exit_code,
                stderr,
            }),
        }
    }

    /// Push a topic branch to the remote and track it.
    pub fn publish(
        &self,
        branch_type: &str,
        name: Option<&str>,
        push_options: &[String],
    ) -> FlowResult<String> {
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = self.resolve_topic_branch(&topic, name)?;
        self.require_branch(&full)?;

        let short = topic.short_name(&full).to_string();
        let base = topic.parent.clone().unwrap_or_default();
        let hook = self.hook_context(&topic.name, "publish", &full, &short, &base);
        self.run_pre_hook(&hook)?;

        let repo = self.ports.repo;
        let result = repo
            .push(
                &self.remote,
                &[format!("refs/heads/{full}:refs/heads/{full}")],
                push_options,
            )
            .context(format!("push {full} to {}", self.remote))
            .and_then(|_| {
                repo.set_upstream(&full, &self.remote)
                    .context(format!("track {}/{full}", self.remote))
            });
        self.post_hook_for(&hook, &result);
        result?;

        Ok(full)
    }

    /// Create a local topic branch that tracks an existing remote one.
    pub fn track(&self, branch_type: &str, name: &str) -> FlowResult<String> {
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = topic.full_name(name.trim());
        let exists = self
            .ports
            .repo
            .branch_exists(&full)
            .context(format!("look up branch {full}"))?;
        if exists {
            return Err(FlowError::BranchAlreadyExists(full));
        }

        let repo = self.ports.repo;
        repo.fetch(&self.remote, std::slice::from_ref(&full))
            .context(format!("fetch {full} from {}", self.remote))?;
        let remote_exists = repo
            .remote_branch_exists(&self.remote, &full)
            .context(format!("look up {}/{full}", self.remote))?;
        if !remote_exists {
            return Err(FlowError::BranchNotFound(format!("{}/{full}", self.remote)));
        }

        let short = topic.short_name(&full).to_string();
        let base = topic.parent.clone().unwrap_or_default();
        let hook = self.hook_context(&topic.name, "track", &full, &short, &base);
        self.run_pre_hook(&hook)?;

        let result = repo
            .create_tracking_branch(&full, &self.remote)
            .context(format!("create {full} tracking {}", self.remote))
            .and_then(|_| repo.checkout(&full).context(format!("checkout {full}")));
        self.post_hook_for(&hook, &result);
        result?;

        Ok(full)
    }

    /// Delete a topic branch locally, and on the remote when asked.
    pub fn delete(
        &self,
        branch_type: &str,
        name: Option<&str>,
        options: DeleteOptions,
    ) -> FlowResult<String> {
        self.ensure_idle()?;
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = self.resolve_topic_branch(&topic, name)?;
        self.require_branch(&full)?;
        let parent = self.topology.resolve_merge_target(&topic.name)?.to_string();

        let repo = self.ports.repo;
        if !options.force {
            let merged = repo
                .is_merged_into(&full, &parent)
                .context(format!("check whether {full} is merged into {parent}"))?;
            if !merged {
                return Err(FlowError::InvalidInput(format!(
                    "`{full}` is not fully merged into {parent}; pass --force to delete it"
                )));
            }
        }

        let short = topic.short_name(&full).to_string();
        let hook = self.hook_context(&topic.name, "delete", &full, &short, &parent);
        self.run_pre_hook(&hook)?;

        let result = self.delete_topic(&full, &parent, &options);
        self.post_hook_for(&hook, &result);
        result?;

        Ok(full)
    }

    fn delete_topic(&self, full: &str, parent: &str, options: &DeleteOptions) -> FlowResult<()> {
        let repo = self.ports.repo;
        let current = repo.current_branch().context("read current branch")?;
        if current.as_deref() == Some(full) {
            repo.checkout(parent).context(format!("checkout {parent}"))?;
        }
        repo.delete_branch(full, options.force)
            .context(format!("delete branch {full}"))?;
        repo.clear_stored_base(full)
            .context(format!("clear stored base of {full}"))?;

        if options.remote {
            let remote_exists = repo
                .remote_branch_exists(&self.remote, full)
                .context(format!("look up {}/{full}", self.remote))?;
            if remote_exists {
                repo.delete_remote_branch(&self.remote, full, &[])
                    .context(format!("delete {}/{full}", self.remote))?;
            }
        }
        Ok(())
    }

    /// Rename a topic branch, carrying its stored base along.
    pub fn rename(&self, branch_type: &str, from: &str, to: &str) -> FlowResult<String> {
        self.ensure_idle()?;
        let topic = self.topology.topic_type(branch_type)?.clone();
        let old = topic.full_name(from.trim());
        let new = topic.full_name(to.trim());
        if topic.short_name(&new).is_empty() {
            return Err(FlowError::InvalidInput("the new name cannot be empty".to_string()));
        }
        self.require_branch(&old)?;

        let repo = self.ports.repo;
        let taken = repo
            .branch_exists(&new)
            .context(format!("look up branch {new}"))?;
        if taken {
            return Err(FlowError::BranchAlreadyExists(new));
        }

        let short = topic.short_name(&old).to_string();
        let base = topic.parent.clone().unwrap_or_default();
        let hook = self.hook_context(&topic.name, "rename", &old, &short, &base);
        self.run_pre_hook(&hook)?;

        let result = self.move_topic(&old, &new);
        self.post_hook_for(&hook, &result);
        result?;

        Ok(new)
    }

    fn move_topic(&self, old: &str, new: &str) -> FlowResult<()> {
        let repo = self.ports.repo;
        let stored = repo
            .stored_base(old)
            .context(format!("read stored base of {old}"))?;
        repo.rename_branch(old, new)
            .context(format!("rename {old} to {new}"))?;
        if let Some(stored) = stored {
            repo.set_stored_base(new, &stored)
                .context(format!("record base of {new}"))?;
            repo.clear_stored_base(old)
                .context(format!("clear stored base of {old}"))?;
        }
        Ok(())
    }

    pub fn checkout(&self, branch_type: &str, name: &str) -> FlowResult<String> {
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = topic.full_name(name.trim());
        self.require_branch(&full)?;
        self.ports
            .repo
            .checkout(&full)
            .context(format!("checkout {full}"))?;
        Ok(full)
    }

    /// Changes a topic branch introduces relative to its configured parent.
    pub fn diff(&self, branch_type: &str, name: Option<&str>) -> FlowResult<String> {
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = self.resolve_topic_branch(&topic, name)?;
        self.require_branch(&full)?;
        let parent = self.topology.resolve_merge_target(&topic.name)?.to_string();
        self.ports
            .repo
            .diff_against(&parent, &full)
            .context(format!("diff {full} against {parent}"))
    }

    pub fn list(&self, branch_type: &str) -> FlowResult<Vec<ListedBranch>> {
        let topic = self.topology.topic_type(branch_type)?.clone();
        let repo = self.ports.repo;
        let current = repo.current_branch().context("read current branch")?;
        let branches = repo.list_branches().context("list branches")?;

        let mut listed = Vec::new();
        for full in branches {
            let owner = self.topology.topic_type_for_branch(&full);
            if owner.map(|entry| entry.name.as_str()) != Some(topic.name.as_str()) {
                continue;
            }
            let stored_base = repo
                .stored_base(&full)
                .context(format!("read stored base of {full}"))?;
            listed.push(ListedBranch {
                short: topic.short_name(&full).to_string(),
                current: current.as_deref() == Some(full.as_str()),
                stored_base,
                full,
            });
        }
        Ok(listed)
    }
}
