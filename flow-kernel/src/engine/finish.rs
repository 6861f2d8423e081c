use crate::error::{FlowError, FlowResult};
use crate::ports::{
    FilterKind, FilterOutcome, FilterPort, HookPort, MergeDirection, MergeRequest, RepoPort,
    StateStore, TagRequest,
};
use crate::state::{MergeOperationState, OperationAction, Step};
use crate::sync::{SyncStatus, SyncVerdict, gate};
use crate::topology::{BranchTypeConfig, MergeStrategy};

use super::{ContinueOverrides, Engine, FinishOptions, PortResultExt};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinishReport {
    pub branch: String,
    pub target: String,
    pub strategy: MergeStrategy,
    pub tag: Option<String>,
    pub updated_children: Vec<String>,
    pub deleted_local: bool,
    pub deleted_remote: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbortReport {
    pub operation: String,
    pub restored_branch: Option<String>,
}

pub(crate) fn default_squash_message(source: &str) -> String {
    format!("Squashed commit of branch {source}")
}

pub(crate) fn default_tag_message(tag: &str) -> String {
    format!("Tagging version {tag}")
}

impl<'a, R, H, F, S> Engine<'a, R, H, F, S>
where
    R: RepoPort,
    H: HookPort,
    F: FilterPort,
    S: StateStore,
{
    /// Merge a topic branch into its currently configured parent, tag it, cascade the result
    /// and clean up.
    pub fn finish(
        &self,
        branch_type: &str,
        name: Option<&str>,
        options: FinishOptions,
    ) -> FlowResult<FinishReport> {
        let topic = self.topology.topic_type(branch_type)?.clone();

        if let Some(state) = self.pending_operation()? {
            let requested = self.resolve_topic_branch(&topic, name).ok();
            let message = if requested.as_deref() == Some(state.full_branch_name.as_str()) {
                format!(
                    "a {} is already in progress; run `{}` or `{}`",
                    state.describe(),
                    state.resume_command(),
                    state.abort_command()
                )
            } else {
                format!(
                    "a {} is in progress; run `{}` or `{}` before finishing another branch",
                    state.describe(),
                    state.resume_command(),
                    state.abort_command()
                )
            };
            return Err(FlowError::OperationInProgress(message));
        }

        let full = self.resolve_topic_branch(&topic, name)?;

        self.require_branch(&full)?;
        let matched = self.topology.topic_type_for_branch(&full);
        if matched.map(|entry| entry.name.as_str()) != Some(topic.name.as_str()) && !options.force
        {
            return Err(FlowError::InvalidInput(format!(
                "`{full}` does not match the {} prefix `{}`; pass --force to finish it anyway",
                topic.name, topic.prefix
            )));
        }

        let target = self.topology.resolve_merge_target(&topic.name)?.to_string();
        self.require_branch(&target)?;

        let stored = self
            .ports
            .repo
            .stored_base(&full)
            .context(format!("read stored base of {full}"))?;
        if let Some(stored) = stored.filter(|stored| stored != &target) {
            self.ports.events.info(&format!(
                "`{full}` was started from {stored}; finishing into the configured parent {target}"
            ));
        }

        if options.fetch {
            let branches = vec![full.clone(), target.clone()];
            if let Err(err) = self.ports.repo.fetch(&self.remote, &branches) {
                self.ports
                    .events
                    .warn(&format!("fetch from {} failed: {err}", self.remote));
            }
        }

        self.check_sync(&full, options.force)?;

        let clean = self.ports.repo.is_clean().context("inspect working tree")?;
        if !clean {
            return Err(FlowError::InvalidInput(
                "the working tree has uncommitted changes; commit or stash them first".to_string(),
            ));
        }

        let short = topic.short_name(&full).to_string();
        let mut hook = self.hook_context(&topic.name, "finish", &full, &short, &target);
        if topic.creates_tag {
            hook.version = Some(short.clone());
        }
        self.run_pre_hook(&hook)?;

        let strategy = options.strategy.unwrap_or(topic.upstream_strategy);
        let mut state = MergeOperationState::new(
            OperationAction::Finish,
            &topic.name,
            &short,
            &full,
            &target,
            strategy,
        );
        state.squash_message = options.squash_message.clone();
        state.no_verify = options.no_verify;
        state.tag_name = options.tag_name.clone();
        state.original_branch = self
            .ports
            .repo
            .current_branch()
            .context("read current branch")?;
        state.started_at = Some(self.ports.clock.now_rfc3339());
        state.finish_options = Some(options);

        let result = self.drive_finish(&topic, state, false);
        self.post_hook_for(&hook, &result);
        result
    }

    /// Resume a paused finish at its recorded step.
    pub fn finish_continue(
        &self,
        branch_type: &str,
        name: Option<&str>,
        overrides: ContinueOverrides,
    ) -> FlowResult<FinishReport> {
        let mut state = self.pending_operation()?.ok_or_else(|| {
            FlowError::InvalidInput("there is no finish in progress to continue".to_string())
        })?;

        if state.action != OperationAction::Finish {
            return Err(FlowError::OperationInProgress(format!(
                "the pending operation is a {}; run `{}`",
                state.describe(),
                state.resume_command()
            )));
        }
        if state.branch_type != branch_type {
            return Err(FlowError::OperationInProgress(format!(
                "the pending finish belongs to `{}`; run `{}`",
                state.full_branch_name,
                state.resume_command()
            )));
        }
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            let wanted = self
                .topology
                .get(branch_type)
                .map(|topic| topic.full_name(name))
                .unwrap_or_else(|| name.to_string());
            if wanted != state.full_branch_name {
                return Err(FlowError::OperationInProgress(format!(
                    "the pending finish belongs to `{}`, not `{wanted}`",
                    state.full_branch_name
                )));
            }
        }

        if let Some(message) = overrides.squash_message {
            state.squash_message = Some(message);
        }
        if overrides.no_verify {
            state.no_verify = true;
        }

        let topic = self.topology.topic_type(&state.branch_type)?.clone();
        let mut hook = self.hook_context(
            &topic.name,
            "finish",
            &state.full_branch_name,
            &state.branch_name,
            &state.parent_branch,
        );
        if topic.creates_tag {
            hook.version = Some(state.branch_name.clone());
        }

        self.ports
            .events
            .info(&format!("Continuing {}", state.describe()));
        let result = self.drive_finish(&topic, state, true);
        self.post_hook_for(&hook, &result);
        result
    }

    /// `<type> finish --abort`: abandon the pending operation only when it is a finish of
    /// `branch_type`. Anything else is left for its own command or `git flow update --abort`.
    pub fn finish_abort(&self, branch_type: &str) -> FlowResult<AbortReport> {
        let state = self.pending_operation()?.ok_or_else(|| {
            FlowError::InvalidInput("there is no finish in progress to abort".to_string())
        })?;
        if state.action != OperationAction::Finish || state.branch_type != branch_type {
            return Err(FlowError::OperationInProgress(format!(
                "the pending operation is a {}; run `{}` or `git flow update --abort`",
                state.describe(),
                state.abort_command()
            )));
        }
        self.abort()
    }

    /// Abandon the persisted operation: abort the in-progress integration, restore the branch
    /// that was checked out when it began and drop the record.
    pub fn abort(&self) -> FlowResult<AbortReport> {
        let state = self.pending_operation()?.ok_or_else(|| {
            FlowError::InvalidInput("there is no finish or update in progress to abort".to_string())
        })?;

        self.ports
            .repo
            .abort_in_progress()
            .context("abort in-progress merge")?;

        let mut restored = None;
        let candidates = state
            .original_branch
            .iter()
            .chain(std::iter::once(&state.full_branch_name));
        for candidate in candidates {
            let exists = self
                .ports
                .repo
                .branch_exists(candidate)
                .context(format!("look up branch {candidate}"))?;
            if exists {
                self.ports
                    .repo
                    .checkout(candidate)
                    .context(format!("checkout {candidate}"))?;
                restored = Some(candidate.clone());
                break;
            }
        }

        self.clear_state()?;
        self.ports
            .events
            .info(&format!("Aborted {}", state.describe()));

        Ok(AbortReport {
            operation: state.describe(),
            restored_branch: restored,
        })
    }

    fn check_sync(&self, branch: &str, force: bool) -> FlowResult<()> {
        let counts = self
            .ports
            .repo
            .tracking_counts(branch, &self.remote)
            .context(format!("compare {branch} with {}", self.remote))?;
        let status = SyncStatus::classify(counts.as_ref());
        match gate(branch, &status, force, false) {
            SyncVerdict::Proceed => Ok(()),
            SyncVerdict::Note(note) => {
                self.ports.events.info(&note);
                Ok(())
            }
            SyncVerdict::Reject(message) => Err(FlowError::RemoteState {
                branch: branch.to_string(),
                status: status.label(),
                message,
            }),
        }
    }

    fn upstream_request(&self, state: &MergeOperationState) -> MergeRequest {
        let options = state.finish_options.clone().unwrap_or_default();
        let mut request = MergeRequest::new(
            state.merge_strategy,
            &state.full_branch_name,
            &state.parent_branch,
            MergeDirection::Upstream,
        );
        request.no_verify = state.no_verify;
        request.fast_forward = options.fast_forward;
        request.preserve_merges = options.preserve_merges;
        if state.merge_strategy == MergeStrategy::Squash {
            request.message = Some(
                state
                    .squash_message
                    .clone()
                    .unwrap_or_else(|| default_squash_message(&state.full_branch_name)),
            );
        }
        request
    }

    fn drive_finish(
        &self,
        topic: &BranchTypeConfig,
        mut state: MergeOperationState,
        resume: bool,
    ) -> FlowResult<FinishReport> {
        let entry_step = state.current_step;

        if state.current_step == Step::Merge {
            let request = self.upstream_request(&state);
            self.integrate(&mut state, Step::Merge, &request, resume)?;
            state.current_step = Step::Tag;
        }

        if state.current_step == Step::Tag {
            if let Err(err) = self.tag_step(topic, &mut state) {
                state.current_step = Step::Tag;
                self.save_state(&state)?;
                return Err(err);
            }
            let cascade = self.topology.cascade_set(&state.parent_branch)?;
            state.plan_children(&cascade);
            state.current_step = Step::UpdateChildren;
        }

        if state.current_step == Step::UpdateChildren {
            self.update_children(&mut state, resume && entry_step == Step::UpdateChildren)?;
        }

        self.cleanup(state)
    }

    fn tag_step(
        &self,
        topic: &BranchTypeConfig,
        state: &mut MergeOperationState,
    ) -> FlowResult<()> {
        let options = state.finish_options.clone().unwrap_or_default();
        if !topic.creates_tag || options.no_tag {
            state.tag_name = None;
            return Ok(());
        }

        let tag = state
            .tag_name
            .clone()
            .unwrap_or_else(|| format!("{}{}", topic.tag_prefix, state.branch_name));
        state.tag_name = Some(tag.clone());

        let exists = self
            .ports
            .repo
            .tag_exists(&tag)
            .context(format!("look up tag {tag}"))?;
        if exists {
            self.ports
                .events
                .info(&format!("Tag {tag} already exists; skipping"));
            return Ok(());
        }

        let message = options
            .message
            .clone()
            .unwrap_or_else(|| default_tag_message(&tag));
        let message = self.filter_tag_message(&topic.name, message, &tag)?;

        self.ports
            .repo
            .create_tag(&TagRequest {
                name: tag.clone(),
                target: state.parent_branch.clone(),
                message: message.clone(),
                sign: options.sign || options.signing_key.is_some(),
                signing_key: options.signing_key.clone(),
            })
            .context(format!("create tag {tag}"))?;
        state.tag_message = Some(message);
        self.ports
            .events
            .info(&format!("Tagged {} as {tag}", state.parent_branch));
        Ok(())
    }

    fn filter_tag_message(
        &self,
        branch_type: &str,
        message: String,
        tag: &str,
    ) -> FlowResult<String> {
        let kind = FilterKind::FinishTagMessage;
        let args = vec![message.clone(), tag.to_string()];
        let outcome = self
            .ports
            .filters
            .run_filter(kind, branch_type, &args)
            .context(format!("run {}", kind.script_name(branch_type)))?;
        match outcome {
            FilterOutcome::Missing => Ok(message),
            FilterOutcome::Output(output) if output.trim().is_empty() => Ok(message),
            FilterOutcome::Output(output) => Ok(output.trim().to_string()),
            FilterOutcome::Failed { exit_code, stderr } => Err(FlowError::FilterFailure {
                filter: kind.script_name(branch_type),
                exit_code,
                stderr,
            }),
        }
    }

    fn cleanup(&self, state: MergeOperationState) -> FlowResult<FinishReport> {
        let options = state.finish_options.clone().unwrap_or_default();
        let full = state.full_branch_name.clone();
        let target = state.parent_branch.clone();
        let repo = self.ports.repo;

        repo.checkout(&target)
            .context(format!("checkout {target}"))?;

        let mut deleted_local = false;
        let local_exists = repo
            .branch_exists(&full)
            .context(format!("look up branch {full}"))?;
        if local_exists && !options.keeps_local() {
            let force = options.force_delete
                || matches!(
                    state.merge_strategy,
                    MergeStrategy::Squash | MergeStrategy::Rebase
                );
            let merged = force
                || repo
                    .is_merged_into(&full, &target)
                    .context(format!("check whether {full} is merged into {target}"))?;
            if merged {
                repo.delete_branch(&full, force)
                    .context(format!("delete branch {full}"))?;
                deleted_local = true;
            } else {
                self.ports.events.warn(&format!(
                    "`{full}` is not fully merged into {target}; kept it (use --force_delete)"
                ));
            }
        }

        let mut deleted_remote = false;
        if !options.keeps_remote() {
            let remote_exists = repo
                .remote_branch_exists(&self.remote, &full)
                .context(format!("look up {}/{full}", self.remote))?;
            if remote_exists {
                match repo.delete_remote_branch(&self.remote, &full, &options.push_options) {
                    Ok(()) => deleted_remote = true,
                    Err(err) => self.ports.events.warn(&format!(
                        "could not delete {}/{full}: {err}",
                        self.remote
                    )),
                }
            }
        }

        if deleted_local {
            repo.clear_stored_base(&full)
                .context(format!("clear stored base of {full}"))?;
        }
        self.clear_state()?;

        Ok(FinishReport {
            branch: full,
            target,
            strategy: state.merge_strategy,
            tag: state.tag_name.clone(),
            updated_children: state.updated_branches.clone(),
            deleted_local,
            deleted_remote,
        })
    }
}
