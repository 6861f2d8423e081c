use crate::error::{FlowError, FlowResult};
use crate::ports::{FilterPort, HookPort, MergeDirection, MergeRequest, RepoPort, StateStore};
use crate::state::{MergeOperationState, OperationAction, Step};
use crate::topology::MergeStrategy;

use super::{ContinueOverrides, Engine, PortResultExt, Tuning, UpdateOptions};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub branch: String,
    pub parent: Option<String>,
    pub strategy: MergeStrategy,
    pub updated_children: Vec<String>,
}

impl<'a, R, H, F, S> Engine<'a, R, H, F, S>
where
    R: RepoPort,
    H: HookPort,
    F: FilterPort,
    S: StateStore,
{
    /// Bring a topic branch up to date with its configured parent using the downstream
    /// strategy of its type.
    pub fn update_topic(
        &self,
        branch_type: &str,
        name: Option<&str>,
        options: UpdateOptions,
    ) -> FlowResult<UpdateReport> {
        self.update_topic_as(branch_type, name, options, "update")
    }

    /// Replay a topic branch onto its configured parent.
    pub fn rebase_topic(
        &self,
        branch_type: &str,
        name: Option<&str>,
        mut options: UpdateOptions,
    ) -> FlowResult<UpdateReport> {
        options.strategy = Some(MergeStrategy::Rebase);
        self.update_topic_as(branch_type, name, options, "rebase")
    }

    fn update_topic_as(
        &self,
        branch_type: &str,
        name: Option<&str>,
        options: UpdateOptions,
        action: &str,
    ) -> FlowResult<UpdateReport> {
        self.ensure_idle()?;
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = self.resolve_topic_branch(&topic, name)?;
        self.require_branch(&full)?;
        let parent = self.topology.resolve_merge_target(&topic.name)?.to_string();
        self.require_branch(&parent)?;

        let short = topic.short_name(&full).to_string();
        let hook = self.hook_context(&topic.name, action, &full, &short, &parent);
        self.run_pre_hook(&hook)?;

        let strategy = options.strategy.unwrap_or(topic.downstream_strategy);
        let state = self.begin_update(&topic.name, &short, &full, &parent, strategy, &options)?;
        let result = self.drive_update(state, false, tuning_of(&options));
        self.post_hook_for(&hook, &result);
        result
    }

    /// Update a base branch from its parent, then cascade into its auto-updating descendants.
    /// The root has no parent and only cascades.
    pub fn update_base(&self, base: &str, options: UpdateOptions) -> FlowResult<UpdateReport> {
        self.ensure_idle()?;
        let entry = self.topology.base_branch(base)?.clone();
        self.require_branch(&entry.name)?;
        if let Some(parent) = entry.parent.as_deref() {
            self.require_branch(parent)?;
        }

        let parent = entry.parent.clone().unwrap_or_default();
        let hook = self.hook_context(&entry.name, "update", &entry.name, &entry.name, &parent);
        self.run_pre_hook(&hook)?;

        let strategy = if entry.parent.is_some() {
            options.strategy.unwrap_or(entry.downstream_strategy)
        } else {
            MergeStrategy::None
        };
        let state =
            self.begin_update(&entry.name, &entry.name, &entry.name, &parent, strategy, &options)?;
        let result = self.drive_update(state, false, tuning_of(&options));
        self.post_hook_for(&hook, &result);
        result
    }

    /// Integrate the remote counterpart of a topic branch into the local branch.
    pub fn pull(&self, branch_type: &str, name: Option<&str>) -> FlowResult<UpdateReport> {
        self.ensure_idle()?;
        let topic = self.topology.topic_type(branch_type)?.clone();
        let full = self.resolve_topic_branch(&topic, name)?;
        self.require_branch(&full)?;

        self.ports
            .repo
            .fetch(&self.remote, std::slice::from_ref(&full))
            .context(format!("fetch {full} from {}", self.remote))?;
        let remote_exists = self
            .ports
            .repo
            .remote_branch_exists(&self.remote, &full)
            .context(format!("look up {}/{full}", self.remote))?;
        if !remote_exists {
            return Err(FlowError::BranchNotFound(format!("{}/{full}", self.remote)));
        }

        let source = format!("{}/{full}", self.remote);
        let short = topic.short_name(&full).to_string();
        let hook = self.hook_context(&topic.name, "pull", &full, &short, &source);
        self.run_pre_hook(&hook)?;

        let options = UpdateOptions::default();
        let state = self.begin_update(
            &topic.name,
            &short,
            &full,
            &source,
            MergeStrategy::Merge,
            &options,
        )?;
        let result = self.drive_update(state, false, Tuning::default());
        self.post_hook_for(&hook, &result);
        result
    }

    /// Resume a paused update at its recorded step.
    pub fn update_continue(&self, overrides: ContinueOverrides) -> FlowResult<UpdateReport> {
        let mut state = self.pending_operation()?.ok_or_else(|| {
            FlowError::InvalidInput("there is no update in progress to continue".to_string())
        })?;
        if state.action != OperationAction::Update {
            return Err(FlowError::OperationInProgress(format!(
                "the pending operation is a {}; run `{}`",
                state.describe(),
                state.resume_command()
            )));
        }
        if overrides.no_verify {
            state.no_verify = true;
        }

        let hook = self.hook_context(
            &state.branch_type,
            "update",
            &state.full_branch_name,
            &state.branch_name,
            &state.parent_branch,
        );
        self.ports
            .events
            .info(&format!("Continuing {}", state.describe()));
        let result = self.drive_update(state, true, Tuning::default());
        self.post_hook_for(&hook, &result);
        result
    }

    fn begin_update(
        &self,
        branch_type: &str,
        short: &str,
        full: &str,
        parent: &str,
        strategy: MergeStrategy,
        options: &UpdateOptions,
    ) -> FlowResult<MergeOperationState> {
        let mut state = MergeOperationState::new(
            OperationAction::Update,
            branch_type,
            short,
            full,
            parent,
            strategy,
        );
        state.no_verify = options.no_verify;
        state.original_branch = self
            .ports
            .repo
            .current_branch()
            .context("read current branch")?;
        state.started_at = Some(self.ports.clock.now_rfc3339());
        Ok(state)
    }

    fn drive_update(
        &self,
        mut state: MergeOperationState,
        resume: bool,
        tuning: Tuning,
    ) -> FlowResult<UpdateReport> {
        let entry_step = state.current_step;

        if state.current_step != Step::UpdateChildren {
            if !state.parent_branch.is_empty() {
                let mut request = MergeRequest::new(
                    state.merge_strategy,
                    &state.parent_branch,
                    &state.full_branch_name,
                    MergeDirection::Downstream,
                );
                request.no_verify = state.no_verify;
                request.preserve_merges = tuning.preserve_merges;
                request.interactive = tuning.interactive;
                self.integrate(&mut state, Step::Merge, &request, resume)?;
            }

            let is_base = self
                .topology
                .get(&state.full_branch_name)
                .is_some_and(|entry| entry.is_base());
            let cascade = if is_base {
                self.topology.cascade_set(&state.full_branch_name)?
            } else {
                Vec::new()
            };
            state.plan_children(&cascade);
            state.current_step = Step::UpdateChildren;
        }

        self.update_children(&mut state, resume && entry_step == Step::UpdateChildren)?;

        let repo = self.ports.repo;
        let mut restore = state.full_branch_name.clone();
        if let Some(original) = state.original_branch.as_deref() {
            let exists = repo
                .branch_exists(original)
                .context(format!("look up branch {original}"))?;
            if exists {
                restore = original.to_string();
            }
        }
        repo.checkout(&restore)
            .context(format!("checkout {restore}"))?;
        self.clear_state()?;

        Ok(UpdateReport {
            branch: state.full_branch_name.clone(),
            parent: Some(state.parent_branch.clone()).filter(|parent| !parent.is_empty()),
            strategy: state.merge_strategy,
            updated_children: state.updated_branches.clone(),
        })
    }
}

fn tuning_of(options: &UpdateOptions) -> Tuning {
    Tuning {
        preserve_merges: options.preserve_merges,
        interactive: options.interactive,
    }
}
