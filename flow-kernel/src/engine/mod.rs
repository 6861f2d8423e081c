//! Finish/update orchestration over the repository, hook, filter and state ports.
//!
//! Every operation follows the same envelope: refuse while another operation is persisted, run
//! the pre-hook, mutate, run the post-hook. Integration steps that stop on conflicts persist a
//! [`MergeOperationState`] and surface [`FlowError::MergeConflict`]; `--continue` re-enters the
//! driver at the recorded step.

mod branch_ops;
mod finish;
mod options;
mod update;


pub use branch_ops::{ListedBranch, StartReport};
pub use finish::{AbortReport, FinishReport};
pub use options::{ContinueOverrides, DeleteOptions, FinishOptions, StartOptions, UpdateOptions};
pub use update::UpdateReport;

use crate::error::{FlowError, FlowResult};
use crate::ports::{
    ClockPort, EventSink, FilterPort, HookContext, HookOutcome, HookPhase, HookPort,
    MergeOutcome, MergeRequest, RepoPort, StateStore,
};
use crate::state::{MergeOperationState, Step};
use crate::topology::{BranchTypeConfig, Topology};

pub(crate) trait PortResultExt<T> {
    fn context(self, context: impl Into<String>) -> FlowResult<T>;
}

impl<T, E> PortResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> FlowResult<T> {
        self.map_err(|err| FlowError::tool(context, err))
    }
}

/// Borrowed adapters the engine drives.
pub struct Ports<'a, R, H, F, S> {
    pub repo: &'a R,
    pub hooks: &'a H,
    pub filters: &'a F,
    pub store: &'a S,
    pub clock: &'a dyn ClockPort,
    pub events: &'a dyn EventSink,
}

pub struct Engine<'a, R, H, F, S> {
    ports: Ports<'a, R, H, F, S>,
    topology: &'a Topology,
    remote: String,
}

/// Rebase flavour requested by the caller of an update; not persisted.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Tuning {
    pub preserve_merges: bool,
    pub interactive: bool,
}

impl<'a, R, H, F, S> Engine<'a, R, H, F, S>
where
    R: RepoPort,
    H: HookPort,
    F: FilterPort,
    S: StateStore,
{
    pub fn new(ports: Ports<'a, R, H, F, S>, topology: &'a Topology, remote: &str) -> Self {
        Self {
            ports,
            topology,
            remote: remote.to_string(),
        }
    }

    pub fn topology(&self) -> &Topology {
        self.topology
    }

    pub fn pending_operation(&self) -> FlowResult<Option<MergeOperationState>> {
        self.ports
            .store
            .load()
            .context(format!("read {}", self.ports.store.location()))
    }

    /// Refuse to start new work while an operation record exists.
    fn ensure_idle(&self) -> FlowResult<()> {
        if let Some(state) = self.pending_operation()? {
            return Err(FlowError::OperationInProgress(format!(
                "a {} is in progress; run `{}` or `{}` first",
                state.describe(),
                state.resume_command(),
                state.abort_command()
            )));
        }
        Ok(())
    }

    fn require_branch(&self, branch: &str) -> FlowResult<()> {
        let exists = self
            .ports
            .repo
            .branch_exists(branch)
            .context(format!("look up branch {branch}"))?;
        if exists {
            Ok(())
        } else {
            Err(FlowError::BranchNotFound(branch.to_string()))
        }
    }

    /// Full branch name for a topic instance, defaulting to the checked-out branch.
    fn resolve_topic_branch(
        &self,
        topic: &BranchTypeConfig,
        name: Option<&str>,
    ) -> FlowResult<String> {
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            return Ok(topic.full_name(name));
        }

        let current = self
            .ports
            .repo
            .current_branch()
            .context("read current branch")?;
        match current {
            Some(branch) if topic.matches_branch(&branch) => Ok(branch),
            Some(branch) => Err(FlowError::InvalidInput(format!(
                "the current branch `{branch}` is not a {} branch; name one explicitly",
                topic.name
            ))),
            None => Err(FlowError::InvalidInput(format!(
                "HEAD is detached; name the {} branch explicitly",
                topic.name
            ))),
        }
    }

    fn hook_context(
        &self,
        branch_type: &str,
        action: &str,
        full_branch: &str,
        short_name: &str,
        base_branch: &str,
    ) -> HookContext {
        HookContext {
            branch_type: branch_type.to_string(),
            action: action.to_string(),
            full_branch: full_branch.to_string(),
            short_name: short_name.to_string(),
            base_branch: base_branch.to_string(),
            remote: self.remote.clone(),
            version: None,
            exit_code: None,
        }
    }

    fn run_pre_hook(&self, context: &HookContext) -> FlowResult<()> {
        let hook = context.hook_name(HookPhase::Pre);
        let outcome = self
            .ports
            .hooks
            .run_hook(HookPhase::Pre, context)
            .context(format!("run {hook}"))?;
        match outcome {
            HookOutcome::Missing => Ok(()),
            HookOutcome::Completed { exit_code: 0, .. } => Ok(()),
            HookOutcome::Completed {
                exit_code, stderr, ..
            } => Err(FlowError::HookRejection {
                hook,
                exit_code,
                stderr,
            }),
        }
    }

    /// Post-hooks never change the outcome; failures are reported only.
    fn run_post_hook(&self, context: &HookContext, exit_code: i32) {
        let mut context = context.clone();
        context.exit_code = Some(exit_code);
        let hook = context.hook_name(HookPhase::Post);
        match self.ports.hooks.run_hook(HookPhase::Post, &context) {
            Ok(HookOutcome::Completed { exit_code, .. }) if exit_code != 0 => {
                self.ports
                    .events
                    .warn(&format!("{hook} exited with {exit_code}"));
            }
            Ok(_) => {}
            Err(err) => self.ports.events.warn(&format!("{hook} failed: {err}")),
        }
    }

    fn post_hook_for<T>(&self, context: &HookContext, result: &FlowResult<T>) {
        match result {
            Ok(_) => self.run_post_hook(context, 0),
            Err(err) if err.is_paused() => {}
            Err(err) => self.run_post_hook(context, err.exit_code()),
        }
    }

    fn save_state(&self, state: &MergeOperationState) -> FlowResult<()> {
        self.ports
            .store
            .save(state)
            .context(format!("write {}", self.ports.store.location()))
    }

    fn clear_state(&self) -> FlowResult<()> {
        self.ports
            .store
            .clear()
            .context(format!("remove {}", self.ports.store.location()))
    }

    /// Run or resume one integration step, persisting and pausing on conflicts.
    fn integrate(
        &self,
        state: &mut MergeOperationState,
        step: Step,
        request: &MergeRequest,
        resume: bool,
    ) -> FlowResult<()> {
        if !request.strategy.integrates() {
            return Ok(());
        }

        let verb = if resume { "continue" } else { "apply" };
        self.ports.events.progress(&format!(
            "{} {}: {} -> {}",
            verb, request.strategy, request.source, request.target
        ));
        let attempt = if resume {
            self.ports.repo.continue_strategy(request)
        } else {
            self.ports.repo.apply_strategy(request)
        };
        let outcome = attempt.context(format!(
            "{} {} of {} into {}",
            verb, request.strategy, request.source, request.target
        ))?;

        match outcome {
            MergeOutcome::Success => Ok(()),
            MergeOutcome::Conflict { files } => {
                state.current_step = step;
                self.save_state(state)?;
                Err(FlowError::MergeConflict {
                    step: request.strategy.to_string(),
                    branch: request.target.clone(),
                    files,
                })
            }
        }
    }

    /// Apply each pending cascade child from its planned source branch, recording progress
    /// after every child so a resumed run never repeats one.
    fn update_children(&self, state: &mut MergeOperationState, resume: bool) -> FlowResult<()> {
        let no_verify = state.no_verify;
        for child in state.pending_children() {
            let resuming_child = resume && state.current_child_branch.as_deref() == Some(&child);
            let parent = state.child_parent(&child);
            let mut request = MergeRequest::new(
                state.child_strategy(&child),
                &parent,
                &child,
                crate::ports::MergeDirection::Downstream,
            );
            request.no_verify = no_verify;

            state.current_child_branch = Some(child.clone());
            self.save_state(state)?;
            self.integrate(state, Step::UpdateChildren, &request, resuming_child)?;

            state.mark_child_updated(&child);
            self.save_state(state)?;
            self.ports
                .events
                .info(&format!("Updated {child} from {parent}"));
        }
        Ok(())
    }
}
