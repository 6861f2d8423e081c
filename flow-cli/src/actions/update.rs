use flow_core::FlowContext;
use flow_core::vcs;
use flow_kernel::FlowError;
use flow_kernel::engine::{AbortReport, ContinueOverrides, UpdateOptions, UpdateReport};

use super::shared::{join_or_none, print_outcome, row};

pub(crate) enum BaseUpdateMode {
    Start(Option<String>),
    Continue,
    Abort,
}

pub(crate) fn run_base_update(
    ctx: &FlowContext,
    mode: BaseUpdateMode,
    options: UpdateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let engine = ctx.engine();
    match mode {
        BaseUpdateMode::Abort => {
            let report = engine.abort()?;
            print_abort(&report);
        }
        BaseUpdateMode::Continue => {
            let report = engine.update_continue(ContinueOverrides {
                squash_message: None,
                no_verify: options.no_verify,
            })?;
            print_update("Update complete", &report);
        }
        BaseUpdateMode::Start(base) => {
            let base = match base {
                Some(base) => base,
                None => vcs::current_branch_name_in(ctx.root())?.ok_or_else(|| {
                    FlowError::InvalidInput(
                        "HEAD is detached; name the base branch to update".to_string(),
                    )
                })?,
            };
            let report = engine.update_base(&base, options)?;
            print_update("Update complete", &report);
        }
    }
    Ok(())
}

pub(crate) fn print_update(title: &str, report: &UpdateReport) {
    let mut rows = vec![row("Branch", report.branch.clone())];
    match report.parent.as_deref() {
        Some(parent) => {
            rows.push(row("From", parent));
            rows.push(row("Strategy", report.strategy.as_str()));
        }
        None => rows.push(row("From", "(root branch)")),
    }
    rows.push(row("Cascaded", join_or_none(&report.updated_children)));
    print_outcome(title, rows);
}

pub(crate) fn print_abort(report: &AbortReport) {
    let mut rows = vec![row("Operation", report.operation.clone())];
    if let Some(branch) = report.restored_branch.as_deref() {
        rows.push(row("Checked out", branch));
    }
    print_outcome("Aborted", rows);
}
