use colored::Colorize;
use flow_core::FlowContext;
use flow_core::display::{self, format_label_value_block};
use flow_kernel::FlowError;
use flow_kernel::state::MergeOperationState;
use serde::Serialize;

use crate::errors::ReportedError;

pub(crate) fn format_block_with_indent(rows: Vec<(String, String)>, indent: usize) -> String {
    format_label_value_block(&rows, indent)
}

pub(crate) fn row(label: &str, value: impl Into<String>) -> (String, String) {
    (label.to_string(), value.into())
}

pub(crate) fn print_outcome(title: &str, rows: Vec<(String, String)>) {
    println!("{}", title.bold());
    println!("{}", format_block_with_indent(rows, 2));
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Rows describing a paused or stale operation record.
pub(crate) fn operation_rows(state: &MergeOperationState) -> Vec<(String, String)> {
    let mut rows = vec![
        row("Operation", state.describe()),
        row("Branch", state.full_branch_name.clone()),
        row("Parent", state.parent_branch.clone()),
        row("Step", state.current_step.label()),
    ];
    if let Some(child) = state.current_child_branch.as_deref() {
        rows.push(row("Child", child));
    }
    if !state.child_branches.is_empty() {
        rows.push(row("Children", state.child_branches.join(", ")));
        rows.push(row("Updated", join_or_none(&state.updated_branches)));
    }
    if let Some(started) = state.started_at.as_deref() {
        rows.push(row("Started", started));
    }
    rows
}

/// Turn a conflict pause into resume instructions; other errors pass through unchanged.
pub(crate) fn explain_pause(
    ctx: &FlowContext,
    err: Box<dyn std::error::Error>,
) -> Box<dyn std::error::Error> {
    let flow = match err.downcast::<FlowError>() {
        Ok(flow) => *flow,
        Err(other) => return other,
    };
    let code = flow.exit_code();
    let (step, branch, files) = match flow {
        FlowError::MergeConflict {
            step,
            branch,
            files,
        } => (step, branch, files),
        other => return Box::new(other),
    };

    display::warn(format!("{step} stopped on conflicts while updating `{branch}`"));
    if !files.is_empty() {
        eprintln!("Conflicting files:");
        for file in files {
            eprintln!("  {file}");
        }
    }

    match ctx.engine().pending_operation() {
        Ok(Some(state)) => {
            eprintln!("{}", format_block_with_indent(operation_rows(&state), 2));
            eprintln!();
            eprintln!("Resolve the conflicts and stage the files, then run:");
            eprintln!("  {}", state.resume_command());
            eprintln!("To give up and restore the original branch, run:");
            eprintln!("  {}", state.abort_command());
        }
        Ok(None) => {
            eprintln!("Resolve the conflicts, stage the files and commit.");
        }
        Err(read_err) => {
            display::warn(format!("could not read the operation record: {read_err}"));
        }
    }

    Box::new(ReportedError::new(code))
}
