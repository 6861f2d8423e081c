use colored::Colorize;
use flow_core::FlowContext;
use flow_core::vcs;
use flow_kernel::engine::ListedBranch;
use flow_kernel::state::MergeOperationState;
use flow_kernel::topology::{BranchTypeConfig, Topology};
use serde::Serialize;

use super::shared::{format_block_with_indent, operation_rows, print_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverviewReport {
    remote: String,
    current_branch: Option<String>,
    bases: Vec<BaseView>,
    pending_operation: Option<MergeOperationState>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BaseView {
    name: String,
    parent: Option<String>,
    depth: usize,
    exists: bool,
    auto_update: bool,
    topics: Vec<TopicView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicView {
    branch_type: String,
    prefix: String,
    branches: Vec<BranchView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BranchView {
    name: String,
    short: String,
    stored_base: Option<String>,
    current: bool,
}

impl From<ListedBranch> for BranchView {
    fn from(listed: ListedBranch) -> Self {
        Self {
            name: listed.full,
            short: listed.short,
            stored_base: listed.stored_base,
            current: listed.current,
        }
    }
}

/// Base branches depth-first from the root, siblings in declaration order.
fn walk<'t>(
    topology: &'t Topology,
    base: &'t BranchTypeConfig,
    depth: usize,
    out: &mut Vec<(&'t BranchTypeConfig, usize)>,
) {
    out.push((base, depth));
    for child in topology.children_of(&base.name) {
        walk(topology, child, depth + 1, out);
    }
}

fn collect(ctx: &FlowContext) -> Result<OverviewReport, Box<dyn std::error::Error>> {
    let engine = ctx.engine();
    let topology = &ctx.settings.topology;

    let mut ordered = Vec::new();
    if let Some(root) = topology.root() {
        walk(topology, root, 0, &mut ordered);
    }

    let mut bases = Vec::new();
    for (base, depth) in ordered {
        let mut topics = Vec::new();
        for topic in topology
            .topic_types()
            .filter(|topic| topic.parent.as_deref() == Some(base.name.as_str()))
        {
            let branches = engine
                .list(&topic.name)?
                .into_iter()
                .map(BranchView::from)
                .collect();
            topics.push(TopicView {
                branch_type: topic.name.clone(),
                prefix: topic.prefix.clone(),
                branches,
            });
        }
        bases.push(BaseView {
            name: base.name.clone(),
            parent: base.parent.clone(),
            depth,
            exists: vcs::branch_exists_in(ctx.root(), &base.name)?,
            auto_update: base.auto_update,
            topics,
        });
    }

    Ok(OverviewReport {
        remote: ctx.settings.remote.clone(),
        current_branch: vcs::current_branch_name_in(ctx.root())?,
        bases,
        pending_operation: engine.pending_operation()?,
    })
}

pub(crate) fn run_overview(
    ctx: &FlowContext,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let report = collect(ctx)?;
    if json {
        return print_json(&report);
    }

    let mut lines = Vec::new();
    for base in &report.bases {
        let indent = "  ".repeat(base.depth);
        let mut label = base.name.bold().to_string();
        if report.current_branch.as_deref() == Some(base.name.as_str()) {
            label = format!("{label} {}", "(current)".green());
        }
        if !base.exists {
            label = format!("{label} {}", "(missing)".red());
        }
        if base.auto_update {
            label = format!("{label} {}", "[auto-update]".dimmed());
        }
        lines.push(format!("{indent}{label}"));

        for topic in &base.topics {
            let pattern = format!("{}*", topic.prefix);
            lines.push(format!(
                "{indent}  {} {}",
                topic.branch_type.cyan(),
                pattern.dimmed()
            ));
            for branch in &topic.branches {
                let marker = if branch.current { "*" } else { "-" };
                let mut line = format!("{indent}    {marker} {}", branch.short);
                let foreign_base = branch
                    .stored_base
                    .as_deref()
                    .filter(|stored| *stored != base.name);
                if let Some(stored) = foreign_base {
                    line.push_str(&format!(" (started from {stored})"));
                }
                lines.push(line);
            }
        }
    }
    println!("{}", lines.join("\n"));

    if let Some(state) = report.pending_operation.as_ref() {
        println!();
        println!("{}", "Operation in progress".yellow().bold());
        println!("{}", format_block_with_indent(operation_rows(state), 2));
        println!(
            "  Continue with `{}` or abandon with `{}`.",
            state.resume_command(),
            state.abort_command()
        );
    }
    Ok(())
}
