use std::fs;
use std::path::Path;

use colored::Colorize;
use flow_core::FlowContext;
use flow_core::config;
use flow_core::display;
use flow_core::vcs;
use flow_kernel::FlowError;
use flow_kernel::topology::{BranchKind, BranchTypeConfig, MergeStrategy};
use serde::Serialize;

use super::shared::{format_block_with_indent, print_json, print_outcome, row};

/// Field changes requested for a branch type; `None` leaves a field as it is.
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldChanges {
    pub parent: Option<String>,
    pub prefix: Option<String>,
    pub upstream_strategy: Option<MergeStrategy>,
    pub downstream_strategy: Option<MergeStrategy>,
    pub auto_update: Option<bool>,
    pub creates_tag: Option<bool>,
    pub tag_prefix: Option<String>,
    pub starting_point: Option<String>,
}

impl FieldChanges {
    fn apply(&self, entry: &mut BranchTypeConfig) {
        if let Some(parent) = self.parent.as_deref() {
            entry.parent = Some(parent.trim().to_string()).filter(|parent| !parent.is_empty());
        }
        if let Some(prefix) = &self.prefix {
            entry.prefix = prefix.clone();
        }
        if let Some(strategy) = self.upstream_strategy {
            entry.upstream_strategy = strategy;
        }
        if let Some(strategy) = self.downstream_strategy {
            entry.downstream_strategy = strategy;
        }
        if let Some(enabled) = self.auto_update {
            entry.auto_update = enabled;
        }
        if let Some(enabled) = self.creates_tag {
            entry.creates_tag = enabled;
        }
        if let Some(prefix) = &self.tag_prefix {
            entry.tag_prefix = prefix.clone();
        }
        if let Some(start) = self.starting_point.as_deref() {
            entry.starting_point = Some(start.trim().to_string()).filter(|start| !start.is_empty());
        }
    }
}

#[derive(Serialize)]
struct ConfigListing<'a> {
    remote: &'a str,
    initialized: bool,
    branches: &'a [BranchTypeConfig],
}

pub(crate) fn run_config_list(
    ctx: &FlowContext,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &ctx.settings;
    if json {
        return print_json(&ConfigListing {
            remote: &settings.remote,
            initialized: settings.initialized,
            branches: settings.topology.entries(),
        });
    }

    if settings.topology.is_empty() {
        println!("No branch types configured; run `git flow init`.");
        return Ok(());
    }

    let mut sections = Vec::new();
    for entry in settings.topology.entries() {
        let heading = format!("{} ({})", entry.name.bold(), entry.kind.as_str());
        sections.push(format!(
            "{heading}\n{}",
            format_block_with_indent(describe(entry), 2)
        ));
    }
    println!("{}", sections.join("\n\n"));
    Ok(())
}

fn describe(entry: &BranchTypeConfig) -> Vec<(String, String)> {
    let mut rows = vec![row("Parent", entry.parent.as_deref().unwrap_or("(root)"))];
    if entry.is_topic() {
        rows.push(row("Prefix", entry.prefix.clone()));
    }
    rows.push(row("Upstream", entry.upstream_strategy.as_str()));
    rows.push(row("Downstream", entry.downstream_strategy.as_str()));
    if entry.is_base() {
        rows.push(row("Auto update", entry.auto_update.to_string()));
    }
    if entry.creates_tag {
        let prefix = if entry.tag_prefix.is_empty() {
            "(none)".to_string()
        } else {
            entry.tag_prefix.clone()
        };
        rows.push(row("Tag prefix", prefix));
    }
    if let Some(start) = entry.starting_point.as_deref() {
        rows.push(row("Starts from", start));
    }
    rows
}

pub(crate) fn run_config_add(
    ctx: &mut FlowContext,
    kind: BranchKind,
    name: &str,
    parent: Option<&str>,
    changes: FieldChanges,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let name = name.trim();
    if ctx.settings.topology.get(name).is_some() {
        return Err(FlowError::InvalidInput(format!(
            "branch type `{name}` already exists; use `git flow config edit {name}`"
        ))
        .into());
    }

    let mut entry = match kind {
        BranchKind::Base => BranchTypeConfig::base(name, parent),
        BranchKind::Topic => {
            let parent = parent.ok_or_else(|| {
                FlowError::InvalidInput(format!("topic type `{name}` needs a parent base branch"))
            })?;
            BranchTypeConfig::topic(name, parent, &format!("{name}/"))
        }
    };
    changes.apply(&mut entry);

    let next = config::upsert_branch_type(ctx.root(), &ctx.settings.topology, entry.clone())?;
    if entry.is_base() {
        ensure_branch(ctx.root(), &entry)?;
    }
    ctx.settings.topology = next;

    print_outcome(&format!("Added {} `{}`", entry.kind.as_str(), entry.name), describe(&entry));
    Ok(())
}

/// Create the branch of a new base type from its parent when it does not exist yet.
fn ensure_branch(root: &Path, entry: &BranchTypeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(parent) = entry.parent.as_deref() else {
        return Ok(());
    };
    if vcs::branch_exists_in(root, &entry.name)? {
        return Ok(());
    }
    if !vcs::branch_exists_in(root, parent)? {
        display::warn(format!(
            "branch `{}` was not created because `{parent}` does not exist yet",
            entry.name
        ));
        return Ok(());
    }
    vcs::create_branch_from_in(root, parent, &entry.name)?;
    display::note(format!("created branch {} from {parent}", entry.name));
    Ok(())
}

pub(crate) fn run_config_edit(
    ctx: &mut FlowContext,
    name: &str,
    changes: FieldChanges,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let mut entry = ctx
        .settings
        .topology
        .get(name)
        .cloned()
        .ok_or_else(|| FlowError::Configuration(format!("unknown branch type `{name}`")))?;
    changes.apply(&mut entry);

    let next = config::upsert_branch_type(ctx.root(), &ctx.settings.topology, entry.clone())?;
    ctx.settings.topology = next;
    print_outcome(&format!("Updated `{}`", entry.name), describe(&entry));
    Ok(())
}

pub(crate) fn run_config_rename(
    ctx: &mut FlowContext,
    old: &str,
    new: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let next = config::rename_branch_type(ctx.root(), &ctx.settings.topology, old, new.trim())?;
    let dependents: Vec<String> = next
        .entries()
        .iter()
        .filter(|entry| {
            entry.parent.as_deref() == Some(new) || entry.starting_point.as_deref() == Some(new)
        })
        .map(|entry| entry.name.clone())
        .collect();
    ctx.settings.topology = next;

    let mut rows = vec![row("From", old), row("To", new)];
    if !dependents.is_empty() {
        rows.push(row("Dependents", dependents.join(", ")));
    }
    print_outcome("Renamed branch type", rows);
    display::note("existing branches were not renamed");
    Ok(())
}

pub(crate) fn run_config_delete(
    ctx: &mut FlowContext,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let next = config::delete_branch_type(ctx.root(), &ctx.settings.topology, name)?;
    ctx.settings.topology = next;
    print_outcome("Deleted branch type", vec![row("Name", name)]);
    Ok(())
}

pub(crate) fn run_config_import(
    ctx: &mut FlowContext,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(file)
        .map_err(|err| FlowError::InvalidInput(format!("cannot read {}: {err}", file.display())))?;
    let document = config::import_toml(&raw)?;
    let remote = document
        .remote
        .clone()
        .unwrap_or_else(|| ctx.settings.remote.clone());

    config::replace_topology(ctx.root(), &ctx.settings.topology, &document.topology)?;
    config::mark_initialized(ctx.root(), &remote)?;
    ctx.reload()?;

    print_outcome(
        "Imported topology",
        vec![
            row("File", file.display().to_string()),
            row("Branch types", document.topology.entries().len().to_string()),
            row("Remote", remote),
        ],
    );
    Ok(())
}

pub(crate) fn run_config_export(ctx: &FlowContext) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    let rendered = config::export_toml(&ctx.settings.topology, Some(&ctx.settings.remote))?;
    print!("{rendered}");
    Ok(())
}
