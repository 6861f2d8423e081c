//! `git flow init`: install a topology and make sure every base branch exists.

use std::path::Path;

use flow_kernel::topology::{BranchTypeConfig, Topology};
use flow_kernel::{FlowError, FlowResult};

use crate::config::{self, FlowSettings};
use crate::vcs;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created_branches: Vec<String>,
    pub existing_branches: Vec<String>,
    /// Set when an empty repository received its first commit.
    pub root_commit: Option<String>,
    pub replaced: bool,
}

/// Write `topology` into local git config and create missing base branches, parents first.
pub fn initialize(
    root: &Path,
    current: &FlowSettings,
    topology: &Topology,
    remote: &str,
    force: bool,
) -> FlowResult<InitReport> {
    if current.initialized && !force {
        return Err(FlowError::Configuration(
            "git-flow is already initialized; pass --force to replace the configuration"
                .to_string(),
        ));
    }
    let remote = remote.trim();
    if remote.is_empty() {
        return Err(FlowError::InvalidInput("remote name cannot be empty".to_string()));
    }

    let mut report = InitReport {
        replaced: current.initialized,
        ..InitReport::default()
    };
    config::replace_topology(root, &current.topology, topology)?;

    for entry in parents_first(topology) {
        ensure_base_branch(root, entry, &mut report)?;
    }

    config::mark_initialized(root, remote)?;
    Ok(report)
}

/// Base branches ordered so every parent precedes its children.
fn parents_first(topology: &Topology) -> Vec<&BranchTypeConfig> {
    let mut bases: Vec<&BranchTypeConfig> = topology.base_branches().collect();
    bases.sort_by_key(|entry| topology.ancestry(&entry.name).len());
    bases
}

fn ensure_base_branch(
    root: &Path,
    entry: &BranchTypeConfig,
    report: &mut InitReport,
) -> FlowResult<()> {
    let name = entry.name.as_str();
    let exists = vcs::branch_exists_in(root, name)
        .map_err(|err| FlowError::tool(format!("look up branch {name}"), err))?;
    if exists {
        report.existing_branches.push(name.to_string());
        return Ok(());
    }

    match entry.parent.as_deref() {
        Some(parent) => {
            vcs::create_branch_from_in(root, parent, name)
                .map_err(|err| FlowError::tool(format!("create {name} from {parent}"), err))?;
        }
        None => {
            let unborn = vcs::head_is_unborn_in(root)
                .map_err(|err| FlowError::tool("inspect HEAD", err))?;
            if unborn {
                vcs::create_root_commit_in(root, name).map_err(|err| {
                    FlowError::tool(format!("create initial commit on {name}"), err)
                })?;
                report.root_commit = Some(name.to_string());
            } else {
                vcs::create_branch_from_in(root, "HEAD", name)
                    .map_err(|err| FlowError::tool(format!("create {name} from HEAD"), err))?;
            }
        }
    }
    report.created_branches.push(name.to_string());
    Ok(())
}
