use std::path::Path;

use flow_kernel::topology::{BranchTypeConfig, Topology};
use flow_kernel::{FlowError, FlowResult};

use super::load::{
    KEY_AUTO_UPDATE, KEY_DOWNSTREAM, KEY_PARENT, KEY_PREFIX, KEY_START_POINT, KEY_TAG,
    KEY_TAG_PREFIX, KEY_TYPE, KEY_UPSTREAM, TYPE_KEYS, branch_key,
};
use crate::vcs::{self, ConfigScope};

const LOCAL: ConfigScope = ConfigScope::Local;

fn set(root: &Path, key: &str, value: &str) -> FlowResult<()> {
    vcs::set_config_in(root, &LOCAL, key, value)
        .map_err(|err| FlowError::tool(format!("write {key}"), err))
}

fn unset(root: &Path, key: &str) -> FlowResult<()> {
    vcs::unset_config_in(root, &LOCAL, key)
        .map_err(|err| FlowError::tool(format!("remove {key}"), err))
}

fn set_or_unset(root: &Path, key: &str, value: Option<&str>) -> FlowResult<()> {
    match value.filter(|value| !value.is_empty()) {
        Some(value) => set(root, key, value),
        None => unset(root, key),
    }
}

/// Write one branch type in place; keys that no longer apply are removed.
pub fn write_branch_type(root: &Path, entry: &BranchTypeConfig) -> FlowResult<()> {
    let name = entry.name.as_str();
    set(root, &branch_key(name, KEY_TYPE), entry.kind.as_str())?;
    set_or_unset(root, &branch_key(name, KEY_PARENT), entry.parent.as_deref())?;
    set_or_unset(root, &branch_key(name, KEY_PREFIX), Some(entry.prefix.as_str()))?;
    set(
        root,
        &branch_key(name, KEY_UPSTREAM),
        entry.upstream_strategy.as_str(),
    )?;
    set(
        root,
        &branch_key(name, KEY_DOWNSTREAM),
        entry.downstream_strategy.as_str(),
    )?;
    set(
        root,
        &branch_key(name, KEY_AUTO_UPDATE),
        if entry.auto_update { "true" } else { "false" },
    )?;
    if entry.creates_tag {
        set(root, &branch_key(name, KEY_TAG), "true")?;
    } else {
        unset(root, &branch_key(name, KEY_TAG))?;
    }
    set_or_unset(
        root,
        &branch_key(name, KEY_TAG_PREFIX),
        Some(entry.tag_prefix.as_str()),
    )?;
    set_or_unset(
        root,
        &branch_key(name, KEY_START_POINT),
        entry.starting_point.as_deref(),
    )
}

fn remove_branch_type(root: &Path, name: &str) -> FlowResult<()> {
    for key in TYPE_KEYS {
        unset(root, &branch_key(name, key))?;
    }
    Ok(())
}

/// Replace the stored topology with `next`, keeping `next`'s declaration order.
pub fn replace_topology(root: &Path, current: &Topology, next: &Topology) -> FlowResult<()> {
    for entry in current.entries() {
        remove_branch_type(root, &entry.name)?;
    }
    for entry in next.entries() {
        write_branch_type(root, entry)?;
    }
    Ok(())
}

/// Validate `entry` against `current`, then persist it.
pub fn upsert_branch_type(
    root: &Path,
    current: &Topology,
    entry: BranchTypeConfig,
) -> FlowResult<Topology> {
    let next = current.with_upsert(entry.clone())?;
    write_branch_type(root, &entry)?;
    Ok(next)
}

pub fn rename_branch_type(
    root: &Path,
    current: &Topology,
    old: &str,
    new: &str,
) -> FlowResult<Topology> {
    let next = current.renamed(old, new)?;
    replace_topology(root, current, &next)?;
    Ok(next)
}

pub fn delete_branch_type(root: &Path, current: &Topology, name: &str) -> FlowResult<Topology> {
    let next = current.without(name)?;
    remove_branch_type(root, name)?;
    Ok(next)
}

/// Record that the repository has a topology, and which remote to use.
pub fn mark_initialized(root: &Path, remote: &str) -> FlowResult<()> {
    set(root, "gitflow.initialized", "true")?;
    set(root, "gitflow.version", env!("CARGO_PKG_VERSION"))?;
    set(root, "gitflow.origin", remote)
}
