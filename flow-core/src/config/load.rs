use std::collections::HashMap;
use std::path::Path;

use flow_kernel::topology::{BranchKind, BranchTypeConfig, MergeStrategy, Topology};
use flow_kernel::{FlowError, FlowResult};

use super::defaults::DEFAULT_REMOTE;
use crate::vcs::{self, ConfigScope, parse_config_bool};

pub(crate) const BRANCH_SECTION: &str = "gitflow.branch";
pub(crate) const KEY_TYPE: &str = "type";
pub(crate) const KEY_PARENT: &str = "parent";
pub(crate) const KEY_PREFIX: &str = "prefix";
pub(crate) const KEY_UPSTREAM: &str = "upstreamstrategy";
pub(crate) const KEY_DOWNSTREAM: &str = "downstreamstrategy";
pub(crate) const KEY_AUTO_UPDATE: &str = "autoupdate";
pub(crate) const KEY_TAG: &str = "tag";
pub(crate) const KEY_TAG_PREFIX: &str = "tagprefix";
pub(crate) const KEY_START_POINT: &str = "startpoint";

pub(crate) const TYPE_KEYS: &[&str] = &[
    KEY_TYPE,
    KEY_PARENT,
    KEY_PREFIX,
    KEY_UPSTREAM,
    KEY_DOWNSTREAM,
    KEY_AUTO_UPDATE,
    KEY_TAG,
    KEY_TAG_PREFIX,
    KEY_START_POINT,
];

pub(crate) fn branch_key(name: &str, key: &str) -> String {
    format!("{BRANCH_SECTION}.{name}.{key}")
}

/// Everything an invocation needs from git config.
#[derive(Clone, Debug)]
pub struct FlowSettings {
    pub topology: Topology,
    pub remote: String,
    pub initialized: bool,
}

impl FlowSettings {
    /// Fail unless `init` has written a usable topology.
    pub fn require_initialized(&self) -> FlowResult<()> {
        if !self.initialized || self.topology.is_empty() {
            return Err(FlowError::Configuration(
                "git-flow is not initialized in this repository; run `git flow init`".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn read_value(root: &Path, key: &str) -> FlowResult<Option<String>> {
    vcs::get_config_in(root, &ConfigScope::Merged, key)
        .map_err(|err| FlowError::tool(format!("read {key}"), err))
}

pub(crate) fn read_bool(root: &Path, key: &str) -> FlowResult<Option<bool>> {
    match read_value(root, key)? {
        None => Ok(None),
        Some(raw) => parse_config_bool(&raw).map(Some).ok_or_else(|| {
            FlowError::Configuration(format!("`{key}` must be a boolean, found `{raw}`"))
        }),
    }
}

pub fn load_settings(root: &Path) -> FlowResult<FlowSettings> {
    let topology = load_topology(root)?;
    let remote = read_value(root, "gitflow.origin")?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let initialized = read_bool(root, "gitflow.initialized")?.unwrap_or(false);
    Ok(FlowSettings {
        topology,
        remote,
        initialized,
    })
}

/// Branch types in the order their first key appears in git config. Subsections without a
/// `type` key (stored bases of topic branches) are not branch types.
pub fn load_topology(root: &Path) -> FlowResult<Topology> {
    let raw = vcs::config_entries_in(root, &ConfigScope::Merged, BRANCH_SECTION)
        .map_err(|err| FlowError::tool("read gitflow.branch configuration", err))?;

    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, HashMap<String, String>> = HashMap::new();
    let prefix = format!("{BRANCH_SECTION}.");
    for (key, value) in raw {
        let Some((name, var)) = key
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.rsplit_once('.'))
        else {
            continue;
        };
        if !values.contains_key(name) {
            order.push(name.to_string());
        }
        values
            .entry(name.to_string())
            .or_default()
            .insert(var.to_ascii_lowercase(), value);
    }

    let mut entries = Vec::new();
    for name in order {
        let Some(vars) = values.get(&name) else {
            continue;
        };
        if let Some(entry) = parse_entry(&name, vars)? {
            entries.push(entry);
        }
    }
    Topology::new(entries)
}

fn parse_entry(
    name: &str,
    vars: &HashMap<String, String>,
) -> FlowResult<Option<BranchTypeConfig>> {
    let Some(kind_raw) = vars.get(KEY_TYPE) else {
        return Ok(None);
    };
    let kind = BranchKind::parse(kind_raw).ok_or_else(|| {
        FlowError::Configuration(format!(
            "`{}` must be `base` or `topic`, found `{kind_raw}`",
            branch_key(name, KEY_TYPE)
        ))
    })?;

    let text = |key: &str| {
        vars.get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let strategy = |key: &str| -> FlowResult<Option<MergeStrategy>> {
        match vars.get(key) {
            None => Ok(None),
            Some(raw) => MergeStrategy::parse(raw).map(Some).ok_or_else(|| {
                FlowError::Configuration(format!(
                    "`{}` has unknown merge strategy `{raw}`",
                    branch_key(name, key)
                ))
            }),
        }
    };
    let flag = |key: &str| -> FlowResult<bool> {
        match vars.get(key) {
            None => Ok(false),
            Some(raw) => parse_config_bool(raw).ok_or_else(|| {
                FlowError::Configuration(format!(
                    "`{}` must be a boolean, found `{raw}`",
                    branch_key(name, key)
                ))
            }),
        }
    };

    let mut entry = match kind {
        BranchKind::Base => BranchTypeConfig::base(name, None),
        BranchKind::Topic => BranchTypeConfig::topic(name, "", ""),
    };
    entry.parent = text(KEY_PARENT);
    entry.prefix = text(KEY_PREFIX).unwrap_or_default();
    if let Some(upstream) = strategy(KEY_UPSTREAM)? {
        entry.upstream_strategy = upstream;
    }
    if let Some(downstream) = strategy(KEY_DOWNSTREAM)? {
        entry.downstream_strategy = downstream;
    }
    entry.auto_update = flag(KEY_AUTO_UPDATE)?;
    entry.creates_tag = flag(KEY_TAG)?;
    entry.tag_prefix = text(KEY_TAG_PREFIX).unwrap_or_default();
    entry.starting_point = text(KEY_START_POINT);
    Ok(Some(entry))
}
