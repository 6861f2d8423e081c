use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Base,
    Topic,
}

impl BranchKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "base" => Some(Self::Base),
            "topic" => Some(Self::Topic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::Base => "base",
            BranchKind::Topic => "topic",
        }
    }
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BranchKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown branch kind `{value}`"))
    }
}

/// How one branch is integrated into another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Merge,
    Rebase,
    Squash,
    None,
}

impl MergeStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Some(Self::Merge),
            "rebase" => Some(Self::Rebase),
            "squash" => Some(Self::Squash),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Merge => "merge",
            MergeStrategy::Rebase => "rebase",
            MergeStrategy::Squash => "squash",
            MergeStrategy::None => "none",
        }
    }

    pub fn integrates(&self) -> bool {
        !matches!(self, MergeStrategy::None)
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown merge strategy `{value}`"))
    }
}

/// One configured branch type: either a long-lived base branch or a topic category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTypeConfig {
    pub name: String,
    pub kind: BranchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default)]
    pub upstream_strategy: MergeStrategy,
    #[serde(default)]
    pub downstream_strategy: MergeStrategy,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default)]
    pub creates_tag: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_point: Option<String>,
}

impl BranchTypeConfig {
    pub fn base(name: &str, parent: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind: BranchKind::Base,
            parent: parent.map(str::to_string),
            prefix: String::new(),
            upstream_strategy: MergeStrategy::None,
            downstream_strategy: MergeStrategy::None,
            auto_update: false,
            creates_tag: false,
            tag_prefix: String::new(),
            starting_point: None,
        }
    }

    pub fn topic(name: &str, parent: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: BranchKind::Topic,
            parent: Some(parent.to_string()),
            prefix: prefix.to_string(),
            upstream_strategy: MergeStrategy::Merge,
            downstream_strategy: MergeStrategy::Rebase,
            auto_update: false,
            creates_tag: false,
            tag_prefix: String::new(),
            starting_point: None,
        }
    }

    pub fn with_strategies(mut self, upstream: MergeStrategy, downstream: MergeStrategy) -> Self {
        self.upstream_strategy = upstream;
        self.downstream_strategy = downstream;
        self
    }

    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.auto_update = enabled;
        self
    }

    pub fn with_tag(mut self, tag_prefix: &str) -> Self {
        self.creates_tag = true;
        self.tag_prefix = tag_prefix.to_string();
        self
    }

    pub fn with_starting_point(mut self, start: &str) -> Self {
        self.starting_point = Some(start.to_string());
        self
    }

    pub fn is_base(&self) -> bool {
        self.kind == BranchKind::Base
    }

    pub fn is_topic(&self) -> bool {
        self.kind == BranchKind::Topic
    }

    /// Full branch name for a topic instance; short names that already carry the prefix are
    /// returned unchanged.
    pub fn full_name(&self, short: &str) -> String {
        if self.is_base() || short.starts_with(&self.prefix) {
            short.to_string()
        } else {
            format!("{}{}", self.prefix, short)
        }
    }

    pub fn short_name<'a>(&self, full: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return full;
        }
        full.strip_prefix(self.prefix.as_str()).unwrap_or(full)
    }

    pub fn matches_branch(&self, branch: &str) -> bool {
        self.is_topic()
            && !self.prefix.is_empty()
            && branch.len() > self.prefix.len()
            && branch.starts_with(&self.prefix)
    }
}

/// A base branch scheduled for a downstream update, paired with the branch it is updated from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeEntry {
    pub branch: String,
    pub parent: String,
    pub strategy: MergeStrategy,
}

/// Immutable snapshot of the configured branch hierarchy.
///
/// Entries keep their declaration order; every traversal that produces an ordered result
/// derives that order from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    entries: Vec<BranchTypeConfig>,
    index: HashMap<String, usize>,
}

impl Topology {
    pub fn new(entries: Vec<BranchTypeConfig>) -> Result<Self, FlowError> {
        let mut index = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(FlowError::Configuration(
                    "branch type names cannot be empty".to_string(),
                ));
            }
            if index.insert(name.to_string(), idx).is_some() {
                return Err(FlowError::Configuration(format!(
                    "branch type `{name}` is configured more than once"
                )));
            }
        }

        let topology = Self { entries, index };
        topology.validate()?;
        Ok(topology)
    }

    fn validate(&self) -> Result<(), FlowError> {
        let mut roots = Vec::new();
        let mut prefixes: HashMap<&str, &str> = HashMap::new();

        for entry in &self.entries {
            match (&entry.kind, entry.parent.as_deref()) {
                (BranchKind::Base, None) => roots.push(entry.name.as_str()),
                (BranchKind::Base, Some(parent)) => {
                    self.require_base_parent(&entry.name, parent)?;
                }
                (BranchKind::Topic, None) => {
                    return Err(FlowError::Configuration(format!(
                        "topic type `{}` must name a base branch as its parent",
                        entry.name
                    )));
                }
                (BranchKind::Topic, Some(parent)) => {
                    self.require_base_parent(&entry.name, parent)?;
                    if entry.prefix.trim().is_empty() {
                        return Err(FlowError::Configuration(format!(
                            "topic type `{}` needs a non-empty branch prefix",
                            entry.name
                        )));
                    }
                    if let Some(existing) = prefixes.insert(entry.prefix.as_str(), &entry.name) {
                        return Err(FlowError::Configuration(format!(
                            "topic types `{existing}` and `{}` share the prefix `{}`",
                            entry.name, entry.prefix
                        )));
                    }
                }
            }
        }

        let has_bases = self.entries.iter().any(BranchTypeConfig::is_base);
        if has_bases && roots.len() != 1 {
            return Err(FlowError::Configuration(if roots.is_empty() {
                "base branches must form a tree with exactly one root; none has an empty parent"
                    .to_string()
            } else {
                format!(
                    "base branches must form a tree with exactly one root; found {}",
                    roots.join(", ")
                )
            }));
        }

        for entry in self.entries.iter().filter(|entry| entry.is_base()) {
            self.ensure_acyclic(&entry.name)?;
        }

        Ok(())
    }

    fn require_base_parent(&self, name: &str, parent: &str) -> Result<(), FlowError> {
        match self.get(parent) {
            None => Err(FlowError::Configuration(format!(
                "`{name}` names unknown parent branch `{parent}`"
            ))),
            Some(found) if !found.is_base() => Err(FlowError::Configuration(format!(
                "`{name}` names `{parent}` as parent, but `{parent}` is a topic type"
            ))),
            Some(_) => Ok(()),
        }
    }

    fn ensure_acyclic(&self, start: &str) -> Result<(), FlowError> {
        let mut seen = HashSet::new();
        let mut chain = vec![start.to_string()];
        let mut current = start;
        seen.insert(start);

        while let Some(parent) = self.get(current).and_then(|entry| entry.parent.as_deref()) {
            chain.push(parent.to_string());
            if !seen.insert(parent) {
                return Err(FlowError::Configuration(format!(
                    "base branch parents form a cycle: {}",
                    chain.join(" -> ")
                )));
            }
            current = parent;
        }

        Ok(())
    }

    pub fn entries(&self) -> &[BranchTypeConfig] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BranchTypeConfig> {
        self.index.get(name).map(|idx| &self.entries[*idx])
    }

    pub fn root(&self) -> Option<&BranchTypeConfig> {
        self.entries
            .iter()
            .find(|entry| entry.is_base() && entry.parent.is_none())
    }

    pub fn base_branches(&self) -> impl Iterator<Item = &BranchTypeConfig> {
        self.entries.iter().filter(|entry| entry.is_base())
    }

    pub fn topic_types(&self) -> impl Iterator<Item = &BranchTypeConfig> {
        self.entries.iter().filter(|entry| entry.is_topic())
    }

    pub fn topic_type(&self, name: &str) -> Result<&BranchTypeConfig, FlowError> {
        match self.get(name) {
            Some(entry) if entry.is_topic() => Ok(entry),
            Some(_) => Err(FlowError::Configuration(format!(
                "`{name}` is a base branch, not a topic type"
            ))),
            None => Err(FlowError::Configuration(format!(
                "unknown branch type `{name}`"
            ))),
        }
    }

    pub fn base_branch(&self, name: &str) -> Result<&BranchTypeConfig, FlowError> {
        match self.get(name) {
            Some(entry) if entry.is_base() => Ok(entry),
            Some(_) => Err(FlowError::Configuration(format!(
                "`{name}` is a topic type, not a base branch"
            ))),
            None => Err(FlowError::Configuration(format!(
                "unknown base branch `{name}`"
            ))),
        }
    }

    /// Direct base-branch children of `base`, in declaration order.
    pub fn children_of(&self, base: &str) -> Vec<&BranchTypeConfig> {
        self.entries
            .iter()
            .filter(|entry| entry.is_base() && entry.parent.as_deref() == Some(base))
            .collect()
    }

    /// The base branch a topic type currently finishes into. Stored bases recorded when a
    /// branch was started never influence this.
    pub fn resolve_merge_target(&self, topic_type: &str) -> Result<&str, FlowError> {
        let entry = self.topic_type(topic_type)?;
        entry.parent.as_deref().ok_or_else(|| {
            FlowError::Configuration(format!("topic type `{topic_type}` has no parent"))
        })
    }

    /// Auto-updating descendants of `from_base`, depth-first with siblings in declaration
    /// order. A branch with auto-update disabled is left out but its own descendants are still
    /// considered; they are updated from the nearest ancestor that did receive the change.
    pub fn cascade_set(&self, from_base: &str) -> Result<Vec<CascadeEntry>, FlowError> {
        self.base_branch(from_base)?;
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(from_base.to_string());
        self.collect_cascade(from_base, from_base, &mut visited, &mut out);
        Ok(out)
    }

    fn collect_cascade(
        &self,
        base: &str,
        source: &str,
        visited: &mut HashSet<String>,
        out: &mut Vec<CascadeEntry>,
    ) {
        for child in self.children_of(base) {
            if !visited.insert(child.name.clone()) {
                continue;
            }
            let next_source = if child.auto_update {
                out.push(CascadeEntry {
                    branch: child.name.clone(),
                    parent: source.to_string(),
                    strategy: child.downstream_strategy,
                });
                child.name.as_str()
            } else {
                source
            };
            self.collect_cascade(&child.name, next_source, visited, out);
        }
    }

    /// Topic type whose prefix matches `branch`; the longest prefix wins.
    pub fn topic_type_for_branch(&self, branch: &str) -> Option<&BranchTypeConfig> {
        self.topic_types()
            .filter(|entry| entry.matches_branch(branch))
            .max_by_key(|entry| entry.prefix.len())
    }

    /// Chain of base branches from `base` up to the root, `base` first.
    pub fn ancestry(&self, base: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.get(base);
        while let Some(entry) = current {
            chain.push(entry.name.as_str());
            current = entry.parent.as_deref().and_then(|parent| self.get(parent));
        }
        chain
    }

    /// Topology with `entry` added, or replacing the entry of the same name.
    pub fn with_upsert(&self, entry: BranchTypeConfig) -> Result<Topology, FlowError> {
        let mut entries = self.entries.clone();
        match self.index.get(&entry.name) {
            Some(idx) => entries[*idx] = entry,
            None => entries.push(entry),
        }
        Topology::new(entries)
    }

    pub fn without(&self, name: &str) -> Result<Topology, FlowError> {
        if self.get(name).is_none() {
            return Err(FlowError::Configuration(format!(
                "unknown branch type `{name}`"
            )));
        }
        let dependents: Vec<&str> = self
            .entries
            .iter()
            .filter(|entry| entry.parent.as_deref() == Some(name))
            .map(|entry| entry.name.as_str())
            .collect();
        if !dependents.is_empty() {
            return Err(FlowError::Configuration(format!(
                "cannot remove `{name}`; it is the parent of {}",
                dependents.join(", ")
            )));
        }
        Topology::new(
            self.entries
                .iter()
                .filter(|entry| entry.name != name)
                .cloned()
                .collect(),
        )
    }

    pub fn renamed(&self, old: &str, new: &str) -> Result<Topology, FlowError> {
        if self.get(old).is_none() {
            return Err(FlowError::Configuration(format!(
                "unknown branch type `{old}`"
            )));
        }
        if self.get(new).is_some() {
            return Err(FlowError::Configuration(format!(
                "branch type `{new}` already exists"
            )));
        }
        let entries = self
            .entries
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.name == old {
                    entry.name = new.to_string();
                }
                if entry.parent.as_deref() == Some(old) {
                    entry.parent = Some(new.to_string());
                }
                if entry.starting_point.as_deref() == Some(old) {
                    entry.starting_point = Some(new.to_string());
                }
                entry
            })
            .collect();
        Topology::new(entries)
    }
}
