use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::FinishOptions;
use crate::topology::{CascadeEntry, MergeStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationAction {
    Start,
    Finish,
    Update,
}

impl OperationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationAction::Start => "start",
            OperationAction::Finish => "finish",
            OperationAction::Update => "update",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Merge,
    Tag,
    UpdateChildren,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Merge => "merge",
            Step::Tag => "tag",
            Step::UpdateChildren => "update_children",
        }
    }
}

/// Durable record of a finish or update that has not completed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperationState {
    pub action: OperationAction,
    pub branch_type: String,
    pub branch_name: String,
    pub full_branch_name: String,
    #[serde(default)]
    pub parent_branch: String,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash_message: Option<String>,
    #[serde(default)]
    pub no_verify: bool,
    #[serde(default)]
    pub current_step: Step,
    #[serde(default)]
    pub child_branches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_child_branch: Option<String>,
    #[serde(default)]
    pub updated_branches: Vec<String>,
    #[serde(default)]
    pub child_strategies: BTreeMap<String, MergeStrategy>,
    #[serde(default)]
    pub child_parents: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_options: Option<FinishOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl MergeOperationState {
    pub fn new(
        action: OperationAction,
        branch_type: &str,
        branch_name: &str,
        full_branch_name: &str,
        parent_branch: &str,
        merge_strategy: MergeStrategy,
    ) -> Self {
        Self {
            action,
            branch_type: branch_type.to_string(),
            branch_name: branch_name.to_string(),
            full_branch_name: full_branch_name.to_string(),
            parent_branch: parent_branch.to_string(),
            merge_strategy,
            squash_message: None,
            no_verify: false,
            current_step: Step::Merge,
            child_branches: Vec::new(),
            current_child_branch: None,
            updated_branches: Vec::new(),
            child_strategies: BTreeMap::new(),
            child_parents: BTreeMap::new(),
            original_branch: None,
            finish_options: None,
            tag_name: None,
            tag_message: None,
            started_at: None,
        }
    }

    /// Record the cascade plan. Existing progress is kept so a replay never re-applies a child.
    pub fn plan_children(&mut self, cascade: &[CascadeEntry]) {
        self.child_branches = cascade.iter().map(|entry| entry.branch.clone()).collect();
        self.child_strategies = cascade
            .iter()
            .map(|entry| (entry.branch.clone(), entry.strategy))
            .collect();
        self.child_parents = cascade
            .iter()
            .map(|entry| (entry.branch.clone(), entry.parent.clone()))
            .collect();
        self.updated_branches
            .retain(|branch| self.child_branches.contains(branch));
    }

    pub fn pending_children(&self) -> Vec<String> {
        self.child_branches
            .iter()
            .filter(|branch| !self.updated_branches.contains(branch))
            .cloned()
            .collect()
    }

    pub fn mark_child_updated(&mut self, branch: &str) {
        if !self.updated_branches.iter().any(|done| done == branch) {
            self.updated_branches.push(branch.to_string());
        }
        if self.current_child_branch.as_deref() == Some(branch) {
            self.current_child_branch = None;
        }
    }

    /// Strategy for a cascaded child. Older records without the map fall back to the
    /// operation's own strategy.
    pub fn child_strategy(&self, branch: &str) -> MergeStrategy {
        self.child_strategies
            .get(branch)
            .copied()
            .unwrap_or(self.merge_strategy)
    }

    /// Branch a cascaded child is updated from; older records without the map use the
    /// operation's merge target.
    pub fn child_parent(&self, branch: &str) -> String {
        self.child_parents
            .get(branch)
            .cloned()
            .unwrap_or_else(|| self.merge_target().to_string())
    }

    /// Branch whose descendants the cascade starts from.
    pub fn merge_target(&self) -> &str {
        match self.action {
            OperationAction::Finish => &self.parent_branch,
            OperationAction::Start | OperationAction::Update => &self.full_branch_name,
        }
    }

    /// Command that resumes this operation.
    pub fn resume_command(&self) -> String {
        match self.action {
            OperationAction::Finish => format!("git flow {} finish --continue", self.branch_type),
            OperationAction::Update | OperationAction::Start => {
                "git flow update --continue".to_string()
            }
        }
    }

    pub fn abort_command(&self) -> String {
        match self.action {
            OperationAction::Finish => format!("git flow {} finish --abort", self.branch_type),
            OperationAction::Update | OperationAction::Start => {
                "git flow update --abort".to_string()
            }
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} of `{}` (step: {})",
            self.action.as_str(),
            self.full_branch_name,
            self.current_step.label()
        )
    }
}
