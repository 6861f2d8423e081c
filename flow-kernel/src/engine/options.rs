use serde::{Deserialize, Serialize};

use crate::topology::MergeStrategy;

/// Resolved finish behaviour. Persisted with the operation so a later `--continue` keeps the
/// keep/tag/sign choices made by the first invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinishOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MergeStrategy>,
    pub fast_forward: bool,
    pub preserve_merges: bool,
    pub force: bool,
    pub keep: bool,
    pub keep_local: bool,
    pub keep_remote: bool,
    pub force_delete: bool,
    pub no_tag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash_message: Option<String>,
    pub sign: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    pub no_verify: bool,
    pub fetch: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub push_options: Vec<String>,
}

impl FinishOptions {
    pub fn keeps_local(&self) -> bool {
        self.keep || self.keep_local
    }

    pub fn keeps_remote(&self) -> bool {
        self.keep || self.keep_remote
    }
}

/// Values a `--continue` invocation may override on the persisted operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContinueOverrides {
    pub squash_message: Option<String>,
    pub no_verify: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub base: Option<String>,
    pub fetch: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Strategy to use instead of the branch type's downstream strategy.
    pub strategy: Option<MergeStrategy>,
    pub no_verify: bool,
    pub preserve_merges: bool,
    pub interactive: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub force: bool,
    pub remote: bool,
}
