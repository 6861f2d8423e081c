use std::path::Path;

use flow_kernel::FlowResult;
use flow_kernel::engine::FinishOptions;
use flow_kernel::topology::MergeStrategy;

use super::load::{read_bool, read_value};

/// Finish settings from one source. Unset fields leave earlier layers untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinishLayer {
    pub strategy: Option<MergeStrategy>,
    pub fast_forward: Option<bool>,
    pub keep: Option<bool>,
    pub keep_local: Option<bool>,
    pub keep_remote: Option<bool>,
    pub force_delete: Option<bool>,
    pub no_tag: Option<bool>,
    pub sign: Option<bool>,
    pub signing_key: Option<String>,
    pub no_verify: Option<bool>,
    pub fetch: Option<bool>,
}

impl FinishLayer {
    pub fn apply_to(&self, options: &mut FinishOptions) {
        if let Some(strategy) = self.strategy {
            options.strategy = Some(strategy);
        }
        if let Some(fast_forward) = self.fast_forward {
            options.fast_forward = fast_forward;
        }
        if let Some(keep) = self.keep {
            options.keep = keep;
        }
        if let Some(keep_local) = self.keep_local {
            options.keep_local = keep_local;
        }
        if let Some(keep_remote) = self.keep_remote {
            options.keep_remote = keep_remote;
        }
        if let Some(force_delete) = self.force_delete {
            options.force_delete = force_delete;
        }
        if let Some(no_tag) = self.no_tag {
            options.no_tag = no_tag;
        }
        if let Some(sign) = self.sign {
            options.sign = sign;
        }
        if let Some(key) = &self.signing_key {
            options.signing_key = Some(key.clone());
        }
        if let Some(no_verify) = self.no_verify {
            options.no_verify = no_verify;
        }
        if let Some(fetch) = self.fetch {
            options.fetch = fetch;
        }
    }

    /// Defaults for `<branch_type> finish` from `gitflow.<branch_type>.finish.*`.
    pub fn from_git_config(root: &Path, branch_type: &str) -> FlowResult<Self> {
        let key = |name: &str| format!("gitflow.{branch_type}.finish.{name}");

        let strategy = if read_bool(root, &key("squash"))?.unwrap_or(false) {
            Some(MergeStrategy::Squash)
        } else if read_bool(root, &key("rebase"))?.unwrap_or(false) {
            Some(MergeStrategy::Rebase)
        } else {
            None
        };
        let fast_forward = match read_bool(root, &key("no-ff"))? {
            Some(true) => Some(false),
            _ => read_bool(root, &key("ff"))?,
        };

        Ok(Self {
            strategy,
            fast_forward,
            keep: read_bool(root, &key("keep"))?,
            keep_local: read_bool(root, &key("keeplocal"))?,
            keep_remote: read_bool(root, &key("keepremote"))?,
            force_delete: read_bool(root, &key("forcedelete"))?,
            no_tag: read_bool(root, &key("notag"))?,
            sign: read_bool(root, &key("sign"))?,
            signing_key: read_value(root, &key("signingkey"))?
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            no_verify: read_bool(root, &key("no-verify"))?,
            fetch: read_bool(root, &key("fetch"))?,
        })
    }
}

/// Layers applied in order, later ones winning.
pub fn resolve_finish_options(base: FinishOptions, layers: &[FinishLayer]) -> FinishOptions {
    let mut options = base;
    for layer in layers {
        layer.apply_to(&mut options);
    }
    options
}
