//! Branch topology and command defaults, stored in git config under `gitflow.*`.

mod defaults;
mod layers;
mod load;
mod transfer;
mod write;

pub use defaults::{DEFAULT_REMOTE, Preset};
pub use layers::{FinishLayer, resolve_finish_options};
pub use load::{FlowSettings, load_settings, load_topology};
pub use transfer::{TopologyDocument, export_toml, import_toml};
pub use write::{
    delete_branch_type, mark_initialized, rename_branch_type, replace_topology,
    upsert_branch_type, write_branch_type,
};
