mod config;
mod init;
mod overview;
pub(crate) mod shared;
mod topic;
mod update;

pub(crate) use config::{
    FieldChanges, run_config_add, run_config_delete, run_config_edit, run_config_export,
    run_config_import, run_config_list, run_config_rename,
};
pub(crate) use init::{InitOptions, run_init};
pub(crate) use overview::run_overview;
pub(crate) use topic::run_topic;
pub(crate) use update::{BaseUpdateMode, run_base_update};
