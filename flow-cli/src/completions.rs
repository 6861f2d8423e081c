use std::io::{self, Write};

use clap::Command;
use clap::builder::StyledStr;
use clap_complete::CompleteEnv;
use clap_complete::Shell;
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use clap_complete::env::Shells;
use flow_core::FlowContext;
use flow_kernel::topology::BranchTypeConfig;

/// Environment variable the generated shell scripts set when asking for candidates.
const COMPLETE_VAR: &str = "COMPLETE";

/// Answer a completion request if the shell issued one; `Ok(false)` means run normally.
pub fn try_handle_completion(factory: impl Fn() -> Command) -> clap::error::Result<bool> {
    let cwd = std::env::current_dir().ok();
    CompleteEnv::with_factory(factory)
        .var(COMPLETE_VAR)
        .try_complete(std::env::args_os(), cwd.as_deref())
}

/// Print the script that registers `git-flow` completions with `shell`.
pub fn write_registration(
    shell: Shell,
    factory: impl Fn() -> Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut command = factory();
    command.build();

    let shell_name = shell.to_string();
    let shells = Shells::builtins();
    let Some(script) = shells.completer(&shell_name) else {
        return Err(format!("completions are not available for {shell_name}").into());
    };

    let name = command.get_name().to_string();
    let bin = command.get_bin_name().unwrap_or(&name).to_string();
    let program = std::env::args().next().unwrap_or_else(|| bin.clone());

    let mut out = io::stdout().lock();
    script.write_registration(COMPLETE_VAR, &name, &bin, &program, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Branch types configured in the repository under the current directory.
fn configured_types() -> Vec<BranchTypeConfig> {
    let Ok(cwd) = std::env::current_dir() else {
        return Vec::new();
    };
    FlowContext::open(&cwd)
        .map(|ctx| ctx.settings.topology.entries().to_vec())
        .unwrap_or_default()
}

fn candidate_for(entry: BranchTypeConfig) -> CompletionCandidate {
    let summary = match entry.parent.as_deref() {
        Some(parent) if entry.is_topic() => format!("topic `{}*` into {parent}", entry.prefix),
        Some(parent) => format!("base branch from {parent}"),
        None => "root branch".to_string(),
    };
    CompletionCandidate::new(entry.name).help(Some(StyledStr::from(summary)))
}

pub fn branch_type_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|current: &std::ffi::OsStr| {
        let prefix = current.to_string_lossy().to_string();
        configured_types()
            .into_iter()
            .filter(|entry| entry.name.starts_with(prefix.as_str()))
            .map(candidate_for)
            .collect()
    })
}

pub fn base_branch_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|current: &std::ffi::OsStr| {
        let prefix = current.to_string_lossy().to_string();
        configured_types()
            .into_iter()
            .filter(|entry| entry.is_base() && entry.name.starts_with(prefix.as_str()))
            .map(candidate_for)
            .collect()
    })
}
