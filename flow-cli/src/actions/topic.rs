use std::fs;

use colored::Colorize;
use flow_core::FlowContext;
use flow_core::config::{FinishLayer, resolve_finish_options};
use flow_core::display;
use flow_kernel::FlowError;
use flow_kernel::engine::{
    ContinueOverrides, DeleteOptions, FinishOptions, FinishReport, StartOptions, UpdateOptions,
};
use flow_kernel::topology::MergeStrategy;
use serde::Serialize;

use super::shared::{join_or_none, print_json, print_outcome, row};
use super::update::{print_abort, print_update};
use crate::cli::args::{FinishCmd, TopicAction, UpdateTuning};

pub(crate) fn run_topic(
    ctx: &FlowContext,
    branch_type: &str,
    action: TopicAction,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.settings.require_initialized()?;
    ctx.settings.topology.topic_type(branch_type)?;
    let engine = ctx.engine();

    match action {
        TopicAction::Start(cmd) => {
            let report = engine.start(
                branch_type,
                &cmd.name,
                StartOptions {
                    base: cmd.base,
                    fetch: cmd.fetch,
                },
            )?;
            print_outcome(
                &format!("Started {branch_type}"),
                vec![row("Branch", report.branch), row("Base", report.base)],
            );
        }
        TopicAction::Finish(cmd) => run_finish(ctx, branch_type, *cmd)?,
        TopicAction::Publish(cmd) => {
            let branch = engine.publish(branch_type, cmd.name.as_deref(), &cmd.push_option)?;
            print_outcome(
                "Published",
                vec![
                    row("Branch", branch.clone()),
                    row("Remote", format!("{}/{branch}", ctx.settings.remote)),
                ],
            );
        }
        TopicAction::Track(cmd) => {
            let branch = engine.track(branch_type, &cmd.name)?;
            print_outcome(
                "Tracking",
                vec![
                    row("Branch", branch.clone()),
                    row("Upstream", format!("{}/{branch}", ctx.settings.remote)),
                ],
            );
        }
        TopicAction::Delete(cmd) => {
            let branch = engine.delete(
                branch_type,
                cmd.name.as_deref(),
                DeleteOptions {
                    force: cmd.force,
                    remote: cmd.remote,
                },
            )?;
            let mut rows = vec![row("Branch", branch.clone())];
            if cmd.remote {
                rows.push(row("Remote", format!("{}/{branch}", ctx.settings.remote)));
            }
            print_outcome("Deleted", rows);
        }
        TopicAction::Checkout(cmd) => {
            let branch = engine.checkout(branch_type, &cmd.name)?;
            display::note(format!("Switched to branch {branch}"));
        }
        TopicAction::Rebase(cmd) => {
            let report =
                engine.rebase_topic(branch_type, cmd.name.as_deref(), update_options(&cmd.tuning))?;
            print_update("Rebased", &report);
        }
        TopicAction::Update(cmd) => {
            let report =
                engine.update_topic(branch_type, cmd.name.as_deref(), update_options(&cmd.tuning))?;
            print_update("Updated", &report);
        }
        TopicAction::Diff(cmd) => {
            let patch = engine.diff(branch_type, cmd.name.as_deref())?;
            print!("{patch}");
        }
        TopicAction::Pull(cmd) => {
            let report = engine.pull(branch_type, cmd.name.as_deref())?;
            print_update("Pulled", &report);
        }
        TopicAction::Rename(cmd) => {
            let branch = engine.rename(branch_type, &cmd.old, &cmd.new)?;
            print_outcome(
                "Renamed",
                vec![
                    row("From", cmd.old.clone()),
                    row("To", branch),
                ],
            );
        }
        TopicAction::List(cmd) => {
            let listed = engine.list(branch_type)?;
            if cmd.json {
                let rows: Vec<ListedJson<'_>> = listed
                    .iter()
                    .map(|branch| ListedJson {
                        name: &branch.full,
                        short: &branch.short,
                        stored_base: branch.stored_base.as_deref(),
                        current: branch.current,
                    })
                    .collect();
                return print_json(&rows);
            }
            if listed.is_empty() {
                display::note(format!("No {branch_type} branches exist."));
            }
            for branch in listed {
                if branch.current {
                    println!("{} {}", "*".green(), branch.short.green());
                } else {
                    println!("  {}", branch.short);
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListedJson<'a> {
    name: &'a str,
    short: &'a str,
    stored_base: Option<&'a str>,
    current: bool,
}

fn update_options(tuning: &UpdateTuning) -> UpdateOptions {
    UpdateOptions {
        strategy: None,
        no_verify: tuning.no_verify,
        preserve_merges: tuning.preserve_merges,
        interactive: tuning.interactive,
    }
}

fn run_finish(
    ctx: &FlowContext,
    branch_type: &str,
    cmd: FinishCmd,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ctx.engine();
    if cmd.abort {
        let report = engine.finish_abort(branch_type)?;
        print_abort(&report);
        return Ok(());
    }
    if cmd.continue_ {
        let report = engine.finish_continue(
            branch_type,
            cmd.name.as_deref(),
            ContinueOverrides {
                squash_message: cmd.squash_message.clone(),
                no_verify: cmd.no_verify,
            },
        )?;
        print_finish(&report);
        return Ok(());
    }

    let from_config = FinishLayer::from_git_config(ctx.root(), branch_type)?;
    let mut options =
        resolve_finish_options(FinishOptions::default(), &[from_config, flag_layer(&cmd)]);
    options.preserve_merges = cmd.preserve_merges;
    options.force = cmd.force;
    options.tag_name = cmd.tagname.clone();
    options.squash_message = cmd.squash_message.clone();
    options.push_options = cmd.push_option.clone();
    options.message = match cmd.messagefile.as_deref() {
        Some(path) => Some(fs::read_to_string(path).map_err(|err| {
            FlowError::InvalidInput(format!("cannot read {}: {err}", path.display()))
        })?),
        None => cmd.message.clone(),
    };

    display::debug(format!("finish options: {options:?}"));
    let report = engine.finish(branch_type, cmd.name.as_deref(), options)?;
    print_finish(&report);
    Ok(())
}

/// Settings the command line states explicitly; absent flags defer to git config.
fn flag_layer(cmd: &FinishCmd) -> FinishLayer {
    let when = |flag: bool| flag.then_some(true);
    let strategy = if cmd.squash {
        Some(MergeStrategy::Squash)
    } else if cmd.rebase {
        Some(MergeStrategy::Rebase)
    } else {
        None
    };
    let fast_forward = if cmd.ff {
        Some(true)
    } else if cmd.no_ff {
        Some(false)
    } else {
        None
    };

    FinishLayer {
        strategy,
        fast_forward,
        keep: when(cmd.keep),
        keep_local: when(cmd.keeplocal),
        keep_remote: when(cmd.keepremote),
        force_delete: when(cmd.force_delete),
        no_tag: when(cmd.notag),
        sign: when(cmd.sign || cmd.signingkey.is_some()),
        signing_key: cmd.signingkey.clone(),
        no_verify: when(cmd.no_verify),
        fetch: when(cmd.fetch),
    }
}

fn print_finish(report: &FinishReport) {
    let mut rows = vec![
        row("Branch", report.branch.clone()),
        row("Merged into", report.target.clone()),
        row("Strategy", report.strategy.as_str()),
    ];
    if let Some(tag) = report.tag.as_deref() {
        rows.push(row("Tag", tag));
    }
    rows.push(row("Cascaded", join_or_none(&report.updated_children)));

    let mut deleted = Vec::new();
    if report.deleted_local {
        deleted.push("local".to_string());
    }
    if report.deleted_remote {
        deleted.push("remote".to_string());
    }
    rows.push(row("Deleted", join_or_none(&deleted)));
    print_outcome("Finished", rows);
}
