use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ColorChoice, CommandFactory, FromArgMatches, error::ErrorKind};
use flow_core::FlowContext;
use flow_core::display;
use flow_kernel::FlowError;
use flow_kernel::engine::UpdateOptions;

use crate::actions::shared::explain_pause;
use crate::actions::*;
use crate::cli::args::*;
use crate::errors::ReportedError;

pub(crate) fn run() -> Result<(), Box<dyn std::error::Error>> {
    if crate::completions::try_handle_completion(Cli::command)
        .map_err(Box::<dyn std::error::Error>::from)?
    {
        return Ok(());
    }

    let raw_args: Vec<OsString> = std::env::args_os().collect();
    let no_ansi_requested = raw_args.iter().any(|arg| arg == "--no-ansi");
    let color_choice = color_choice(no_ansi_requested);

    let matches = match Cli::command().color(color_choice).try_get_matches_from(&raw_args) {
        Ok(matches) => matches,
        Err(err) => return handle_parse_error(err),
    };
    let cli = Cli::from_arg_matches(&matches)?;

    match cli.command {
        Commands::Topic(args) => run_topic_command(&cli.global, args, color_choice),
        command => {
            configure_display(&cli.global);
            run_command(&cli.global, command)
        }
    }
}

fn color_choice(no_ansi: bool) -> ColorChoice {
    if !no_ansi && std::io::stdout().is_terminal() && std::io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Help and version requests succeed; anything else is a usage error.
fn handle_parse_error(err: clap::Error) -> Result<(), Box<dyn std::error::Error>> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            err.print()?;
            Ok(())
        }
        _ => {
            err.print()?;
            let code = FlowError::InvalidInput(String::new()).exit_code();
            Err(Box::new(ReportedError::new(code)))
        }
    }
}

fn configure_display(global: &GlobalOpts) {
    let verbosity = if global.quiet {
        display::Verbosity::Quiet
    } else {
        match global.verbose {
            0 => display::Verbosity::Normal,
            1 => display::Verbosity::Info,
            _ => display::Verbosity::Debug,
        }
    };

    display::set_display_config(display::DisplayConfig {
        verbosity,
        stdout_is_tty: std::io::stdout().is_terminal() && !global.no_ansi,
        stderr_is_tty: std::io::stderr().is_terminal() && !global.no_ansi,
    });
}

fn open_context(global: &GlobalOpts) -> Result<FlowContext, Box<dyn std::error::Error>> {
    let start = match global.directory.as_ref() {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    display::debug(format!("opening repository at {}", start.display()));
    Ok(FlowContext::open(&start)?)
}

/// Run an action, turning a conflict pause into resume instructions.
fn with_pause_report(
    ctx: &FlowContext,
    result: Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    result.map_err(|err| explain_pause(ctx, err))
}

fn run_command(global: &GlobalOpts, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Completions(cmd) => {
            crate::completions::write_registration(cmd.shell.into(), Cli::command)
        }
        Commands::Init(cmd) => {
            let mut ctx = open_context(global)?;
            if cmd.defaults {
                display::debug("--defaults is implied; presets never prompt");
            }
            run_init(
                &mut ctx,
                InitOptions {
                    preset: cmd.preset.into(),
                    force: cmd.force,
                    origin: cmd.origin,
                },
            )
        }
        Commands::Config(cmd) => {
            let mut ctx = open_context(global)?;
            run_config_action(&mut ctx, cmd.action)
        }
        Commands::Overview(cmd) => {
            let ctx = open_context(global)?;
            run_overview(&ctx, cmd.json)
        }
        Commands::Update(cmd) => {
            let ctx = open_context(global)?;
            let mode = if cmd.abort {
                BaseUpdateMode::Abort
            } else if cmd.continue_ {
                BaseUpdateMode::Continue
            } else {
                BaseUpdateMode::Start(cmd.base)
            };
            let options = UpdateOptions {
                strategy: None,
                no_verify: cmd.tuning.no_verify,
                preserve_merges: cmd.tuning.preserve_merges,
                interactive: cmd.tuning.interactive,
            };
            let result = run_base_update(&ctx, mode, options);
            with_pause_report(&ctx, result)
        }
        Commands::Topic(args) => Err(FlowError::InvalidInput(format!(
            "unexpected topic invocation: {}",
            args.join(" ")
        ))
        .into()),
    }
}

fn field_changes(fields: BranchTypeFields, parent: Option<String>) -> FieldChanges {
    FieldChanges {
        parent,
        prefix: fields.prefix,
        upstream_strategy: fields.upstream_strategy.map(Into::into),
        downstream_strategy: fields.downstream_strategy.map(Into::into),
        auto_update: fields.auto_update,
        creates_tag: fields.tag,
        tag_prefix: fields.tag_prefix,
        starting_point: fields.starting_point,
    }
}

fn run_config_action(
    ctx: &mut FlowContext,
    action: ConfigAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::List(cmd) => run_config_list(ctx, cmd.json),
        ConfigAction::Add(cmd) => run_config_add(
            ctx,
            cmd.kind.into(),
            &cmd.name,
            cmd.parent.as_deref(),
            field_changes(cmd.fields, None),
        ),
        ConfigAction::Edit(cmd) => {
            run_config_edit(ctx, &cmd.name, field_changes(cmd.fields, cmd.parent))
        }
        ConfigAction::Rename(cmd) => run_config_rename(ctx, &cmd.old, &cmd.new),
        ConfigAction::Delete(cmd) => run_config_delete(ctx, &cmd.name),
        ConfigAction::Import(cmd) => run_config_import(ctx, &resolve_input(&cmd.file)?),
        ConfigAction::Export => run_config_export(ctx),
    }
}

/// Relative import paths are read from where the command was started, not from `-C`.
fn resolve_input(path: &std::path::Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `git flow <type> <action> ...`, parsed by [`TopicCli`] once the type is known.
fn run_topic_command(
    outer: &GlobalOpts,
    args: Vec<String>,
    color_choice: ColorChoice,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(branch_type) = args.first().cloned() else {
        return Err(FlowError::InvalidInput("missing branch type".to_string()).into());
    };

    let command = TopicCli::command()
        .bin_name(format!("git-flow {branch_type}"))
        .color(color_choice);
    let matches = match command.try_get_matches_from(&args) {
        Ok(matches) => matches,
        Err(err) => return handle_parse_error(err),
    };
    let topic = TopicCli::from_arg_matches(&matches)?;
    let global = outer.merged(&topic.global);
    configure_display(&global);

    let ctx = open_context(&global)?;
    let result = run_topic(&ctx, &branch_type, topic.action);
    with_pause_report(&ctx, result)
}
