use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use flow_core::config::Preset;
use flow_kernel::topology::{BranchKind, MergeStrategy};

/// Branch-based release workflows on top of git.
#[derive(Parser, Debug)]
#[command(
    name = "git-flow",
    bin_name = "git-flow",
    version,
    about,
    // Show help when you forget a subcommand
    arg_required_else_help = true,
    propagate_version = true,
    after_help = "Topic branches are driven as `git flow <type> <action>`, for example:\n  git flow feature start login\n  git flow feature finish login --squash\n  git flow release finish --continue\n\nRun `git flow <type> --help` for the actions of a branch type."
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalOpts,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub(crate) struct GlobalOpts {
    /// Increase stderr verbosity (`-v` = info, `-vv` = debug); quiet wins over verbose
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    /// Only print errors and command results
    #[arg(short = 'q', long, global = true)]
    pub(crate) quiet: bool,

    /// Disable ANSI colours even on a TTY (non-TTY output is always plain)
    #[arg(long = "no-ansi", global = true)]
    pub(crate) no_ansi: bool,

    /// Run as if git-flow was started in PATH
    #[arg(short = 'C', value_name = "PATH", global = true)]
    pub(crate) directory: Option<PathBuf>,
}

impl GlobalOpts {
    /// Combine options given before and after a topic type.
    pub(crate) fn merged(&self, later: &GlobalOpts) -> GlobalOpts {
        GlobalOpts {
            verbose: self.verbose.max(later.verbose),
            quiet: self.quiet || later.quiet,
            no_ansi: self.no_ansi || later.no_ansi,
            directory: later.directory.clone().or_else(|| self.directory.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Write a branch topology into this repository's git config and create its base branches
    ///
    /// Examples:
    ///   git flow init                  # classic develop/main layout
    ///   git flow init --preset github  # trunk plus feature branches
    Init(InitCmd),

    /// Inspect or change the configured branch types
    Config(ConfigCmd),

    /// Show the branch tree, active topic branches and any paused operation
    Overview(OverviewCmd),

    /// Update a base branch from its parent and cascade into auto-updating descendants, or
    /// resume/abandon a paused update
    Update(BaseUpdateCmd),

    /// Generate shell completion scripts
    Completions(CompletionsCmd),

    /// Topic branch commands: `git flow <type> <action> ...`
    #[command(external_subcommand)]
    Topic(Vec<String>),
}

#[derive(ClapArgs, Debug)]
pub(crate) struct InitCmd {
    /// Branch layout to install
    #[arg(long, value_enum, default_value_t = PresetArg::Classic)]
    pub(crate) preset: PresetArg,

    /// Replace an existing configuration
    #[arg(short = 'f', long)]
    pub(crate) force: bool,

    /// Accepted for compatibility; the preset is always applied without prompting
    #[arg(short = 'd', long)]
    pub(crate) defaults: bool,

    /// Remote used for publish/track/finish
    #[arg(long, value_name = "NAME")]
    pub(crate) origin: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum PresetArg {
    Classic,
    Github,
    Gitlab,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Classic => Preset::Classic,
            PresetArg::Github => Preset::Github,
            PresetArg::Gitlab => Preset::Gitlab,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum StrategyArg {
    Merge,
    Rebase,
    Squash,
    None,
}

impl From<StrategyArg> for MergeStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Merge => MergeStrategy::Merge,
            StrategyArg::Rebase => MergeStrategy::Rebase,
            StrategyArg::Squash => MergeStrategy::Squash,
            StrategyArg::None => MergeStrategy::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum KindArg {
    Base,
    Topic,
}

impl From<KindArg> for BranchKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Base => BranchKind::Base,
            KindArg::Topic => BranchKind::Topic,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigCmd {
    #[command(subcommand)]
    pub(crate) action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Print every branch type in declaration order
    List(ConfigListCmd),

    /// Add a base branch or topic type
    Add(ConfigAddCmd),

    /// Change fields of an existing branch type
    Edit(ConfigEditCmd),

    /// Rename a branch type; parents and starting points follow
    Rename(ConfigRenameCmd),

    /// Remove a branch type that nothing else depends on
    Delete(ConfigDeleteCmd),

    /// Replace the topology with the contents of a TOML file
    Import(ConfigImportCmd),

    /// Print the topology as TOML
    Export,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigListCmd {
    /// Emit JSON instead of a block per branch type
    #[arg(long)]
    pub(crate) json: bool,
}

/// Fields shared by `config add` and `config edit`.
#[derive(ClapArgs, Debug, Default, Clone)]
pub(crate) struct BranchTypeFields {
    /// Branch name prefix of a topic type (e.g. `feature/`)
    #[arg(long)]
    pub(crate) prefix: Option<String>,

    /// How the branch is integrated into its parent
    #[arg(long = "upstream-strategy", value_enum)]
    pub(crate) upstream_strategy: Option<StrategyArg>,

    /// How the parent is integrated into the branch
    #[arg(long = "downstream-strategy", value_enum)]
    pub(crate) downstream_strategy: Option<StrategyArg>,

    /// Update this base branch whenever its parent changes
    #[arg(long = "auto-update", value_name = "BOOL")]
    pub(crate) auto_update: Option<bool>,

    /// Tag the parent when a branch of this type finishes
    #[arg(long, value_name = "BOOL")]
    pub(crate) tag: Option<bool>,

    /// Prefix for tags created at finish
    #[arg(long = "tag-prefix")]
    pub(crate) tag_prefix: Option<String>,

    /// Branch new topics of this type start from, instead of the parent
    #[arg(long = "starting-point")]
    pub(crate) starting_point: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigAddCmd {
    #[arg(value_enum)]
    pub(crate) kind: KindArg,

    pub(crate) name: String,

    /// Parent base branch; required for topics, omitted only for the root
    #[arg(add = crate::completions::base_branch_completer())]
    pub(crate) parent: Option<String>,

    #[command(flatten)]
    pub(crate) fields: BranchTypeFields,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigEditCmd {
    #[arg(add = crate::completions::branch_type_completer())]
    pub(crate) name: String,

    /// New parent base branch
    #[arg(long, add = crate::completions::base_branch_completer())]
    pub(crate) parent: Option<String>,

    #[command(flatten)]
    pub(crate) fields: BranchTypeFields,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigRenameCmd {
    #[arg(add = crate::completions::branch_type_completer())]
    pub(crate) old: String,
    pub(crate) new: String,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigDeleteCmd {
    #[arg(add = crate::completions::branch_type_completer())]
    pub(crate) name: String,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct ConfigImportCmd {
    #[arg(value_name = "FILE")]
    pub(crate) file: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct OverviewCmd {
    /// Emit JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(ClapArgs, Debug)]
#[command(
    group = ArgGroup::new("resume")
        .args(["continue_", "abort"])
        .multiple(false)
)]
pub(crate) struct BaseUpdateCmd {
    /// Base branch to update; defaults to the checked-out branch
    #[arg(value_name = "BASE", add = crate::completions::base_branch_completer())]
    pub(crate) base: Option<String>,

    /// Resume the paused update after resolving conflicts
    #[arg(long = "continue", conflicts_with = "base")]
    pub(crate) continue_: bool,

    /// Abandon the paused update and restore the original branch
    #[arg(long, conflicts_with = "base")]
    pub(crate) abort: bool,

    #[command(flatten)]
    pub(crate) tuning: UpdateTuning,
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub(crate) struct UpdateTuning {
    /// Skip git hooks for commits made while integrating
    #[arg(long = "no-verify")]
    pub(crate) no_verify: bool,

    /// Rebase with `--rebase-merges` via the git executable
    #[arg(long = "preserve-merges")]
    pub(crate) preserve_merges: bool,

    /// Rebase interactively via the git executable
    #[arg(short = 'i', long)]
    pub(crate) interactive: bool,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct CompletionsCmd {
    /// Shell to generate completion script for
    #[arg(value_enum)]
    pub(crate) shell: CompletionShell,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Elvish,
    Powershell,
}

impl From<CompletionShell> for Shell {
    fn from(value: CompletionShell) -> Self {
        match value {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::Elvish => Shell::Elvish,
            CompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

/// `git flow <type> ...`; parsed separately because branch types come from git config.
#[derive(Parser, Debug)]
#[command(arg_required_else_help = true)]
pub(crate) struct TopicCli {
    #[command(flatten)]
    pub(crate) global: GlobalOpts,

    #[command(subcommand)]
    pub(crate) action: TopicAction,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TopicAction {
    /// Create a branch of this type from its base and check it out
    Start(StartCmd),

    /// Integrate the branch into its parent, tag, cascade and clean up
    Finish(Box<FinishCmd>),

    /// Push the branch to the remote and track it
    Publish(PublishCmd),

    /// Create a local branch tracking the remote one
    Track(NameCmd),

    /// Delete the branch
    Delete(DeleteCmd),

    /// Check out a branch of this type by short name
    Checkout(NameCmd),

    /// Replay the branch onto its parent
    Rebase(TopicUpdateCmd),

    /// Bring the branch up to date with its parent using the type's downstream strategy
    Update(TopicUpdateCmd),

    /// Show the changes the branch introduces relative to its parent
    Diff(OptionalNameCmd),

    /// Merge the remote counterpart into the local branch
    Pull(OptionalNameCmd),

    /// Rename a branch of this type
    Rename(RenameCmd),

    /// List local branches of this type
    List(TopicListCmd),
}

#[derive(ClapArgs, Debug)]
pub(crate) struct StartCmd {
    pub(crate) name: String,

    /// Start from this branch instead of the configured starting point
    pub(crate) base: Option<String>,

    /// Fetch the base from the remote first
    #[arg(long)]
    pub(crate) fetch: bool,
}

#[derive(ClapArgs, Debug, Default)]
#[command(
    group = ArgGroup::new("resume")
        .args(["continue_", "abort"])
        .multiple(false),
    group = ArgGroup::new("strategy")
        .args(["rebase", "squash"])
        .multiple(false),
    group = ArgGroup::new("fast_forward")
        .args(["no_ff", "ff"])
        .multiple(false),
    group = ArgGroup::new("tag_message")
        .args(["message", "messagefile"])
        .multiple(false)
)]
pub(crate) struct FinishCmd {
    /// Branch to finish; defaults to the checked-out branch
    pub(crate) name: Option<String>,

    /// Resume a finish paused on conflicts
    #[arg(short = 'c', long = "continue")]
    pub(crate) continue_: bool,

    /// Abandon a paused finish and restore the original branch
    #[arg(short = 'a', long)]
    pub(crate) abort: bool,

    /// Rebase the branch onto its parent instead of the configured strategy
    #[arg(short = 'r', long)]
    pub(crate) rebase: bool,

    /// Squash the branch into one commit on its parent
    #[arg(short = 'S', long)]
    pub(crate) squash: bool,

    /// Always create a merge commit
    #[arg(long = "no-ff")]
    pub(crate) no_ff: bool,

    /// Fast-forward the parent when possible
    #[arg(long)]
    pub(crate) ff: bool,

    /// Rebase with `--rebase-merges`
    #[arg(long = "preserve-merges")]
    pub(crate) preserve_merges: bool,

    /// Finish even if the branch name or remote state would normally stop it
    #[arg(short = 'f', long)]
    pub(crate) force: bool,

    /// Keep the branch locally and on the remote
    #[arg(short = 'k', long)]
    pub(crate) keep: bool,

    /// Keep the local branch
    #[arg(long)]
    pub(crate) keeplocal: bool,

    /// Keep the remote branch
    #[arg(long)]
    pub(crate) keepremote: bool,

    /// Delete the local branch even if it is not fully merged
    #[arg(short = 'D', long = "force_delete", visible_alias = "force-delete")]
    pub(crate) force_delete: bool,

    /// Do not create a tag
    #[arg(short = 'n', long)]
    pub(crate) notag: bool,

    /// GPG-sign the tag
    #[arg(short = 's', long)]
    pub(crate) sign: bool,

    /// GPG key to sign the tag with (implies --sign)
    #[arg(short = 'u', long, value_name = "KEY")]
    pub(crate) signingkey: Option<String>,

    /// Tag message
    #[arg(short = 'm', long, value_name = "MSG")]
    pub(crate) message: Option<String>,

    /// Read the tag message from a file
    #[arg(long, value_name = "FILE")]
    pub(crate) messagefile: Option<PathBuf>,

    /// Tag name instead of the tag prefix plus the short branch name
    #[arg(short = 'T', long, value_name = "TAG")]
    pub(crate) tagname: Option<String>,

    /// Commit message for a squash finish
    #[arg(long = "squash-message", value_name = "MSG")]
    pub(crate) squash_message: Option<String>,

    /// Skip git hooks for commits made while integrating
    #[arg(long = "no-verify")]
    pub(crate) no_verify: bool,

    /// Fetch from the remote before checking sync state
    #[arg(long)]
    pub(crate) fetch: bool,

    /// Push option passed to the remote when deleting the branch
    #[arg(short = 'o', long = "push-option", value_name = "OPTION")]
    pub(crate) push_option: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct PublishCmd {
    pub(crate) name: Option<String>,

    /// Push option passed to the remote
    #[arg(short = 'o', long = "push-option", value_name = "OPTION")]
    pub(crate) push_option: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct NameCmd {
    pub(crate) name: String,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct OptionalNameCmd {
    /// Defaults to the checked-out branch
    pub(crate) name: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct DeleteCmd {
    /// Defaults to the checked-out branch
    pub(crate) name: Option<String>,

    /// Delete even if the branch is not merged into its parent
    #[arg(short = 'f', long)]
    pub(crate) force: bool,

    /// Delete the remote branch too
    #[arg(short = 'r', long)]
    pub(crate) remote: bool,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct TopicUpdateCmd {
    /// Defaults to the checked-out branch
    pub(crate) name: Option<String>,

    #[command(flatten)]
    pub(crate) tuning: UpdateTuning,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct RenameCmd {
    pub(crate) old: String,
    pub(crate) new: String,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct TopicListCmd {
    /// Emit JSON instead of one branch per line
    #[arg(long)]
    pub(crate) json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definitions_are_consistent() {
        Cli::command().debug_assert();
        TopicCli::command().debug_assert();
    }

    #[test]
    fn unknown_commands_become_topic_invocations() {
        let cli = Cli::try_parse_from(["git-flow", "-v", "feature", "finish", "--squash"]).unwrap();
        assert_eq!(cli.global.verbose, 1);
        match cli.command {
            Commands::Topic(args) => assert_eq!(args, vec!["feature", "finish", "--squash"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn finish_flags_use_git_flow_spellings() {
        let topic = TopicCli::try_parse_from([
            "release",
            "finish",
            "1.2.0",
            "--force_delete",
            "--keepremote",
            "--tagname",
            "v1.2.0",
            "-o",
            "ci.skip",
        ])
        .unwrap();
        let TopicAction::Finish(cmd) = topic.action else {
            panic!("expected finish");
        };
        assert_eq!(cmd.name.as_deref(), Some("1.2.0"));
        assert!(cmd.force_delete && cmd.keepremote);
        assert_eq!(cmd.tagname.as_deref(), Some("v1.2.0"));
        assert_eq!(cmd.push_option, vec!["ci.skip"]);
    }

    #[test]
    fn finish_rejects_conflicting_strategies() {
        assert!(TopicCli::try_parse_from(["feature", "finish", "--rebase", "--squash"]).is_err());
        assert!(TopicCli::try_parse_from(["feature", "finish", "--continue", "--abort"]).is_err());
    }
}
