use flow_core::FlowContext;
use flow_core::config::Preset;
use flow_core::display;
use flow_core::setup;

use super::shared::{join_or_none, print_outcome, row};

pub(crate) struct InitOptions {
    pub preset: Preset,
    pub force: bool,
    pub origin: Option<String>,
}

pub(crate) fn run_init(
    ctx: &mut FlowContext,
    options: InitOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let topology = options.preset.topology()?;
    let remote = options
        .origin
        .clone()
        .unwrap_or_else(|| ctx.settings.remote.clone());

    display::info(format!(
        "installing the {} preset into {}",
        options.preset,
        ctx.root().display()
    ));
    let report = setup::initialize(ctx.root(), &ctx.settings, &topology, &remote, options.force)?;
    ctx.reload()?;

    let mut rows = vec![
        row("Preset", options.preset.as_str()),
        row("Remote", remote),
        row("Created", join_or_none(&report.created_branches)),
        row("Existing", join_or_none(&report.existing_branches)),
    ];
    if let Some(branch) = report.root_commit.as_deref() {
        rows.push(row("Initial commit", branch));
    }
    let topic_names: Vec<String> = ctx
        .settings
        .topology
        .topic_types()
        .map(|entry| format!("{} ({})", entry.name, entry.prefix))
        .collect();
    rows.push(row("Topic types", join_or_none(&topic_names)));

    let title = if report.replaced {
        "Reinitialized git-flow"
    } else {
        "Initialized git-flow"
    };
    print_outcome(title, rows);
    Ok(())
}
