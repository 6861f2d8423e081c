use flow_core::FlowContext;
use flow_core::config::{Preset, load_settings};
use flow_core::setup::initialize;
use flow_kernel::engine::StartOptions;
use git2::Repository;
use tempfile::TempDir;

#[test]
fn engine_is_usable_without_cli_modules() {
    let dir = TempDir::new().expect("temp repo");
    Repository::init(dir.path()).expect("init repo");
    let settings = load_settings(dir.path()).expect("settings");
    let topology = Preset::Classic.topology().expect("classic preset");
    initialize(dir.path(), &settings, &topology, "origin", false).expect("initialize");

    let ctx = FlowContext::open(dir.path()).expect("open context");
    ctx.settings.require_initialized().expect("initialized");
    let report = ctx
        .engine()
        .start("feature", "login", StartOptions::default())
        .expect("start feature");

    assert_eq!(report.branch, "feature/login");
    assert_eq!(report.base, "develop");
    assert!(ctx.engine().pending_operation().expect("state").is_none());
    assert!(!ctx.store.path().exists());
}
