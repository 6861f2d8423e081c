use crate::fixtures::*;

fn branch_names(repo: &IntegrationRepo) -> TestResult<Vec<String>> {
    let listing = repo.flow_ok(&["config", "list", "--json"])?;
    let parsed: Value = serde_json::from_slice(&listing.stdout)?;
    Ok(parsed["branches"]
        .as_array()
        .ok_or("branches should be an array")?
        .iter()
        .filter_map(|entry| entry["name"].as_str().map(str::to_string))
        .collect())
}

#[test]
fn add_base_creates_branch_and_cascade_entry() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&[
        "config",
        "add",
        "base",
        "staging",
        "main",
        "--auto-update",
        "true",
    ])?;

    assert!(repo.branch_exists("staging"));
    assert_eq!(repo.tip("staging")?, repo.tip("main")?);
    assert_eq!(
        repo.config_value("gitflow.branch.staging.parent").as_deref(),
        Some("main")
    );
    assert!(branch_names(&repo)?.contains(&"staging".to_string()));

    repo.commit_on("main", "ops.txt", "ops\n", "Ops change")?;
    let main_tip = repo.tip("main")?;
    repo.flow_ok(&["update", "main"])?;
    assert!(repo.contains("staging", &main_tip)?);
    assert!(repo.contains("develop", &main_tip)?);
    Ok(())
}

#[test]
fn add_topic_defaults_prefix_and_starts_branches() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["config", "add", "topic", "chore", "develop"])?;
    assert_eq!(
        repo.config_value("gitflow.branch.chore.prefix").as_deref(),
        Some("chore/")
    );

    repo.flow_ok(&["chore", "start", "deps"])?;
    assert!(repo.branch_exists("chore/deps"));

    repo.flow_code(&["config", "add", "topic", "chore", "develop"], EXIT_INVALID_INPUT)?;
    repo.flow_code(&["config", "add", "topic", "orphan"], EXIT_INVALID_INPUT)?;
    Ok(())
}

#[test]
fn edit_changes_only_named_fields() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&[
        "config",
        "edit",
        "feature",
        "--prefix",
        "feat/",
        "--upstream-strategy",
        "squash",
    ])?;

    let listing = repo.flow_ok(&["config", "list", "--json"])?;
    let parsed: Value = serde_json::from_slice(&listing.stdout)?;
    let feature = parsed["branches"]
        .as_array()
        .ok_or("branches should be an array")?
        .iter()
        .find(|entry| entry["name"] == "feature")
        .ok_or("feature entry")?
        .clone();
    assert_eq!(feature["prefix"], "feat/");
    assert_eq!(feature["upstreamStrategy"], "squash");
    assert_eq!(feature["parent"], "develop");

    repo.flow_ok(&["feature", "start", "short"])?;
    assert!(repo.branch_exists("feat/short"));
    Ok(())
}

#[test]
fn rename_and_delete_keep_topology_valid() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["config", "rename", "hotfix", "patch"])?;
    let names = branch_names(&repo)?;
    assert!(names.contains(&"patch".to_string()));
    assert!(!names.contains(&"hotfix".to_string()));
    assert_eq!(repo.config_value("gitflow.branch.hotfix.type"), None);

    let output = repo.flow_code(&["config", "delete", "develop"], EXIT_CONFIGURATION)?;
    assert!(stderr_of(&output).contains("parent"), "{}", stderr_of(&output));

    repo.flow_ok(&["config", "delete", "patch"])?;
    assert!(!branch_names(&repo)?.contains(&"patch".to_string()));
    repo.flow_code(&["patch", "start", "x"], EXIT_CONFIGURATION)?;
    Ok(())
}

#[test]
fn export_then_import_restores_topology() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    let exported = repo.flow_ok(&["config", "export"])?;
    let document = stdout_of(&exported);
    assert!(document.contains("[branches.feature]"), "{document}");

    let file = repo.path().join(".git").join("topology.toml");
    fs::write(&file, &document)?;

    repo.flow_ok(&["init", "--preset", "github", "--force"])?;
    assert_eq!(branch_names(&repo)?, vec!["main", "feature"]);

    repo.flow_ok(&["config", "import", &file.to_string_lossy()])?;
    let names = branch_names(&repo)?;
    assert_eq!(
        names,
        vec!["main", "develop", "feature", "bugfix", "release", "hotfix", "support"]
    );
    assert_eq!(
        repo.config_value("gitflow.branch.release.startpoint").as_deref(),
        Some("develop")
    );
    repo.flow_ok(&["release", "start", "3.0"])?;
    Ok(())
}

#[test]
fn import_rejects_cycles() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    let file = repo.path().join(".git").join("cycle.toml");
    fs::write(
        &file,
        "[branches.a]\nkind = \"base\"\nparent = \"b\"\n\n[branches.b]\nkind = \"base\"\nparent = \"a\"\n",
    )?;

    repo.flow_code(
        &["config", "import", &file.to_string_lossy()],
        EXIT_CONFIGURATION,
    )?;
    assert!(branch_names(&repo)?.contains(&"develop".to_string()));
    Ok(())
}
