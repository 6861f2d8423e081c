use crate::fixtures::*;

#[test]
fn start_refuses_existing_branch_and_missing_base() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "dup"])?;
    repo.git(&["checkout", "--quiet", "develop"])?;

    repo.flow_code(&["feature", "start", "dup"], EXIT_BRANCH_EXISTS)?;
    repo.flow_code(
        &["feature", "start", "other", "nowhere"],
        EXIT_BRANCH_NOT_FOUND,
    )?;
    assert!(!repo.branch_exists("feature/other"));
    Ok(())
}

#[test]
fn start_accepts_an_explicit_base() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "from-main", "main"])?;
    assert_eq!(repo.tip("feature/from-main")?, repo.tip("main")?);
    assert_eq!(
        repo.config_value("gitflow.branch.feature/from-main.base").as_deref(),
        Some("main")
    );
    Ok(())
}

#[test]
fn list_checkout_rename_and_delete() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "alpha"])?;
    repo.flow_ok(&["feature", "start", "beta", "develop"])?;

    let listing = repo.flow_ok(&["feature", "list", "--json"])?;
    let parsed: Value = serde_json::from_slice(&listing.stdout)?;
    let names: Vec<&str> = parsed
        .as_array()
        .ok_or("list output should be an array")?
        .iter()
        .filter_map(|entry| entry["short"].as_str())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(parsed[1]["current"], json!(true));
    assert_eq!(parsed[0]["storedBase"], json!("develop"));

    repo.flow_ok(&["feature", "checkout", "alpha"])?;
    assert_eq!(repo.current_branch()?, "feature/alpha");

    repo.flow_ok(&["feature", "rename", "alpha", "gamma"])?;
    assert!(!repo.branch_exists("feature/alpha"));
    assert!(repo.branch_exists("feature/gamma"));
    assert_eq!(
        repo.config_value("gitflow.branch.feature/gamma.base").as_deref(),
        Some("develop")
    );
    assert_eq!(repo.config_value("gitflow.branch.feature/alpha.base"), None);

    repo.flow_ok(&["feature", "delete", "gamma"])?;
    assert!(!repo.branch_exists("feature/gamma"));
    assert_eq!(repo.current_branch()?, "develop");

    let text = repo.flow_ok(&["feature", "list"])?;
    assert!(stdout_of(&text).contains("beta"), "{}", stdout_of(&text));
    assert!(!stdout_of(&text).contains("gamma"), "{}", stdout_of(&text));
    Ok(())
}

#[test]
fn delete_refuses_unmerged_work_without_force() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "wip"])?;
    repo.commit_file("wip.txt", "wip\n", "Work in progress")?;

    repo.flow_code(&["feature", "delete", "wip"], EXIT_INVALID_INPUT)?;
    assert!(repo.branch_exists("feature/wip"));

    repo.flow_ok(&["feature", "delete", "wip", "--force"])?;
    assert!(!repo.branch_exists("feature/wip"));
    Ok(())
}

#[test]
fn diff_shows_changes_against_parent() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "docs"])?;
    repo.commit_file("docs.md", "hello docs\n", "Add docs")?;

    let output = repo.flow_ok(&["feature", "diff"])?;
    let patch = stdout_of(&output);
    assert!(patch.contains("docs.md"), "{patch}");
    assert!(patch.contains("+hello docs"), "{patch}");
    Ok(())
}

#[test]
fn publish_and_track_round_trip() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    let remote = repo.add_remote(&["main", "develop"])?;
    repo.flow_ok(&["feature", "start", "shared"])?;
    repo.commit_file("shared.txt", "shared\n", "Shared work")?;
    let tip = repo.tip("feature/shared")?;

    let output = repo.flow_ok(&["feature", "publish"])?;
    assert!(
        stdout_of(&output).contains("origin/feature/shared"),
        "{}",
        stdout_of(&output)
    );
    let remote_repo = Repository::open_bare(&remote)?;
    let remote_tip = remote_repo.revparse_single("refs/heads/feature/shared")?.id();
    assert_eq!(remote_tip.to_string(), tip);
    assert_eq!(
        repo.config_value("branch.feature/shared.remote").as_deref(),
        Some("origin")
    );

    repo.git(&["checkout", "--quiet", "develop"])?;
    repo.git(&["branch", "--quiet", "-D", "feature/shared"])?;
    assert!(!repo.branch_exists("feature/shared"));

    repo.flow_ok(&["feature", "track", "shared"])?;
    assert_eq!(repo.current_branch()?, "feature/shared");
    assert_eq!(repo.tip("feature/shared")?, tip);

    repo.flow_code(&["feature", "track", "missing"], EXIT_BRANCH_NOT_FOUND)?;
    Ok(())
}

#[test]
fn topic_update_brings_in_parent_changes() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "behind"])?;
    repo.commit_file("topic.txt", "topic\n", "Topic work")?;
    repo.commit_on("develop", "base.txt", "base\n", "Base work")?;
    let develop_tip = repo.tip("develop")?;
    repo.git(&["checkout", "--quiet", "feature/behind"])?;

    repo.flow_ok(&["feature", "update"])?;
    assert!(repo.contains("feature/behind", &develop_tip)?);
    assert_eq!(repo.read("base.txt")?, "base\n");
    Ok(())
}

#[test]
fn topic_rebase_replays_onto_parent() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "linear"])?;
    repo.commit_file("linear.txt", "linear\n", "Linear work")?;
    repo.commit_on("develop", "base.txt", "base\n", "Base work")?;
    let develop_tip = repo.tip("develop")?;
    repo.git(&["checkout", "--quiet", "feature/linear"])?;

    repo.flow_ok(&["feature", "rebase", "linear"])?;
    assert_eq!(repo.tip("feature/linear~1")?, develop_tip);
    assert_eq!(repo.parent_count("feature/linear")?, 1);
    Ok(())
}
