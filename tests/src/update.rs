use crate::fixtures::*;

#[test]
fn update_brings_parent_changes_into_base() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.commit_on("main", "hotfix.txt", "fix\n", "Fix on main")?;
    let main_tip = repo.tip("main")?;

    let output = repo.flow_ok(&["update", "develop"])?;
    let stdout = stdout_of(&output);
    assert!(stdout.contains("From:"), "{stdout}");
    assert!(stdout.contains("main"), "{stdout}");
    assert!(repo.contains("develop", &main_tip)?);
    Ok(())
}

#[test]
fn update_defaults_to_the_checked_out_base() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.commit_on("main", "hotfix.txt", "fix\n", "Fix on main")?;
    let main_tip = repo.tip("main")?;
    repo.git(&["checkout", "--quiet", "develop"])?;

    repo.flow_ok(&["update"])?;
    assert!(repo.contains("develop", &main_tip)?);
    Ok(())
}

#[test]
fn root_update_cascades_through_auto_updating_chain() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.flow_ok(&["init", "--preset", "gitlab"])?;
    assert!(repo.branch_exists("production"));
    assert!(repo.branch_exists("staging"));

    repo.commit_on("production", "patch.txt", "patch\n", "Production patch")?;
    let production_tip = repo.tip("production")?;

    let output = repo.flow_ok(&["update", "production"])?;
    let stdout = stdout_of(&output);
    assert!(stdout.contains("staging, main"), "{stdout}");
    assert!(repo.contains("staging", &production_tip)?);
    assert!(repo.contains("main", &production_tip)?);
    Ok(())
}

#[test]
fn update_of_a_topic_type_is_rejected() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_code(&["update", "feature"], EXIT_CONFIGURATION)?;
    Ok(())
}

#[test]
fn conflicting_update_pauses_and_continues() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.commit_file("app.txt", "base\n", "Add app")?;
    repo.flow_ok(&["init"])?;
    repo.commit_on("main", "app.txt", "main\n", "Main change")?;
    repo.commit_on("develop", "app.txt", "develop\n", "Develop change")?;

    let output = repo.flow_code(&["update", "develop"], EXIT_CONFLICT)?;
    assert!(
        stderr_of(&output).contains("git flow update --continue"),
        "{}",
        stderr_of(&output)
    );
    let state = repo.read_state()?;
    assert_eq!(state["action"], "update");
    assert_eq!(state["fullBranchName"], "develop");

    repo.flow_code(&["feature", "start", "blocked"], EXIT_IN_PROGRESS)?;

    repo.write("app.txt", "merged\n")?;
    repo.git(&["add", "app.txt"])?;
    repo.flow_ok(&["update", "--continue"])?;

    assert!(!repo.state_path().exists());
    assert_eq!(repo.file_on("develop", "app.txt")?, "merged");
    assert!(repo.contains("develop", &repo.tip("main")?)?);
    Ok(())
}

#[test]
fn overview_json_reports_tree_and_topics() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "login"])?;
    repo.flow_ok(&["feature", "start", "hotpath", "main"])?;

    let output = repo.flow_ok(&["overview", "--json"])?;
    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["remote"], "origin");
    assert_eq!(report["currentBranch"], "feature/hotpath");
    assert_eq!(report["pendingOperation"], Value::Null);

    let bases = report["bases"].as_array().ok_or("bases should be an array")?;
    assert_eq!(bases[0]["name"], "main");
    assert_eq!(bases[0]["depth"], 0);
    assert_eq!(bases[1]["name"], "develop");
    assert_eq!(bases[1]["depth"], 1);
    assert_eq!(bases[1]["autoUpdate"], true);

    let feature = bases[1]["topics"]
        .as_array()
        .ok_or("topics should be an array")?
        .iter()
        .find(|topic| topic["branchType"] == "feature")
        .ok_or("feature topic")?
        .clone();
    let shorts: Vec<&str> = feature["branches"]
        .as_array()
        .ok_or("branches should be an array")?
        .iter()
        .filter_map(|branch| branch["short"].as_str())
        .collect();
    assert_eq!(shorts, vec!["hotpath", "login"]);

    let text = repo.flow_ok(&["overview"])?;
    assert!(
        stdout_of(&text).contains("hotpath (started from main)"),
        "{}",
        stdout_of(&text)
    );
    Ok(())
}
