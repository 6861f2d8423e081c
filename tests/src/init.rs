use crate::fixtures::*;

#[test]
fn init_installs_classic_topology_and_base_branches() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let output = repo.flow_ok(&["init"])?;
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Initialized git-flow"), "{stdout}");
    assert!(stdout.contains("develop"), "{stdout}");

    assert!(repo.branch_exists("develop"));
    assert_eq!(repo.tip("develop")?, repo.tip("main")?);
    assert_eq!(repo.current_branch()?, "main");
    assert_eq!(repo.config_value("gitflow.initialized").as_deref(), Some("true"));
    assert_eq!(
        repo.config_value("gitflow.branch.feature.parent").as_deref(),
        Some("develop")
    );
    assert_eq!(
        repo.config_value("gitflow.branch.release.startpoint").as_deref(),
        Some("develop")
    );
    Ok(())
}

#[test]
fn second_init_needs_force() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    let output = repo.flow_code(&["init", "--preset", "github"], EXIT_CONFIGURATION)?;
    assert!(stderr_of(&output).contains("--force"), "{}", stderr_of(&output));

    repo.flow_ok(&["init", "--preset", "github", "--force"])?;
    let listing = repo.flow_ok(&["config", "list", "--json"])?;
    let parsed: Value = serde_json::from_slice(&listing.stdout)?;
    let names: Vec<&str> = parsed["branches"]
        .as_array()
        .ok_or("branches should be an array")?
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    assert_eq!(names, vec!["main", "feature"]);
    Ok(())
}

#[test]
fn commands_refuse_uninitialized_repositories() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let output = repo.flow_code(&["feature", "start", "login"], EXIT_CONFIGURATION)?;
    assert!(
        stderr_of(&output).contains("git flow init"),
        "{}",
        stderr_of(&output)
    );
    assert!(!repo.branch_exists("feature/login"));
    Ok(())
}

#[test]
fn unknown_topic_type_is_a_configuration_error() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_code(&["chore", "start", "x"], EXIT_CONFIGURATION)?;
    Ok(())
}

#[test]
fn usage_errors_exit_with_invalid_input() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_code(
        &["feature", "finish", "--rebase", "--squash"],
        EXIT_INVALID_INPUT,
    )?;
    Ok(())
}

#[test]
fn completions_print_a_registration_script() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let output = repo.flow_ok(&["completions", "bash"])?;
    assert!(stdout_of(&output).contains("COMPLETE"), "{}", stdout_of(&output));
    Ok(())
}
