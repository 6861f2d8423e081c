use crate::fixtures::*;

#[test]
fn feature_finish_merges_into_develop_and_deletes_branch() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "login"])?;
    assert_eq!(repo.current_branch()?, "feature/login");
    assert_eq!(
        repo.config_value("gitflow.branch.feature/login.base").as_deref(),
        Some("develop")
    );

    repo.commit_file("login.txt", "login\n", "Add login")?;
    let feature_tip = repo.tip("feature/login")?;

    let output = repo.flow_ok(&["feature", "finish"])?;
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Merged into: develop"), "{stdout}");

    assert!(repo.contains("develop", &feature_tip)?);
    assert!(!repo.contains("main", &feature_tip)?);
    assert_eq!(repo.parent_count("develop")?, 2);
    assert!(!repo.branch_exists("feature/login"));
    assert_eq!(repo.current_branch()?, "develop");
    assert!(!repo.state_path().exists());
    Ok(())
}

#[test]
fn squash_finish_uses_the_given_message() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "search"])?;
    repo.commit_file("search.txt", "one\n", "wip 1")?;
    repo.commit_file("search.txt", "two\n", "wip 2")?;

    repo.flow_ok(&[
        "feature",
        "finish",
        "search",
        "--squash",
        "--squash-message",
        "Add search",
    ])?;

    assert_eq!(repo.commit_message("develop")?, "Add search");
    assert_eq!(repo.parent_count("develop")?, 1);
    assert_eq!(repo.file_on("develop", "search.txt")?, "two");
    assert!(!repo.branch_exists("feature/search"));
    Ok(())
}

#[test]
fn finish_follows_the_current_parent_not_the_stored_base() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_ok(&["feature", "start", "billing"])?;
    repo.commit_file("billing.txt", "billing\n", "Add billing")?;
    let feature_tip = repo.tip("feature/billing")?;

    repo.flow_ok(&["config", "edit", "feature", "--parent", "main"])?;
    let output = repo.flow_ok(&["feature", "finish", "billing"])?;
    assert!(
        stdout_of(&output).contains("Merged into: main"),
        "{}",
        stdout_of(&output)
    );

    assert!(repo.contains("main", &feature_tip)?);
    // develop auto-updates from main
    assert!(repo.contains("develop", &feature_tip)?);
    Ok(())
}

#[test]
fn release_finish_pauses_twice_and_completes_on_continue() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.commit_file("app.txt", "base\n", "Add app")?;
    repo.flow_ok(&["init"])?;

    repo.commit_on("main", "app.txt", "hotfix\n", "Hotfix on main")?;
    repo.commit_on("develop", "app.txt", "develop\n", "Develop change")?;

    repo.flow_ok(&["release", "start", "1.0"])?;
    repo.commit_file("version.txt", "1.0\n", "Bump version")?;
    repo.commit_on("develop", "app.txt", "develop-next\n", "Next development")?;
    repo.git(&["checkout", "--quiet", "release/1.0"])?;

    let output = repo.flow_code(
        &["release", "finish", "1.0", "-m", "Release 1.0"],
        EXIT_CONFLICT,
    )?;
    let stderr = stderr_of(&output);
    assert!(stderr.contains("app.txt"), "{stderr}");
    assert!(stderr.contains("git flow release finish --continue"), "{stderr}");

    let state = repo.read_state()?;
    assert_eq!(state["action"], "finish");
    assert_eq!(state["fullBranchName"], "release/1.0");
    assert_eq!(state["parentBranch"], "main");
    assert_eq!(state["currentStep"], "merge");

    repo.write("app.txt", "release\n")?;
    repo.git(&["add", "app.txt"])?;
    repo.flow_code(&["release", "finish", "--continue"], EXIT_CONFLICT)?;

    let state = repo.read_state()?;
    assert_eq!(state["currentStep"], "update_children");
    assert_eq!(state["childBranches"], json!(["develop"]));
    assert!(repo.tag_exists("1.0"));

    repo.write("app.txt", "final\n")?;
    repo.git(&["add", "app.txt"])?;
    let output = repo.flow_ok(&["release", "finish", "--continue"])?;
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Tag:"), "{stdout}");
    assert!(stdout.contains("Cascaded:    develop"), "{stdout}");

    assert!(!repo.state_path().exists());
    assert!(!repo.branch_exists("release/1.0"));
    assert_eq!(repo.file_on("main", "app.txt")?, "release");
    assert_eq!(repo.file_on("develop", "app.txt")?, "final");
    assert_eq!(repo.file_on("develop", "version.txt")?, "1.0");
    assert_eq!(
        repo.git_stdout(&["tag", "-l", "--format=%(contents:subject)", "1.0"])?,
        "Release 1.0"
    );
    Ok(())
}

#[test]
fn abort_restores_the_original_branch_and_clears_state() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.commit_file("shared.txt", "base\n", "Add shared")?;
    repo.flow_ok(&["init"])?;

    repo.flow_ok(&["feature", "start", "clash"])?;
    repo.commit_file("shared.txt", "feature\n", "Feature edit")?;
    repo.commit_on("develop", "shared.txt", "develop\n", "Develop edit")?;
    let develop_before = repo.tip("develop")?;
    repo.git(&["checkout", "--quiet", "feature/clash"])?;

    repo.flow_code(&["feature", "finish", "clash"], EXIT_CONFLICT)?;
    assert!(repo.state_path().exists());

    let output = repo.flow_ok(&["feature", "finish", "--abort"])?;
    assert!(stdout_of(&output).contains("Aborted"), "{}", stdout_of(&output));
    assert!(!repo.state_path().exists());
    assert_eq!(repo.current_branch()?, "feature/clash");
    assert_eq!(repo.tip("develop")?, develop_before);
    assert_eq!(repo.read("shared.txt")?, "feature\n");
    Ok(())
}

#[test]
fn stale_state_blocks_new_work_until_aborted() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    fs::create_dir_all(repo.state_path().parent().ok_or("state dir")?)?;
    fs::write(
        repo.state_path(),
        serde_json::to_string(&json!({
            "action": "finish",
            "branchType": "feature",
            "branchName": "gone",
            "fullBranchName": "feature/gone",
            "parentBranch": "develop",
            "mergeStrategy": "merge",
            "currentStep": "update_children"
        }))?,
    )?;

    let output = repo.flow_code(&["feature", "start", "next"], EXIT_IN_PROGRESS)?;
    assert!(
        stderr_of(&output).contains("git flow feature finish --abort"),
        "{}",
        stderr_of(&output)
    );
    repo.flow_code(&["feature", "finish", "other"], EXIT_IN_PROGRESS)?;

    let overview = repo.flow_ok(&["overview"])?;
    assert!(
        stdout_of(&overview).contains("Operation in progress"),
        "{}",
        stdout_of(&overview)
    );

    let output = repo.flow_code(&["release", "finish", "--abort"], EXIT_IN_PROGRESS)?;
    assert!(
        stderr_of(&output).contains("git flow update --abort"),
        "{}",
        stderr_of(&output)
    );
    assert!(repo.state_path().exists());

    repo.flow_ok(&["update", "--abort"])?;
    assert!(!repo.state_path().exists());
    repo.flow_ok(&["feature", "start", "next"])?;
    Ok(())
}

#[test]
fn continue_without_pending_operation_is_invalid() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.flow_code(&["feature", "finish", "--continue"], EXIT_INVALID_INPUT)?;
    repo.flow_code(&["update", "--abort"], EXIT_INVALID_INPUT)?;
    Ok(())
}

#[test]
fn sync_gate_rejects_branch_behind_remote_unless_forced() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.add_remote(&["main", "develop"])?;

    repo.flow_ok(&["feature", "start", "sync"])?;
    repo.commit_file("sync.txt", "one\n", "First")?;
    repo.commit_file("sync.txt", "two\n", "Second")?;
    repo.flow_ok(&["feature", "publish", "sync"])?;
    repo.git(&["reset", "--quiet", "--hard", "HEAD~1"])?;

    let output = repo.flow_code(&["feature", "finish", "sync"], EXIT_REMOTE_STATE)?;
    assert!(stderr_of(&output).contains("behind"), "{}", stderr_of(&output));
    assert!(!repo.state_path().exists());
    assert!(repo.branch_exists("feature/sync"));

    repo.flow_ok(&["feature", "finish", "sync", "--force"])?;
    assert!(!repo.branch_exists("feature/sync"));
    let remote_branches = repo.git_stdout(&["ls-remote", "--heads", "origin"])?;
    assert!(
        !remote_branches.contains("refs/heads/feature/sync"),
        "{remote_branches}"
    );
    Ok(())
}

#[test]
fn finish_defaults_come_from_git_config() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.git(&["config", "gitflow.feature.finish.keep", "true"])?;
    repo.flow_ok(&["feature", "start", "kept"])?;
    repo.commit_file("kept.txt", "kept\n", "Kept change")?;

    repo.flow_ok(&["feature", "finish", "kept"])?;
    assert!(repo.branch_exists("feature/kept"));

    repo.flow_ok(&["feature", "start", "dropped"])?;
    repo.commit_file("dropped.txt", "dropped\n", "Dropped change")?;
    repo.git(&["config", "gitflow.feature.finish.keep", "false"])?;
    repo.flow_ok(&["feature", "finish", "dropped"])?;
    assert!(!repo.branch_exists("feature/dropped"));
    Ok(())
}
