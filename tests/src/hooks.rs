#![cfg(unix)]

use crate::fixtures::*;

#[test]
fn failing_pre_hook_blocks_start() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.write_hook("pre-flow-feature-start", "echo 'not today' >&2\nexit 1")?;

    let output = repo.flow_code(&["feature", "start", "blocked"], EXIT_HOOK_REJECTED)?;
    let stderr = stderr_of(&output);
    assert!(stderr.contains("pre-flow-feature-start"), "{stderr}");
    assert!(stderr.contains("not today"), "{stderr}");
    assert!(!repo.branch_exists("feature/blocked"));
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

#[test]
fn hooks_receive_branch_details() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    let log = repo.path().join(".git").join("hook.log");
    repo.write_hook(
        "post-flow-feature-start",
        &format!(
            "echo \"$1 $2 $3 $BRANCH $BRANCH_TYPE $EXIT_CODE\" > '{}'",
            log.display()
        ),
    )?;

    repo.flow_ok(&["feature", "start", "hooked"])?;
    let logged = fs::read_to_string(&log)?;
    assert_eq!(logged.trim(), "hooked origin develop feature/hooked feature 0");
    Ok(())
}

#[test]
fn start_version_filter_rewrites_release_name() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.write_hook("filter-flow-release-start-version", "echo \"v$1\"")?;

    let output = repo.flow_ok(&["release", "start", "2.0"])?;
    assert!(
        stdout_of(&output).contains("release/v2.0"),
        "{}",
        stdout_of(&output)
    );
    assert!(repo.branch_exists("release/v2.0"));
    assert!(!repo.branch_exists("release/2.0"));
    Ok(())
}

#[test]
fn failing_filter_aborts_start() -> TestResult {
    let repo = IntegrationRepo::classic()?;
    repo.write_hook("filter-flow-release-start-version", "exit 3")?;

    repo.flow_code(&["release", "start", "2.0"], EXIT_FILTER_FAILED)?;
    assert!(!repo.branch_exists("release/2.0"));
    Ok(())
}
