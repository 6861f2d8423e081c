//! Workflow hooks (`pre-flow-*`, `post-flow-*`) and filters (`filter-flow-*`) from the
//! repository's hooks directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use flow_kernel::ports::{
    FilterKind, FilterOutcome, FilterPort, HookContext, HookOutcome, HookPhase, HookPort,
};

use crate::error::CoreError;
use crate::vcs;

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    hooks_dir: PathBuf,
    workdir: PathBuf,
}

impl ScriptRunner {
    pub fn new(hooks_dir: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            hooks_dir: hooks_dir.into(),
            workdir: workdir.into(),
        }
    }

    /// Runner for the hooks directory git itself would use for `root`.
    pub fn for_repo(root: &Path) -> Result<Self, CoreError> {
        let hooks_dir = vcs::hooks_dir_in(root)?;
        Ok(Self::new(hooks_dir, root))
    }

    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    fn script(&self, name: &str) -> Option<PathBuf> {
        let path = self.hooks_dir.join(name);
        vcs::is_executable(&path).then_some(path)
    }

    fn run(&self, script: &Path, command: &mut Command) -> Result<Output, CoreError> {
        command
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| CoreError::Script {
                script: script.to_path_buf(),
                source,
            })
    }
}

fn hook_args(context: &HookContext) -> [&str; 3] {
    let last = if context.action == "start" {
        context.base_branch.as_str()
    } else {
        context.full_branch.as_str()
    };
    [context.short_name.as_str(), context.remote.as_str(), last]
}

fn exit_code_of(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

impl HookPort for ScriptRunner {
    type Error = CoreError;

    fn run_hook(
        &self,
        phase: HookPhase,
        context: &HookContext,
    ) -> Result<HookOutcome, CoreError> {
        let Some(script) = self.script(&context.hook_name(phase)) else {
            return Ok(HookOutcome::Missing);
        };

        let mut command = Command::new(&script);
        command
            .args(hook_args(context))
            .env("BRANCH", &context.full_branch)
            .env("BRANCH_NAME", &context.short_name)
            .env("BRANCH_TYPE", &context.branch_type)
            .env("BASE_BRANCH", &context.base_branch)
            .env("ORIGIN", &context.remote);
        if let Some(version) = &context.version {
            command.env("VERSION", version);
        }
        if let Some(exit_code) = context.exit_code {
            command.env("EXIT_CODE", exit_code.to_string());
        }

        let output = self.run(&script, &mut command)?;
        Ok(HookOutcome::Completed {
            exit_code: exit_code_of(&output),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl FilterPort for ScriptRunner {
    type Error = CoreError;

    fn run_filter(
        &self,
        kind: FilterKind,
        branch_type: &str,
        args: &[String],
    ) -> Result<FilterOutcome, CoreError> {
        let Some(script) = self.script(&kind.script_name(branch_type)) else {
            return Ok(FilterOutcome::Missing);
        };

        let mut command = Command::new(&script);
        command.args(args);
        let output = self.run(&script, &mut command)?;
        if !output.status.success() {
            return Ok(FilterOutcome::Failed {
                exit_code: exit_code_of(&output),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(FilterOutcome::Output(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}
