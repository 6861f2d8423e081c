use std::path::Path;

use flow_kernel::engine::{Engine, Ports};
use flow_kernel::{FlowError, FlowResult};

use crate::clock::SystemClock;
use crate::config::{FlowSettings, load_settings};
use crate::display::DisplaySink;
use crate::hooks::ScriptRunner;
use crate::repo::GitBackend;
use crate::state_store::FileStateStore;

pub type FlowEngine<'a> = Engine<'a, GitBackend, ScriptRunner, ScriptRunner, FileStateStore>;

/// Adapters and settings for one invocation inside a repository.
#[derive(Debug)]
pub struct FlowContext {
    pub backend: GitBackend,
    pub scripts: ScriptRunner,
    pub store: FileStateStore,
    pub settings: FlowSettings,
    clock: SystemClock,
    sink: DisplaySink,
}

impl FlowContext {
    /// Open the repository containing `start` and load its `gitflow.*` settings.
    pub fn open(start: &Path) -> FlowResult<Self> {
        let backend = GitBackend::discover(start).map_err(|err| {
            FlowError::tool(format!("open repository at {}", start.display()), err)
        })?;
        let git_dir = backend
            .git_dir()
            .map_err(|err| FlowError::tool("locate git directory", err))?;
        let scripts = ScriptRunner::for_repo(backend.root())
            .map_err(|err| FlowError::tool("locate hooks directory", err))?;
        let settings = load_settings(backend.root())?;
        Ok(Self {
            store: FileStateStore::in_git_dir(&git_dir),
            backend,
            scripts,
            settings,
            clock: SystemClock,
            sink: DisplaySink,
        })
    }

    pub fn root(&self) -> &Path {
        self.backend.root()
    }

    pub fn reload(&mut self) -> FlowResult<()> {
        self.settings = load_settings(self.backend.root())?;
        Ok(())
    }

    pub fn engine(&self) -> FlowEngine<'_> {
        Engine::new(
            Ports {
                repo: &self.backend,
                hooks: &self.scripts,
                filters: &self.scripts,
                store: &self.store,
                clock: &self.clock,
                events: &self.sink,
            },
            &self.settings.topology,
            &self.settings.remote,
        )
    }
}
