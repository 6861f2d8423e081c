use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use flow_kernel::ports::StateStore;
use flow_kernel::state::MergeOperationState;
use tempfile::NamedTempFile;

use crate::error::CoreError;

/// Single operation record at `<git-dir>/gitflow/state/merge.json`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_git_dir(git_dir: &Path) -> Self {
        Self::new(git_dir.join("gitflow").join("state").join("merge.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    type Error = CoreError;

    fn save(&self, state: &MergeOperationState) -> Result<(), CoreError> {
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).map_err(|err| CoreError::io(&parent, err))?;

        let contents = serde_json::to_vec_pretty(state).map_err(|source| CoreError::State {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = NamedTempFile::new_in(&parent).map_err(|err| CoreError::io(&parent, err))?;
        tmp.write_all(&contents)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|err| CoreError::io(tmp.path(), err))?;
        tmp.persist(&self.path)
            .map_err(|err| CoreError::io(&self.path, err.error))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<MergeOperationState>, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CoreError::io(&self.path, err)),
        };
        let state = serde_json::from_str(&raw).map_err(|source| CoreError::State {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    fn clear(&self) -> Result<(), CoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CoreError::io(&self.path, err)),
        }
    }

    fn exists(&self) -> Result<bool, CoreError> {
        Ok(self.path.is_file())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
