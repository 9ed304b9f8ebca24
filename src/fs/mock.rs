// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockFile {
    pub content: Vec<u8>,
    pub mode: Option<u32>,
    pub owner: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, MockFile>,
    // Writes under any of these prefixes fail.
    failing: Vec<PathBuf>,
}

/// In-memory filesystem for tests. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every write below `prefix` fail.
    pub fn fail_writes_under(&self, prefix: impl AsRef<Path>) {
        self.state().failing.push(prefix.as_ref().to_path_buf());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<MockFile> {
        self.state().files.get(path.as_ref()).cloned()
    }
}

impl FileSystem for MockFileSystem {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.state();
        if state.failing.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(anyhow!("Write refused: {:?}", path));
        }
        let entry = state.files.entry(path.to_path_buf()).or_default();
        entry.content = contents.to_vec();
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        match self.state().files.get_mut(path) {
            Some(file) => {
                file.mode = Some(mode);
                Ok(())
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn set_owner(&self, path: &Path, user: &str) -> Result<()> {
        match self.state().files.get_mut(path) {
            Some(file) => {
                file.owner = Some(user.to_string());
                Ok(())
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
