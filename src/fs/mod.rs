// src/fs/mod.rs

//! Filesystem access used to materialise task files in the sandbox.

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Write `contents`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    /// Change owner (and group) to the named user.
    fn set_owner(&self, path: &Path, user: &str) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting mode {:o} on {:?}", mode, path))
    }

    fn set_owner(&self, path: &Path, user: &str) -> Result<()> {
        let owner = nix::unistd::User::from_name(user)
            .with_context(|| format!("looking up user '{user}'"))?
            .ok_or_else(|| anyhow!("unknown user '{user}'"))?;
        nix::unistd::chown(path, Some(owner.uid), Some(owner.gid))
            .with_context(|| format!("changing owner of {:?} to '{user}'", path))
    }
}
