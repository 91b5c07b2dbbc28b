// src/lockfile/mod.rs

//! Lock file storage for Goblin
//!
//! The lock file is the only durable record of what is installed. This
//! module handles:
//! - Loading the lock file (a missing file is an empty, valid state)
//! - Atomic saves (temp file in the same directory, then rename)
//! - In-memory upsert/remove keyed by package name
//!
//! There is no cross-process locking. Two goblin processes working on the
//! same lock file at once may race.

use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A package recorded as installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    /// Version actually obtained from the transfer
    #[serde(alias = "version")]
    pub installed_version: String,
    /// Manifest version string in effect when this entry was written
    pub resolved_from: String,
    #[serde(alias = "install_date")]
    pub install_timestamp: DateTime<Utc>,
    #[serde(alias = "os")]
    pub platform_os: String,
    #[serde(alias = "arch")]
    pub platform_arch: String,
    #[serde(alias = "path")]
    pub install_path: PathBuf,
}

impl InstalledPackage {
    /// Whether the recorded binary is still on disk
    pub fn is_present(&self) -> bool {
        self.install_path.exists()
    }
}

/// In-memory copy of the lock file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(default)]
    packages: Vec<InstalledPackage>,
}

impl LockFile {
    /// Entries in lock file order
    pub fn entries(&self) -> &[InstalledPackage] {
        &self.packages
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Find an entry by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Replace the entry with the same name, or append a new one
    pub fn upsert(&mut self, entry: InstalledPackage) {
        match self
            .packages
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&entry.name))
        {
            Some(existing) => *existing = entry,
            None => self.packages.push(entry),
        }
    }

    /// Delete the entry with this name, returning whether one existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.packages.len();
        self.packages.retain(|p| !p.name.eq_ignore_ascii_case(name));
        self.packages.len() != before
    }

    /// Names must be unique; anything else means the file was edited badly
    fn duplicate_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.packages
            .iter()
            .find(|p| !seen.insert(p.name.to_lowercase()))
            .map(|p| p.name.as_str())
    }
}

/// Reads and writes the lock file at a fixed path
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the lock file
    ///
    /// A missing file yields an empty lock file. Content that does not parse
    /// is reported as `CorruptLockFile` rather than treated as empty.
    pub fn load(&self) -> Result<LockFile> {
        if !self.path.exists() {
            debug!("No lock file at {}, starting empty", self.path.display());
            return Ok(LockFile::default());
        }

        let data = std::fs::read(&self.path).map_err(|e| {
            Error::FilesystemFailure(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let lock: LockFile = serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;

        if let Some(name) = lock.duplicate_name() {
            return Err(self.corrupt(format!("package '{}' appears more than once", name)));
        }

        debug!("Loaded {} lock entries", lock.packages.len());
        Ok(lock)
    }

    /// Overwrite the persisted lock file with `lock`
    ///
    /// The new content is written and synced to a temporary file next to the
    /// lock file, then renamed over it, so a reader sees either the old or
    /// the new file, never a partial one.
    pub fn save(&self, lock: &LockFile) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(lock)
            .map_err(|e| Error::FilesystemFailure(format!("Failed to serialize lock file: {}", e)))?;
        data.push(b'\n');

        write_atomic(&self.path, &data)?;

        info!("Saved lock file with {} entries", lock.packages.len());
        Ok(())
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptLockFile {
            path: self.path.clone(),
            reason,
        }
    }
}
