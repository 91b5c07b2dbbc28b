// src/reconcile.rs

//! State reconciliation
//!
//! Compares what the manifest declares (desired state) with what the lock
//! file records and the filesystem shows (observed state), and decides what
//! to do with a single package. The reconciler never performs side effects;
//! the operation driver executes the decision exactly once.
//!
//! | Observed    | Condition                                      | Action  |
//! |-------------|------------------------------------------------|---------|
//! | any         | not in manifest                                | error   |
//! | absent      |                                                | install |
//! | orphaned    | entry present, binary missing                  | repair  |
//! | installed   | manifest says `latest`                         | update  |
//! | installed   | forced                                         | update  |
//! | installed   | pin changed and installed version is older     | update  |
//! | installed   | otherwise                                      | skip    |
//!
//! A binary on disk without a lock entry counts as absent: only the lock
//! file is trusted.

use crate::lockfile::{InstalledPackage, LockFile};
use crate::manifest::{Manifest, Package};
use crate::version::{self, LATEST};
use std::cmp::Ordering;
use std::fmt;

/// What the driver should do with a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
    Skip,
    Repair,
    Error,
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Install => "install",
            Action::Update => "update",
            Action::Skip => "skip",
            Action::Repair => "repair",
            Action::Error => "error",
        }
    }

    /// Whether executing this action downloads an artifact
    pub fn needs_transfer(&self) -> bool {
        matches!(self, Action::Install | Action::Update | Action::Repair)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No lock entry (a stray binary without an entry also lands here)
    Absent,
    /// Lock entry and binary both present
    Installed,
    /// Lock entry present, binary missing
    Orphaned,
}

/// Outcome of reconciling one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

impl Decision {
    fn new(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
        }
    }
}

/// Decides per-package actions from a manifest and a lock file
pub struct Reconciler<'a> {
    manifest: &'a Manifest,
    lock: &'a LockFile,
}

impl<'a> Reconciler<'a> {
    pub fn new(manifest: &'a Manifest, lock: &'a LockFile) -> Self {
        Self { manifest, lock }
    }

    /// Observed state of `name`
    pub fn state(&self, name: &str) -> State {
        match self.lock.get(name) {
            None => State::Absent,
            Some(entry) if entry.is_present() => State::Installed,
            Some(_) => State::Orphaned,
        }
    }

    /// Decide what to do with `name`
    pub fn decide(&self, name: &str, force: bool) -> Decision {
        let Some(declared) = self.manifest.find(name) else {
            return Decision::new(
                Action::Error,
                format!("'{}' is not declared in the manifest", name),
            );
        };

        match (self.state(name), self.lock.get(name)) {
            (State::Installed, Some(entry)) => decide_installed(declared, entry, force),
            (State::Orphaned, Some(entry)) => Decision::new(
                Action::Repair,
                format!("{} is missing from disk", entry.install_path.display()),
            ),
            _ => Decision::new(Action::Install, "not installed"),
        }
    }
}

fn decide_installed(declared: &Package, entry: &InstalledPackage, force: bool) -> Decision {
    if declared.version == LATEST {
        return Decision::new(Action::Update, "manifest tracks latest");
    }

    if force {
        return Decision::new(Action::Update, "forced");
    }

    if declared.version != entry.resolved_from
        && version::compare(&entry.installed_version, &declared.version) == Ordering::Less
    {
        return Decision::new(
            Action::Update,
            format!("{} -> {}", entry.installed_version, declared.version),
        );
    }

    Decision::new(
        Action::Skip,
        format!("up to date ({})", entry.installed_version),
    )
}
