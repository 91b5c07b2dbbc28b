// src/operations/mod.rs

//! Operation driver
//!
//! Entry points behind the CLI subcommands. Each one asks the reconciler
//! for a decision, performs the side effects (download, move, delete) and
//! persists the lock file after every package, so a failure never leaves
//! a partial entry and a crash mid-batch leaves a valid prefix of work.

mod outcome;

pub use outcome::{Outcome, Status, Summary};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::lockfile::{InstalledPackage, LockFile, LockStore};
use crate::manifest::{Manifest, Package};
use crate::platform::select_artifact;
use crate::reconcile::{Action, Decision, Reconciler};
use crate::repository::{ArtifactTransfer, observed_version};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

/// A lock entry together with whether its binary is still on disk
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    pub entry: &'a InstalledPackage,
    pub present: bool,
}

/// Drives install/update/sync/remove against one lock file
pub struct Installer<T: ArtifactTransfer> {
    config: Config,
    manifest: Manifest,
    transfer: T,
    store: LockStore,
    lock: LockFile,
}

impl<T: ArtifactTransfer> Installer<T> {
    /// Load the lock file and prepare to run operations
    ///
    /// Fails with `CorruptLockFile` when the persisted state cannot be
    /// trusted.
    pub fn open(config: Config, manifest: Manifest, transfer: T) -> Result<Self> {
        let store = LockStore::new(&config.lock_path);
        let lock = store.load()?;
        debug!(
            "Installer ready: {} declared, {} installed, platform {}",
            manifest.packages.len(),
            lock.entries().len(),
            config.platform
        );

        Ok(Self {
            config,
            manifest,
            transfer,
            store,
            lock,
        })
    }

    /// Current in-memory lock file, always equal to what is on disk
    pub fn lock(&self) -> &LockFile {
        &self.lock
    }

    /// Installed packages in lock file order
    pub fn list(&self) -> Vec<Listing<'_>> {
        self.lock
            .entries()
            .iter()
            .map(|entry| Listing {
                entry,
                present: entry.is_present(),
            })
            .collect()
    }

    /// Decision that `update` would act on, without side effects
    pub fn plan(&self, name: &str, force: bool) -> Decision {
        Reconciler::new(&self.manifest, &self.lock).decide(name, force)
    }

    /// Install a package, reinstalling over an existing entry
    pub fn install(&mut self, name: &str) -> Result<Outcome> {
        if self.manifest.find(name).is_none() {
            return Err(Error::NotDeclared(name.to_string()));
        }
        self.reconcile(name, true)
    }

    /// Bring one package in line with the manifest
    pub fn update(&mut self, name: &str, force: bool) -> Result<Outcome> {
        self.reconcile(name, force)
    }

    /// Update every installed package, one at a time in lock file order
    ///
    /// A recoverable failure is recorded in that package's outcome and the
    /// sweep carries on.
    pub fn update_all(&mut self, force: bool) -> Result<Vec<Outcome>> {
        let names: Vec<String> = self.lock.entries().iter().map(|e| e.name.clone()).collect();
        if names.is_empty() {
            info!("No packages installed");
        }

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            info!("Checking {} for updates", name);
            outcomes.push(self.isolated(&name, force)?);
        }
        Ok(outcomes)
    }

    /// Reinstall every package whose recorded binary is missing
    pub fn sync(&mut self) -> Result<Vec<Outcome>> {
        let missing: Vec<String> = self
            .lock
            .entries()
            .iter()
            .filter(|e| !e.is_present())
            .map(|e| e.name.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(missing.len());
        for name in missing {
            warn!("Binary for {} is missing, reinstalling", name);
            outcomes.push(self.isolated(&name, false)?);
        }
        Ok(outcomes)
    }

    /// Delete a package's binary and its lock entry
    pub fn remove(&mut self, name: &str) -> Result<Outcome> {
        let entry = self
            .lock
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPackage(name.to_string()))?;

        filesystem::remove_binary(&entry.install_path)?;
        self.commit(|lock| {
            lock.remove(&entry.name);
        })?;

        info!("Removed {} {}", entry.name, entry.installed_version);
        Ok(Outcome::new(
            entry.name,
            Status::Removed,
            Some(entry.installed_version),
            None,
        ))
    }

    /// Run one package inside a batch, turning recoverable errors into a
    /// failed outcome
    fn isolated(&mut self, name: &str, force: bool) -> Result<Outcome> {
        match self.reconcile(name, force) {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_recoverable() => {
                warn!("{} failed: {}", name, e);
                let previous = self.lock.get(name).map(|p| p.installed_version.clone());
                Ok(Outcome::failed(name, previous, e))
            }
            Err(e) => Err(e),
        }
    }

    /// Decide, apply and persist for a single package
    fn reconcile(&mut self, name: &str, force: bool) -> Result<Outcome> {
        let decision = self.plan(name, force);
        debug!("{}: {} ({})", name, decision.action, decision.reason);

        let previous = self.lock.get(name).cloned();
        let previous_version = previous.as_ref().map(|p| p.installed_version.clone());

        let status = match decision.action {
            Action::Error => return Err(Error::NotDeclared(name.to_string())),
            Action::Skip => {
                return Ok(Outcome::new(
                    name,
                    Status::Skipped,
                    previous_version.clone(),
                    previous_version,
                ));
            }
            Action::Install => Status::Installed,
            Action::Update => Status::Updated,
            Action::Repair => Status::Repaired,
        };

        let package = self
            .manifest
            .find(name)
            .cloned()
            .ok_or_else(|| Error::NotDeclared(name.to_string()))?;

        info!("{} {} ({})", decision.action, package.name, decision.reason);
        let entry = self.apply(&package)?;
        let new_version = entry.installed_version.clone();
        let new_path = entry.install_path.clone();

        self.commit(|lock| lock.upsert(entry))?;

        // An earlier install somewhere else (e.g. an older bin dir) is now stale
        if let Some(old) = previous {
            let same_file = old
                .install_path
                .canonicalize()
                .is_ok_and(|p| p == new_path);
            if !same_file && old.install_path.exists() {
                if let Err(e) = filesystem::remove_binary(&old.install_path) {
                    warn!("Could not remove old binary: {}", e);
                }
            }
        }

        Ok(Outcome::new(
            package.name,
            status,
            previous_version,
            Some(new_version),
        ))
    }

    /// Download and place the artifact for `package`
    ///
    /// Nothing is persisted here; on error the previous binary (if any) is
    /// untouched because the new one only replaces it by rename.
    fn apply(&self, package: &Package) -> Result<InstalledPackage> {
        if !filesystem::is_plain_file_name(&package.name) {
            return Err(Error::Manifest(format!(
                "Package name '{}' is not a plain file name",
                package.name
            )));
        }
        let artifact = select_artifact(package, &self.config.platform)?;
        let url = package.download_url(artifact);

        std::fs::create_dir_all(&self.config.staging_dir).map_err(|e| {
            Error::FilesystemFailure(format!(
                "Failed to create {}: {}",
                self.config.staging_dir.display(),
                e
            ))
        })?;
        let staged = self
            .config
            .staging_dir
            .join(format!("{}.download", package.name));

        info!(
            "Downloading {} ({}) for {} from {}",
            package.name, package.version, self.config.platform, url
        );
        let report = self
            .transfer
            .fetch(&url, &staged)
            .inspect_err(|_| discard(&staged))?;

        let installed_version =
            observed_version(&report, &artifact.file, &package.name, &package.version);

        let install_path = filesystem::install_binary(&staged, &self.config.bin_dir, &package.name)
            .inspect_err(|_| discard(&staged))?;

        Ok(InstalledPackage {
            name: package.name.clone(),
            installed_version,
            resolved_from: package.version.clone(),
            install_timestamp: Utc::now(),
            platform_os: self.config.platform.os.clone(),
            platform_arch: self.config.platform.arch.clone(),
            install_path,
        })
    }

    /// Apply `change` to a copy of the lock file, save it, then adopt it
    ///
    /// If the save fails the in-memory lock file is left as it was, still
    /// matching the file on disk.
    fn commit(&mut self, change: impl FnOnce(&mut LockFile)) -> Result<()> {
        let mut next = self.lock.clone();
        change(&mut next);
        self.store.save(&next)?;
        self.lock = next;
        Ok(())
    }
}

/// Best-effort cleanup of a staged download
fn discard(staged: &Path) {
    if staged.exists() {
        if let Err(e) = std::fs::remove_file(staged) {
            warn!("Failed to clean up {}: {}", staged.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Artifact;
    use crate::platform::Platform;
    use crate::repository::FetchReport;
    use tempfile::TempDir;

    /// Writes a fixed payload, optionally announcing a version
    struct StaticTransfer {
        version_header: Option<String>,
    }

    impl ArtifactTransfer for StaticTransfer {
        fn fetch(&self, _url: &str, dest: &Path) -> Result<FetchReport> {
            std::fs::write(dest, b"#!/bin/sh\n").map_err(|e| Error::FilesystemFailure(e.to_string()))?;
            Ok(FetchReport {
                version_header: self.version_header.clone(),
            })
        }
    }

    fn package(name: &str, version: &str, os: &str) -> Package {
        Package {
            name: name.to_string(),
            version: version.to_string(),
            base_url: "https://example.com/".to_string(),
            artifacts: vec![Artifact {
                os: os.to_string(),
                arch: "amd64".to_string(),
                file: format!("{}-linux-amd64", name),
            }],
        }
    }

    fn installer(dir: &TempDir, packages: Vec<Package>) -> Installer<StaticTransfer> {
        let config = Config::with_home(dir.path()).with_platform(Platform::new("linux", "amd64"));
        Installer::open(
            config,
            Manifest { packages },
            StaticTransfer {
                version_header: Some("v1.0.0".to_string()),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_install_records_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);

        let outcome = inst.install("fd").unwrap();
        assert!(matches!(outcome.status, Status::Installed));

        let entry = inst.lock().get("fd").unwrap();
        assert_eq!(entry.installed_version, "v1.0.0");
        assert_eq!(entry.resolved_from, "v1.0.0");
        assert_eq!(entry.platform_os, "linux");
        assert!(entry.install_path.exists());
        assert!(entry.install_path.starts_with(dir.path().canonicalize().unwrap()));

        // persisted
        let on_disk = LockStore::new(dir.path().join("goblin.lock")).load().unwrap();
        assert_eq!(&on_disk, inst.lock());
    }

    #[test]
    fn test_install_undeclared() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![]);
        assert!(matches!(inst.install("fd"), Err(Error::NotDeclared(_))));
        assert!(!dir.path().join("goblin.lock").exists());
    }

    #[test]
    fn test_no_matching_artifact_leaves_lock_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "darwin")]);
        let result = inst.install("fd");
        assert!(matches!(result, Err(Error::NoMatchingArtifact { .. })));
        assert!(inst.lock().is_empty());
        assert!(!dir.path().join("goblin.lock").exists());
    }

    #[test]
    fn test_remove_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);
        assert!(matches!(inst.remove("fd"), Err(Error::UnknownPackage(_))));
    }

    #[test]
    fn test_remove_deletes_binary_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);
        inst.install("fd").unwrap();
        let path = inst.lock().get("fd").unwrap().install_path.clone();

        let outcome = inst.remove("fd").unwrap();
        assert!(matches!(outcome.status, Status::Removed));
        assert!(!path.exists());
        assert!(inst.lock().is_empty());
    }

    #[test]
    fn test_remove_with_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);
        inst.install("fd").unwrap();
        std::fs::remove_file(&inst.lock().get("fd").unwrap().install_path).unwrap();

        inst.remove("fd").unwrap();
        assert!(inst.lock().get("fd").is_none());
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);
        assert_eq!(inst.plan("fd", false).action, Action::Install);
        assert!(!dir.path().join("goblin.lock").exists());
        assert!(!dir.path().join("bin").exists());
    }

    #[test]
    fn test_list_reports_missing_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(
            &dir,
            vec![package("fd", "v1.0.0", "linux"), package("bat", "v1.0.0", "linux")],
        );
        inst.install("fd").unwrap();
        inst.install("bat").unwrap();
        std::fs::remove_file(&inst.lock().get("fd").unwrap().install_path).unwrap();

        let listing = inst.list();
        assert_eq!(listing.len(), 2);
        let present: Vec<(&str, bool)> = listing
            .iter()
            .map(|l| (l.entry.name.as_str(), l.present))
            .collect();
        assert!(present.contains(&("fd", false)));
        assert!(present.contains(&("bat", true)));
    }

    #[test]
    fn test_path_like_name_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let config = Config::with_home(&home).with_platform(Platform::new("linux", "amd64"));
        let mut inst = Installer::open(
            config,
            Manifest {
                packages: vec![package("../escaped", "v1.0.0", "linux")],
            },
            StaticTransfer {
                version_header: None,
            },
        )
        .unwrap();

        let result = inst.install("../escaped");
        assert!(matches!(result, Err(Error::Manifest(_))));
        assert!(inst.lock().is_empty());
        assert!(!home.join("escaped").exists());
        assert!(!home.join("escaped.download").exists());
        assert!(!home.join("goblin.lock").exists());
    }

    #[test]
    fn test_failed_save_keeps_lock_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(
            &dir,
            vec![package("fd", "v1.0.0", "linux"), package("bat", "v1.0.0", "linux")],
        );
        inst.install("fd").unwrap();

        let lock_path = dir.path().join("goblin.lock");
        let before = inst.lock().clone();
        let bytes = std::fs::read(&lock_path).unwrap();

        // Park the saved file and occupy its path with a directory so the
        // next rename onto it fails
        let parked = dir.path().join("goblin.lock.parked");
        std::fs::rename(&lock_path, &parked).unwrap();
        std::fs::create_dir(&lock_path).unwrap();
        std::fs::write(lock_path.join("occupied"), b"").unwrap();

        let result = inst.install("bat");
        assert!(matches!(result, Err(Error::FilesystemFailure(_))));
        assert_eq!(inst.lock(), &before);
        assert!(inst.lock().get("bat").is_none());

        let result = inst.update("fd", true);
        assert!(matches!(result, Err(Error::FilesystemFailure(_))));
        assert_eq!(inst.lock(), &before);

        assert!(lock_path.is_dir());
        assert_eq!(std::fs::read(&parked).unwrap(), bytes);

        // The in-memory copy still matches the last successful save
        std::fs::remove_dir_all(&lock_path).unwrap();
        std::fs::rename(&parked, &lock_path).unwrap();
        assert_eq!(LockStore::new(&lock_path).load().unwrap(), before);
    }

    #[test]
    fn test_staging_is_cleaned_after_install() {
        let dir = tempfile::tempdir().unwrap();
        let mut inst = installer(&dir, vec![package("fd", "v1.0.0", "linux")]);
        inst.install("fd").unwrap();
        assert!(!dir.path().join("staging/fd.download").exists());
    }
}
