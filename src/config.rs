// src/config.rs

//! Runtime configuration
//!
//! All paths and the target platform are resolved once and passed to the
//! components that need them, so tests can point goblin at a temporary home
//! and a fake platform.

use crate::error::{Error, Result};
use crate::platform::Platform;
use std::path::{Path, PathBuf};

/// Directory under the user's home holding all goblin state
pub const GOBLIN_DIR: &str = ".goblin";

/// Environment variable overriding the goblin home directory
pub const HOME_ENV: &str = "GOBLIN_HOME";

/// Default location of the published manifest
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/Alexandre1a/goblin-remote/refs/heads/main/sources.yaml";

const LOCK_FILE_NAME: &str = "goblin.lock";
const MANIFEST_DIR: &str = "manifest";
const MANIFEST_NAME: &str = "sources.yaml";
const BIN_DIR: &str = "bin";
const STAGING_DIR: &str = "staging";

/// Resolved configuration for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest_url: String,
    pub lock_path: PathBuf,
    pub bin_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub platform: Platform,
}

impl Config {
    /// Standard layout rooted at `home` for the current platform
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            manifest_path: home.join(MANIFEST_DIR).join(MANIFEST_NAME),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            lock_path: home.join(LOCK_FILE_NAME),
            bin_dir: home.join(BIN_DIR),
            staging_dir: home.join(STAGING_DIR),
            platform: Platform::current(),
            home,
        }
    }

    /// Resolve the goblin home: explicit value, then `GOBLIN_HOME`, then
    /// `~/.goblin`
    pub fn discover(home: Option<&Path>) -> Result<Self> {
        if let Some(home) = home {
            return Ok(Self::with_home(home));
        }

        if let Some(env_home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_home(PathBuf::from(env_home)));
        }

        let user_home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine the home directory".to_string()))?;
        Ok(Self::with_home(user_home.join(GOBLIN_DIR)))
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// The `.yml` spelling the manifest may also have been saved under
    pub fn alt_manifest_path(&self) -> PathBuf {
        self.manifest_path.with_extension("yml")
    }

    /// Whichever manifest file exists locally, preferring `sources.yaml`
    pub fn local_manifest(&self) -> Option<PathBuf> {
        [self.manifest_path.clone(), self.alt_manifest_path()]
            .into_iter()
            .find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = Config::with_home("/tmp/gob");
        assert_eq!(config.lock_path, PathBuf::from("/tmp/gob/goblin.lock"));
        assert_eq!(config.bin_dir, PathBuf::from("/tmp/gob/bin"));
        assert_eq!(
            config.manifest_path,
            PathBuf::from("/tmp/gob/manifest/sources.yaml")
        );
        assert_eq!(
            config.alt_manifest_path(),
            PathBuf::from("/tmp/gob/manifest/sources.yml")
        );
    }

    #[test]
    fn test_explicit_home_wins() {
        let config = Config::discover(Some(Path::new("/srv/goblin"))).unwrap();
        assert_eq!(config.home, PathBuf::from("/srv/goblin"));
    }

    #[test]
    fn test_local_manifest_falls_back_to_yml() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_home(dir.path());
        assert!(config.local_manifest().is_none());

        std::fs::create_dir_all(config.manifest_path.parent().unwrap()).unwrap();
        std::fs::write(config.alt_manifest_path(), "packages: []").unwrap();
        assert_eq!(config.local_manifest(), Some(config.alt_manifest_path()));

        std::fs::write(&config.manifest_path, "packages: []").unwrap();
        assert_eq!(config.local_manifest(), Some(config.manifest_path.clone()));
    }

    #[test]
    fn test_platform_override() {
        let config = Config::with_home("/tmp/gob").with_platform(Platform::new("plan9", "mips"));
        assert_eq!(config.platform.to_string(), "plan9/mips");
    }
}
