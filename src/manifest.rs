// src/manifest.rs

//! Manifest model
//!
//! The manifest (`sources.yaml`) is the desired-state source of truth: the
//! list of packages that can be installed and their per-platform artifacts.
//! It is loaded once per invocation and never mutated.

use crate::error::{Error, Result};
use crate::filesystem::is_plain_file_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// One downloadable build of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Operating system, e.g. "linux", "darwin"
    pub os: String,
    /// Architecture, e.g. "amd64", "arm64"
    pub arch: String,
    /// File name appended to the package's base URL
    pub file: String,
}

/// A package as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// "latest" or a version such as "v2.4.1"
    pub version: String,
    pub base_url: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Package {
    /// Full download URL for one of this package's artifacts
    pub fn download_url(&self, artifact: &Artifact) -> String {
        format!("{}{}", self.base_url, artifact.file)
    }
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl Manifest {
    /// Read and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest from {}", path.display());

        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&data)
    }

    /// Parse and validate manifest YAML
    pub fn from_yaml(data: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(data)
            .map_err(|e| Error::Manifest(format!("Invalid manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Package names are the manifest's key and must be unique
    ///
    /// A name also becomes the binary's file name, so it has to be a single
    /// plain path component.
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for pkg in &self.packages {
            if pkg.name.trim().is_empty() {
                return Err(Error::Manifest("Package with empty name".to_string()));
            }
            if !is_plain_file_name(&pkg.name) {
                return Err(Error::Manifest(format!(
                    "Package name '{}' is not a plain file name",
                    pkg.name
                )));
            }
            if !seen.insert(pkg.name.to_lowercase()) {
                return Err(Error::Manifest(format!(
                    "Package '{}' is declared more than once",
                    pkg.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a package by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Package> {
        self.packages
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
packages:
  - name: ripgrep
    version: v14.1.0
    base_url: https://example.com/rg/
    artifacts:
      - os: linux
        arch: amd64
        file: rg-linux-amd64
      - os: darwin
        arch: arm64
        file: rg-darwin-arm64
  - name: fd
    version: latest
    base_url: https://example.com/fd/
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_yaml(SAMPLE).unwrap();
        assert_eq!(manifest.packages.len(), 2);

        let rg = manifest.find("ripgrep").unwrap();
        assert_eq!(rg.version, "v14.1.0");
        assert_eq!(rg.artifacts.len(), 2);
        assert_eq!(
            rg.download_url(&rg.artifacts[0]),
            "https://example.com/rg/rg-linux-amd64"
        );

        // artifacts default to empty
        assert!(manifest.find("fd").unwrap().artifacts.is_empty());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let manifest = Manifest::from_yaml(SAMPLE).unwrap();
        assert_eq!(manifest.find("RipGrep").unwrap().name, "ripgrep");
        assert!(manifest.find("bat").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
packages:
  - { name: fd, version: latest, base_url: "a/" }
  - { name: FD, version: v1.0.0, base_url: "b/" }
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn test_path_like_names_rejected() {
        for name in ["../escaped", "/etc/passwd", "tools/fd", ".."] {
            let yaml = format!(
                "packages:\n  - {{ name: \"{}\", version: latest, base_url: \"a/\" }}\n",
                name
            );
            let err = Manifest::from_yaml(&yaml).unwrap_err();
            assert!(matches!(err, Error::Manifest(_)), "{name}");
        }
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let err = Manifest::from_yaml("packages: [name: {").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Manifest::load(&dir.path().join("sources.yaml"));
        assert!(matches!(result, Err(Error::Manifest(_))));
    }
}
