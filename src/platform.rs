// src/platform.rs

//! Platform detection and artifact selection

use crate::error::{Error, Result};
use crate::manifest::{Artifact, Package};
use std::fmt;

/// Operating system and architecture in manifest vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for
    ///
    /// Manifests name platforms the way release pages usually do
    /// (`darwin`, `amd64`, `arm64`), so Rust target names are mapped.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    fn matches(&self, artifact: &Artifact) -> bool {
        artifact.os.eq_ignore_ascii_case(&self.os) && artifact.arch.eq_ignore_ascii_case(&self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Pick the artifact of `package` built for `platform`
///
/// Matching ignores case. When several artifacts match, the first one in
/// declaration order wins.
pub fn select_artifact<'a>(package: &'a Package, platform: &Platform) -> Result<&'a Artifact> {
    package
        .artifacts
        .iter()
        .find(|art| platform.matches(art))
        .ok_or_else(|| Error::NoMatchingArtifact {
            package: package.name.clone(),
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(os: &str, arch: &str, file: &str) -> Artifact {
        Artifact {
            os: os.to_string(),
            arch: arch.to_string(),
            file: file.to_string(),
        }
    }

    fn package(artifacts: Vec<Artifact>) -> Package {
        Package {
            name: "tool".to_string(),
            version: "v1.0.0".to_string(),
            base_url: "https://example.com/".to_string(),
            artifacts,
        }
    }

    #[test]
    fn test_select_case_insensitive() {
        let pkg = package(vec![
            artifact("darwin", "arm64", "tool-mac"),
            artifact("Linux", "AMD64", "tool-linux"),
        ]);
        let selected = select_artifact(&pkg, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(selected.file, "tool-linux");
    }

    #[test]
    fn test_first_match_wins() {
        let pkg = package(vec![
            artifact("linux", "amd64", "first"),
            artifact("linux", "amd64", "second"),
        ]);
        let selected = select_artifact(&pkg, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(selected.file, "first");
    }

    #[test]
    fn test_no_match() {
        let pkg = package(vec![artifact("windows", "amd64", "tool.exe")]);
        let err = select_artifact(&pkg, &Platform::new("linux", "arm64")).unwrap_err();
        assert!(err.is_recoverable());
        match err {
            Error::NoMatchingArtifact { package, os, arch } => {
                assert_eq!(package, "tool");
                assert_eq!(os, "linux");
                assert_eq!(arch, "arm64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_current_uses_manifest_names() {
        let platform = Platform::current();
        assert_ne!(platform.os, "macos");
        assert_ne!(platform.arch, "x86_64");
        assert_ne!(platform.arch, "aarch64");
    }
}
