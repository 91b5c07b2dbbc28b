// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for Goblin
#[derive(Error, Debug)]
pub enum Error {
    /// Package is not declared in the manifest
    #[error("Package '{0}' is not declared in the manifest")]
    NotDeclared(String),

    /// The manifest has no artifact for the running platform
    #[error("No artifact for package '{package}' matches {os}/{arch}")]
    NoMatchingArtifact {
        package: String,
        os: String,
        arch: String,
    },

    /// Network or HTTP failure while transferring a file
    #[error("Transfer failed: {0}")]
    TransferFailure(String),

    /// Permission, move or write failure on the local filesystem
    #[error("Filesystem error: {0}")]
    FilesystemFailure(String),

    /// The persisted lock file cannot be trusted
    #[error("Lock file {} is corrupt: {reason}", path.display())]
    CorruptLockFile { path: PathBuf, reason: String },

    /// Package has no lock entry
    #[error("Package '{0}' is not installed")]
    UnknownPackage(String),

    /// Manifest could not be read or is invalid
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a batch operation may record this error against a single
    /// package and carry on with the others.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotDeclared(_)
                | Error::NoMatchingArtifact { .. }
                | Error::TransferFailure(_)
                | Error::FilesystemFailure(_)
        )
    }
}

/// Result type alias using Goblin's Error type
pub type Result<T> = std::result::Result<T, Error>;
