// src/repository/mod.rs

//! Remote access: manifest bootstrap and artifact downloads
//!
//! This module provides functionality for:
//! - Downloading artifacts with retry support
//! - Resolving the version an artifact actually carries
//! - Fetching and refreshing the local manifest copy

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use crate::manifest::Manifest;
use crate::version;
use reqwest::blocking::{Client, Response};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the connectivity probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Response header a server may use to announce the artifact's version
pub const VERSION_HEADER: &str = "X-Version";

/// What a completed transfer reported besides the bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Value of the version header, if the server sent one
    pub version_header: Option<String>,
}

/// Copies a remote artifact to a local path
pub trait ArtifactTransfer {
    /// Download `url` to `dest`
    ///
    /// `dest` must either hold the complete artifact or not exist at all
    /// when this returns.
    fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport>;
}

impl<T: ArtifactTransfer + ?Sized> ArtifactTransfer for &T {
    fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport> {
        (**self).fetch(url, dest)
    }
}

/// Version of a freshly downloaded artifact
///
/// Priority: the server's version header, then a version parsed from the
/// artifact filename, then the version declared in the manifest.
pub fn observed_version(
    report: &FetchReport,
    filename: &str,
    package: &str,
    declared: &str,
) -> String {
    if let Some(header) = report
        .version_header
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return header.to_string();
    }

    version::version_from_filename(filename, package).unwrap_or_else(|| declared.to_string())
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::TransferFailure(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Override the number of attempts made per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// GET `url`, retrying connection failures with linear back-off
    fn get(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::TransferFailure(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::TransferFailure(format!(
                            "Failed to fetch {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Fetch a small text document such as the manifest
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        info!("Fetching {}", url);
        self.get(url)?
            .text()
            .map_err(|e| Error::TransferFailure(format!("Failed to read body of {}: {}", url, e)))
    }

    /// Check that `url` answers at all
    pub fn check_connectivity(&self, url: &str) -> Result<()> {
        self.client
            .head(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .map(|_| ())
            .map_err(|e| Error::TransferFailure(format!("No connectivity to {}: {}", url, e)))
    }
}

impl ArtifactTransfer for RepositoryClient {
    fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport> {
        info!("Downloading {} to {}", url, dest.display());

        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            Error::FilesystemFailure(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;

        let mut response = self.get(url)?;
        let version_header = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Write to a temporary file first so `dest` is never partial
        let mut temp = NamedTempFile::new_in(parent).map_err(|e| {
            Error::FilesystemFailure(format!("Failed to create temp file in {}: {}", parent.display(), e))
        })?;

        io::copy(&mut response, temp.as_file_mut())
            .map_err(|e| Error::TransferFailure(format!("Failed to write downloaded data: {}", e)))?;

        temp.persist(dest).map_err(|e| {
            Error::FilesystemFailure(format!("Failed to move download to {}: {}", dest.display(), e.error))
        })?;

        debug!("Downloaded {} (version header: {:?})", url, version_header);
        Ok(FetchReport { version_header })
    }
}

/// Make sure a manifest exists locally, downloading it on first use
pub fn ensure_manifest(config: &Config, client: &RepositoryClient) -> Result<PathBuf> {
    if let Some(path) = config.local_manifest() {
        debug!("Using local manifest {}", path.display());
        return Ok(path);
    }

    info!("No local manifest, downloading from {}", config.manifest_url);
    download_manifest(config, client)?;
    Ok(config.manifest_path.clone())
}

/// Replace the local manifest with the published one
///
/// The download is validated before anything is overwritten, so a failed
/// refresh leaves the local copy usable.
pub fn refresh_manifest(config: &Config, client: &RepositoryClient) -> Result<()> {
    client.check_connectivity(&config.manifest_url)?;
    download_manifest(config, client)?;

    let alt = config.alt_manifest_path();
    if alt != config.manifest_path && alt.exists() {
        if let Err(e) = fs::remove_file(&alt) {
            warn!("Failed to remove stale manifest {}: {}", alt.display(), e);
        }
    }

    info!("Manifest refreshed");
    Ok(())
}

fn download_manifest(config: &Config, client: &RepositoryClient) -> Result<()> {
    let body = client.fetch_text(&config.manifest_url)?;
    let manifest = Manifest::from_yaml(&body)?;
    debug!("Downloaded manifest with {} packages", manifest.packages.len());
    write_atomic(&config.manifest_path, body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(header: Option<&str>) -> FetchReport {
        FetchReport {
            version_header: header.map(str::to_string),
        }
    }

    #[test]
    fn test_observed_version_prefers_header() {
        let v = observed_version(&report(Some("v3.1.0")), "tool-v3.0.0.tar", "tool", "latest");
        assert_eq!(v, "v3.1.0");
    }

    #[test]
    fn test_observed_version_from_filename() {
        let v = observed_version(&report(None), "tool-v3.0.0.zip", "tool", "latest");
        assert_eq!(v, "v3.0.0");

        // blank header is ignored
        let v = observed_version(&report(Some("  ")), "tool-v3.0.0.zip", "tool", "latest");
        assert_eq!(v, "v3.0.0");
    }

    #[test]
    fn test_observed_version_falls_back_to_manifest() {
        let v = observed_version(&report(None), "tool-linux-amd64", "tool", "latest");
        assert_eq!(v, "latest");
    }

    #[test]
    fn test_fetch_unreachable_is_transfer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool");
        let client = RepositoryClient::new().unwrap().with_max_retries(1);

        let result = client.fetch("http://127.0.0.1:1/tool", &dest);
        assert!(matches!(result, Err(Error::TransferFailure(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_ensure_manifest_uses_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_home(dir.path());
        config.manifest_url = "http://127.0.0.1:1/sources.yaml".to_string();
        write_atomic(&config.manifest_path, b"packages: []").unwrap();

        let client = RepositoryClient::new().unwrap().with_max_retries(1);
        let path = ensure_manifest(&config, &client).unwrap();
        assert_eq!(path, config.manifest_path);
    }

    #[test]
    fn test_refresh_failure_keeps_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_home(dir.path());
        config.manifest_url = "http://127.0.0.1:1/sources.yaml".to_string();
        write_atomic(&config.manifest_path, b"packages: []").unwrap();

        let client = RepositoryClient::new().unwrap().with_max_retries(1);
        assert!(refresh_manifest(&config, &client).is_err());
        assert_eq!(fs::read(&config.manifest_path).unwrap(), b"packages: []");
    }
}
