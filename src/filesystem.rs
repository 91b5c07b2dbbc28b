// src/filesystem.rs

//! Placement of downloaded binaries

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Permissions given to installed binaries
#[cfg(unix)]
const BINARY_MODE: u32 = 0o755;

/// Replace `path` with `data` in one rename
///
/// The bytes are written and synced to a temporary file in the same
/// directory first, so readers see either the old content or the new one.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| {
        Error::FilesystemFailure(format!("Failed to create directory {}: {}", parent.display(), e))
    })?;

    let write_err = |e: std::io::Error| {
        Error::FilesystemFailure(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(data).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    sync_dir(parent).map_err(write_err)
}

/// Flush a directory entry so a completed rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Whether `name` can be used as a file name inside a single directory
///
/// Rejects anything that would resolve elsewhere once joined: separators,
/// `.`/`..` and absolute paths.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) => c.to_str() == Some(name),
        _ => false,
    }
}

/// Move a fully downloaded file to `<bin_dir>/<name>` and make it executable
///
/// The move is a rename, so an existing binary is replaced in one step and
/// stays intact if anything before the rename failed. Returns the absolute
/// path of the installed binary.
pub fn install_binary(staged: &Path, bin_dir: &Path, name: &str) -> Result<PathBuf> {
    if !is_plain_file_name(name) {
        return Err(Error::FilesystemFailure(format!(
            "Refusing to install '{}' outside {}",
            name,
            bin_dir.display()
        )));
    }

    fs::create_dir_all(bin_dir).map_err(|e| {
        Error::FilesystemFailure(format!("Failed to create {}: {}", bin_dir.display(), e))
    })?;

    let target = bin_dir.join(name);
    fs::rename(staged, &target).map_err(|e| {
        Error::FilesystemFailure(format!(
            "Failed to move {} to {}: {}",
            staged.display(),
            target.display(),
            e
        ))
    })?;

    set_executable(&target)?;

    let absolute = target.canonicalize().map_err(|e| {
        Error::FilesystemFailure(format!("Failed to resolve {}: {}", target.display(), e))
    })?;
    debug!("Installed binary at {}", absolute.display());
    Ok(absolute)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(BINARY_MODE)).map_err(|e| {
        Error::FilesystemFailure(format!("Failed to chmod {}: {}", path.display(), e))
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Delete an installed binary; a file that is already gone is not an error
pub fn remove_binary(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} was already missing", path.display());
            Ok(())
        }
        Err(e) => Err(Error::FilesystemFailure(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}
