// src/version.rs

//! Version comparison for manifest and lock file versions
//!
//! Versions are loose `vMAJOR.MINOR.PATCH` strings. Parsing is permissive:
//! the `v` prefix is optional, missing components count as `0`, and a
//! component without leading digits also counts as `0` instead of failing.
//! Only the first three components are compared.

use std::cmp::Ordering;
use std::path::Path;

/// Manifest version that always tracks the newest published artifact
pub const LATEST: &str = "latest";

/// Installed version recorded when the real version could not be determined
pub const UNKNOWN: &str = "unknown";

/// Compare two version strings
///
/// `"unknown"` sorts before every other value and is equal to itself, so an
/// entry with an undetermined version is always considered out of date.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (a == UNKNOWN, b == UNKNOWN) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    components(a).cmp(&components(b))
}

/// Parse the first three numeric components of a version
fn components(version: &str) -> [u64; 3] {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let mut parts = [0u64; 3];
    for (slot, part) in parts.iter_mut().zip(trimmed.split('.')) {
        *slot = leading_number(part);
    }
    parts
}

/// Leading ASCII digits of a component, `0` when there are none
fn leading_number(part: &str) -> u64 {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().unwrap_or(0)
}

/// Guess a version from an artifact filename
///
/// Strips the last extension and the package name, then accepts the rest
/// when it looks like a version (starts with `v` or contains a dot).
/// `tool-v1.4.0.zip` yields `v1.4.0`; `tool-linux-amd64` yields `None`.
pub fn version_from_filename(filename: &str, package: &str) -> Option<String> {
    let name = filename.trim_end_matches('/');
    let stem = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| name.strip_suffix(&format!(".{}", ext)))
        .unwrap_or(name);

    let rest = stem.replacen(&format!("{}-", package), "", 1);
    let rest = rest.replacen(package, "", 1);

    if rest.starts_with('v') || rest.contains('.') {
        Some(rest)
    } else {
        None
    }
}
