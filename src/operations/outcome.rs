// src/operations/outcome.rs

//! Per-package results reported by the operation driver

use crate::error::Error;
use std::fmt;

/// What happened to one package
#[derive(Debug)]
pub enum Status {
    Installed,
    Updated,
    Repaired,
    Skipped,
    Removed,
    Failed(Error),
}

/// Result of running one operation against one package
#[derive(Debug)]
pub struct Outcome {
    pub name: String,
    pub status: Status,
    pub previous_version: Option<String>,
    pub new_version: Option<String>,
}

impl Outcome {
    pub fn new(
        name: impl Into<String>,
        status: Status,
        previous_version: Option<String>,
        new_version: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            previous_version,
            new_version,
        }
    }

    /// A recoverable error recorded against a single package
    pub fn failed(name: impl Into<String>, previous_version: Option<String>, error: Error) -> Self {
        Self::new(name, Status::Failed(error), previous_version, None)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failed(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            Status::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let new = self.new_version.as_deref().unwrap_or("?");
        match &self.status {
            Status::Installed => write!(f, "✓ {}: installed ({})", self.name, new),
            Status::Updated => match &self.previous_version {
                Some(prev) => write!(f, "✓ {}: {} -> {}", self.name, prev, new),
                None => write!(f, "✓ {}: updated ({})", self.name, new),
            },
            Status::Repaired => write!(f, "✓ {}: repaired ({})", self.name, new),
            Status::Skipped => write!(f, "- {}: up to date ({})", self.name, new),
            Status::Removed => write!(
                f,
                "✓ {}: removed ({})",
                self.name,
                self.previous_version.as_deref().unwrap_or("?")
            ),
            Status::Failed(e) => write!(f, "✗ {}: failed ({})", self.name, e),
        }
    }
}

/// Counts over a batch of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    /// Installed, updated or repaired
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(outcomes: &[Outcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, o| {
            acc.total += 1;
            match o.status {
                Status::Skipped => acc.skipped += 1,
                Status::Failed(_) => acc.failed += 1,
                _ => acc.changed += 1,
            }
            acc
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} packages, {} changed, {} skipped, {} failed",
            self.total, self.changed, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_lines() {
        let updated = Outcome::new(
            "fd",
            Status::Updated,
            Some("v1.0.0".into()),
            Some("v1.1.0".into()),
        );
        assert_eq!(updated.to_string(), "✓ fd: v1.0.0 -> v1.1.0");

        let skipped = Outcome::new("rg", Status::Skipped, Some("v2".into()), Some("v2".into()));
        assert_eq!(skipped.to_string(), "- rg: up to date (v2)");

        let failed = Outcome::failed("bat", None, Error::TransferFailure("HTTP 404".into()));
        assert!(failed.is_failure());
        assert_eq!(failed.to_string(), "✗ bat: failed (Transfer failed: HTTP 404)");
    }

    #[test]
    fn test_summary() {
        let outcomes = vec![
            Outcome::new("a", Status::Updated, None, Some("v1".into())),
            Outcome::new("b", Status::Skipped, None, None),
            Outcome::failed("c", None, Error::NotDeclared("c".into())),
            Outcome::new("d", Status::Repaired, None, Some("v1".into())),
        ];
        let summary = Summary::of(&outcomes);
        assert_eq!(
            summary,
            Summary {
                total: 4,
                changed: 2,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(
            summary.to_string(),
            "Total: 4 packages, 2 changed, 1 skipped, 1 failed"
        );
    }
}
