// src/lib.rs

//! Goblin Package Installer
//!
//! Installs prebuilt binaries declared in a YAML manifest and tracks them in
//! a JSON lock file.
//!
//! # Architecture
//!
//! - Lock file first: the lock file is the only trusted record of what is
//!   installed, and it is rewritten atomically after every change
//! - Reconciliation: each package's desired state (manifest) is compared
//!   with its observed state (lock file + filesystem) to pick one action
//! - Failure isolation: batch operations record per-package errors and
//!   keep going
//! - Explicit configuration: home directory and platform are passed in,
//!   never read from globals inside the core

pub mod config;
mod error;
pub mod filesystem;
pub mod lockfile;
pub mod manifest;
pub mod operations;
pub mod platform;
pub mod reconcile;
pub mod repository;
pub mod version;

pub use error::{Error, Result};
