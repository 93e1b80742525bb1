// src/repository/mod.rs

//! Repository snapshots
//!
//! This module provides:
//! - The `PackageRecord` triple decoded from a repository database
//! - Reading `<repo>.db.tar.gz` archives into package collections
//! - Naming rules shared by the planner and executor (signatures,
//!   database/metadata files, package artifacts)

mod database;

pub use database::{read_database, read_database_or_empty};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Suffix of detached signature files
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// One package as recorded in a repository database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Artifact file name as stored in the repository
    pub filename: String,

    /// Package name
    pub pkgname: String,

    /// Full package version (`[epoch:]version-release`)
    pub version: String,
}

impl PackageRecord {
    pub fn new(
        filename: impl Into<String>,
        pkgname: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            pkgname: pkgname.into(),
            version: version.into(),
        }
    }
}

/// File name of a repository database (`core` -> `core.db.tar.gz`)
pub fn database_filename(repo_name: &str) -> String {
    format!("{}.db.tar.gz", repo_name)
}

/// Detached signature name for an artifact
pub fn signature_name(artifact: &str) -> String {
    format!("{}{}", artifact, SIGNATURE_SUFFIX)
}

pub fn is_signature(name: &str) -> bool {
    name.ends_with(SIGNATURE_SUFFIX)
}

/// True for repository database and file-list metadata
/// (`core.db`, `core.db.tar.gz`, `core.files.sig`, ...)
///
/// Any name containing `.db` or `.files` counts, so the mirror never fetches
/// something that might be metadata.
pub fn is_database_file(name: &str) -> bool {
    name.contains(".db") || name.contains(".files")
}

/// True for built package files (`*.pkg.tar.*`), excluding signatures
pub fn is_package_artifact(name: &str) -> bool {
    name.contains(".pkg.tar") && !is_signature(name)
}

/// List package artifacts physically present in a directory, sorted by name
pub fn list_artifacts(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if is_package_artifact(&name) {
            artifacts.push(name);
        }
    }

    artifacts.sort();
    Ok(artifacts)
}
