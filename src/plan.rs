// src/plan.rs

//! Transfer planning
//!
//! Turns reconciliation results into a flat list of promote/delete
//! operations. Every operation covers an artifact together with its
//! detached signature. Plans always list deletions before promotions.

use crate::config::RepoLayout;
use crate::error::{Error, Result};
use crate::reconcile::{StalePolicy, reconcile};
use crate::repository::{PackageRecord, SIGNATURE_SUFFIX, is_database_file, signature_name};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where an artifact lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// A local directory; the artifact name is relative to it
    Directory(PathBuf),
    /// The configured object store; the artifact name is the relative key
    Store,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Directory(dir) => write!(f, "{}", dir.display()),
            Location::Store => f.write_str("object store"),
        }
    }
}

/// One unit of work for the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TransferOperation {
    /// Copy `artifact` and `artifact.sig` from one location to another
    Promote {
        from: Location,
        to: Location,
        artifact: String,
    },
    /// Remove `artifact` and `artifact.sig` from a location
    Delete { target: Location, artifact: String },
}

impl TransferOperation {
    pub fn artifact(&self) -> &str {
        match self {
            TransferOperation::Promote { artifact, .. } => artifact,
            TransferOperation::Delete { artifact, .. } => artifact,
        }
    }

    pub fn signature(&self) -> String {
        signature_name(self.artifact())
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, TransferOperation::Delete { .. })
    }

    /// True if executing this operation needs the object store
    pub fn touches_store(&self) -> bool {
        match self {
            TransferOperation::Promote { from, to, .. } => {
                *from == Location::Store || *to == Location::Store
            }
            TransferOperation::Delete { target, .. } => *target == Location::Store,
        }
    }
}

impl fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOperation::Promote { from, to, artifact } => {
                write!(f, "promote {} ({} -> {})", artifact, from, to)
            }
            TransferOperation::Delete { target, artifact } => {
                write!(f, "delete {} ({})", artifact, target)
            }
        }
    }
}

/// Bring a local mirror in line with the published remote
///
/// Remote records strictly older than a local build are deleted from the
/// store. Remote packages the local index lacks are fetched into
/// `local_dir`, skipping database and file-list metadata.
pub fn plan_mirror_sync(
    local: &[PackageRecord],
    remote: &[PackageRecord],
    local_dir: &Path,
) -> Vec<TransferOperation> {
    let result = reconcile(local, remote, StalePolicy::Newer);
    let stale_files = result.stale_filenames();

    let mut deletes = Vec::new();
    let mut seen = HashSet::new();
    for record in &result.stale {
        if seen.insert(record.filename.as_str()) {
            deletes.push(TransferOperation::Delete {
                target: Location::Store,
                artifact: record.filename.clone(),
            });
        }
    }

    let local_files: HashSet<&str> = local.iter().map(|r| r.filename.as_str()).collect();

    let mut fetches = Vec::new();
    for record in remote {
        let name = record.filename.as_str();
        if stale_files.contains(name)
            || local_files.contains(name)
            || is_database_file(name)
            || !seen.insert(name)
        {
            continue;
        }
        fetches.push(TransferOperation::Promote {
            from: Location::Store,
            to: Location::Directory(local_dir.to_path_buf()),
            artifact: record.filename.clone(),
        });
    }

    debug!(
        "Mirror plan: {} deletion(s), {} fetch(es)",
        deletes.len(),
        fetches.len()
    );
    deletes.extend(fetches);
    deletes
}

/// Assemble the complete next repository state in `layout.output_dir`
///
/// - Source packages that are new, or whose published counterpart is stale,
///   are promoted from the source directory.
/// - Every artifact present in the destination directory that is not stale
///   is copied forward unchanged.
/// - Stale published artifacts are deleted from the store, unless the
///   promotion writes an object with the very same name.
pub fn plan_promotion(
    source: &[PackageRecord],
    dest: &[PackageRecord],
    stale: &[PackageRecord],
    dest_artifacts: &[String],
    layout: &RepoLayout,
) -> Vec<TransferOperation> {
    let stale_names: HashSet<&str> = stale.iter().map(|r| r.pkgname.as_str()).collect();
    let stale_files: HashSet<&str> = stale.iter().map(|r| r.filename.as_str()).collect();
    let dest_names: HashSet<&str> = dest.iter().map(|r| r.pkgname.as_str()).collect();

    let output = Location::Directory(layout.output_dir.clone());

    let mut promoted = HashSet::new();
    let mut promotions = Vec::new();
    for record in source {
        let name = record.pkgname.as_str();
        if (stale_names.contains(name) || !dest_names.contains(name))
            && promoted.insert(record.filename.clone())
        {
            promotions.push(TransferOperation::Promote {
                from: Location::Directory(layout.source_dir.clone()),
                to: output.clone(),
                artifact: record.filename.clone(),
            });
        }
    }

    let mut retained = Vec::new();
    for artifact in dest_artifacts {
        if stale_files.contains(artifact.as_str()) || promoted.contains(artifact) {
            continue;
        }
        retained.push(TransferOperation::Promote {
            from: Location::Directory(layout.dest_dir.clone()),
            to: output.clone(),
            artifact: artifact.clone(),
        });
    }

    let mut deleted = HashSet::new();
    let mut plan: Vec<TransferOperation> = stale
        .iter()
        .filter(|r| !promoted.contains(&r.filename) && deleted.insert(r.filename.as_str()))
        .map(|r| TransferOperation::Delete {
            target: Location::Store,
            artifact: r.filename.clone(),
        })
        .collect();

    debug!(
        "Promotion plan: {} deletion(s), {} new, {} retained",
        plan.len(),
        promotions.len(),
        retained.len()
    );
    plan.extend(promotions);
    plan.extend(retained);
    plan
}

/// Upload everything under `output_dir` to the store
///
/// Keys are the paths relative to `output_dir`. Signatures ride along with
/// their artifact; a signature without a matching artifact is uploaded on
/// its own.
pub fn plan_upload(output_dir: &Path) -> Result<Vec<TransferOperation>> {
    if !output_dir.is_dir() {
        return Err(Error::NotFound(output_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(output_dir, output_dir, &mut files)?;
    files.sort();

    let present: HashSet<&str> = files.iter().map(String::as_str).collect();
    let plan = files
        .iter()
        .filter(|name| {
            !name
                .strip_suffix(SIGNATURE_SUFFIX)
                .is_some_and(|artifact| present.contains(artifact))
        })
        .map(|name| TransferOperation::Promote {
            from: Location::Directory(output_dir.to_path_buf()),
            to: Location::Store,
            artifact: name.clone(),
        })
        .collect();

    Ok(plan)
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        // Follow links: repo-add publishes `<repo>.db` as a symlink
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Skipping dangling link {}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            collect_files(root, &path, files)?;
        } else if meta.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(key);
        }
    }
    Ok(())
}
