// src/pipeline.rs

//! Per-run entry points
//!
//! Each pipeline reads its inputs, plans, and hands the plan to an
//! [`Executor`]. With `dry_run` set the plan is returned without touching
//! anything.

use crate::config::RepoLayout;
use crate::error::{Error, Result};
use crate::plan::{TransferOperation, plan_mirror_sync, plan_promotion, plan_upload};
use crate::reconcile::{StalePolicy, find_stale};
use crate::repository::{database_filename, list_artifacts, read_database, read_database_or_empty};
use crate::transfer::{ExecutionReport, Executor};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// What a pipeline run planned and, unless it was a dry run, did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub operations: Vec<TransferOperation>,
    pub report: Option<ExecutionReport>,
}

impl RunSummary {
    fn planned(operations: Vec<TransferOperation>) -> Self {
        Self {
            operations,
            report: None,
        }
    }
}

fn run(executor: &Executor, operations: Vec<TransferOperation>, dry_run: bool) -> Result<RunSummary> {
    if dry_run {
        for op in &operations {
            info!("[dry run] {}", op);
        }
        return Ok(RunSummary::planned(operations));
    }

    let report = executor.execute(&operations)?;
    Ok(RunSummary {
        operations,
        report: Some(report),
    })
}

/// Assemble the next repository state from freshly built packages
///
/// The source database must exist. A missing destination database means
/// nothing has been published yet and every source package is promoted.
/// Stale objects are deleted from the store only when the executor has one.
pub fn promote(layout: &RepoLayout, executor: &Executor, dry_run: bool) -> Result<RunSummary> {
    let source = read_database(&layout.source_database())?;
    let dest = read_database_or_empty(&layout.dest_database())?;
    info!(
        "Promoting {}: {} built, {} published",
        layout.repo_name,
        source.len(),
        dest.len()
    );

    let stale = find_stale(&source, &dest, StalePolicy::NewerOrEqual);
    for record in &stale {
        info!("{} {} is superseded", record.pkgname, record.version);
    }

    let dest_artifacts = match list_artifacts(&layout.dest_dir) {
        Ok(artifacts) => artifacts,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut operations = plan_promotion(&source, &dest, &stale, &dest_artifacts, layout);
    if executor.store().is_none() {
        operations.retain(|op| {
            if op.touches_store() {
                info!("No object store configured, skipping: {}", op);
            }
            !op.touches_store()
        });
    }

    if !dry_run {
        reset_dir(&layout.output_dir)?;
    }
    run(executor, operations, dry_run)
}

/// Bring `local_dir` in line with the repository published in the store
///
/// When the store holds no database yet this is a first run and nothing
/// happens. Otherwise the local database `<repo>.db.tar.gz` must exist in
/// `local_dir`.
pub fn mirror(
    repo_name: &str,
    local_dir: &Path,
    executor: &Executor,
    dry_run: bool,
) -> Result<RunSummary> {
    let store = executor
        .store()
        .ok_or_else(|| Error::Config("mirroring requires an object store".to_string()))?;
    let db_name = database_filename(repo_name);

    if !store.head_exists(&db_name)? {
        info!("No remote {} found, treating as first run", db_name);
        return Ok(RunSummary::planned(Vec::new()));
    }

    let local = read_database(&local_dir.join(&db_name))?;

    let scratch = tempfile::Builder::new().prefix("pkgsync-remote-").tempdir()?;
    let remote_db = scratch.path().join(&db_name);
    store.get(&db_name, &remote_db)?;
    let remote = read_database(&remote_db)?;

    info!(
        "Mirroring {}: {} local, {} remote",
        repo_name,
        local.len(),
        remote.len()
    );

    let operations = plan_mirror_sync(&local, &remote, local_dir);
    run(executor, operations, dry_run)
}

/// Upload every file below `output_dir` to the store
pub fn upload(output_dir: &Path, executor: &Executor, dry_run: bool) -> Result<RunSummary> {
    if executor.store().is_none() {
        return Err(Error::Config("uploading requires an object store".to_string()));
    }

    let operations = plan_upload(output_dir)?;
    if operations.is_empty() {
        warn!("Nothing to upload in {}", output_dir.display());
    }
    run(executor, operations, dry_run)
}

fn reset_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir)?;
    Ok(())
}
