// src/transfer.rs

//! Transfer executor
//!
//! Runs a plan against the local filesystem and an [`ObjectStore`]:
//! - Deletions run first, promotions only start once every deletion succeeded
//! - Operations within a phase run concurrently on the file pool
//! - Objects at or above the chunk size are uploaded as multipart sessions
//!   whose parts run concurrently on a separate chunk pool
//! - A failed part aborts its session; no partial object is ever committed
//! - Signature failures are logged and counted, never fatal

use crate::config::TransferConfig;
use crate::error::{Error, Result, StoreOp};
use crate::plan::{Location, TransferOperation};
use crate::store::{CompletedPart, ObjectStore};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use tracing::{debug, error, info, warn};

/// Aggregate outcome of one [`Executor::execute`] call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Artifacts written to the store
    pub uploaded: usize,
    /// Artifacts fetched from the store
    pub downloaded: usize,
    /// Artifacts copied between local directories
    pub copied: usize,
    /// Artifacts removed
    pub deleted: usize,
    /// Uploads that went through a multipart session
    pub multipart_sessions: usize,
    pub bytes_transferred: u64,
    pub signatures_transferred: usize,
    /// Signature transfers or deletions that failed and were skipped
    pub signatures_skipped: usize,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            uploaded: 0,
            downloaded: 0,
            copied: 0,
            deleted: 0,
            multipart_sessions: 0,
            bytes_transferred: 0,
            signatures_transferred: 0,
            signatures_skipped: 0,
        }
    }

    /// Artifact-level operations that completed
    pub fn completed(&self) -> usize {
        self.uploaded + self.downloaded + self.copied + self.deleted
    }

    fn record(&mut self, outcome: Outcome, signature: bool) {
        match outcome {
            Outcome::Uploaded { bytes, multipart } => {
                self.bytes_transferred += bytes;
                if multipart {
                    self.multipart_sessions += 1;
                }
                if !signature {
                    self.uploaded += 1;
                }
            }
            Outcome::Downloaded { bytes } => {
                self.bytes_transferred += bytes;
                if !signature {
                    self.downloaded += 1;
                }
            }
            Outcome::Copied { bytes } => {
                self.bytes_transferred += bytes;
                if !signature {
                    self.copied += 1;
                }
            }
            Outcome::Deleted => {
                if !signature {
                    self.deleted += 1;
                }
            }
        }
        if signature {
            self.signatures_transferred += 1;
        }
    }
}

/// What a single object transfer did
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Uploaded { bytes: u64, multipart: bool },
    Downloaded { bytes: u64 },
    Copied { bytes: u64 },
    Deleted,
}

/// State of one in-flight multipart upload
#[derive(Debug)]
pub struct UploadSession {
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
            parts: Vec::new(),
        }
    }

    /// Record a finished part; parts may arrive in any order
    pub fn record(&mut self, part_number: i32, etag: String) {
        self.parts.push(CompletedPart { part_number, etag });
    }

    /// Parts in ascending order, checked to be exactly `1..=expected`
    pub fn completed_parts(mut self, expected: i32) -> Result<Vec<CompletedPart>> {
        self.parts.sort_by_key(|p| p.part_number);

        let contiguous = self.parts.len() == expected as usize
            && self
                .parts
                .iter()
                .zip(1..)
                .all(|(part, number)| part.part_number == number);
        if !contiguous {
            return Err(Error::store(
                StoreOp::CompleteMultipart,
                self.key,
                format!(
                    "expected parts 1..={}, have {:?}",
                    expected,
                    self.parts.iter().map(|p| p.part_number).collect::<Vec<_>>()
                ),
            ));
        }
        Ok(self.parts)
    }
}

/// Executes transfer plans with bounded concurrency
pub struct Executor {
    store: Option<Arc<dyn ObjectStore>>,
    config: TransferConfig,
    file_pool: ThreadPool,
    chunk_pool: ThreadPool,
}

impl Executor {
    /// Executor that can reach an object store
    pub fn new(store: Arc<dyn ObjectStore>, config: TransferConfig) -> Result<Self> {
        Self::build(Some(store), config)
    }

    /// Executor for purely local plans; store operations fail
    pub fn local(config: TransferConfig) -> Result<Self> {
        Self::build(None, config)
    }

    fn build(store: Option<Arc<dyn ObjectStore>>, config: TransferConfig) -> Result<Self> {
        config.validate()?;

        let pool = |name: &'static str| {
            ThreadPoolBuilder::new()
                .num_threads(config.concurrency)
                .thread_name(move |i| format!("pkgsync-{}-{}", name, i))
                .build()
                .map_err(|e| Error::Config(format!("Failed to build {} pool: {}", name, e)))
        };

        Ok(Self {
            store,
            config,
            file_pool: pool("file")?,
            chunk_pool: pool("chunk")?,
        })
    }

    pub fn store(&self) -> Option<&dyn ObjectStore> {
        self.store.as_deref()
    }

    fn require_store(&self) -> Result<&dyn ObjectStore> {
        self.store()
            .ok_or_else(|| Error::Config("no object store configured".to_string()))
    }

    /// Run every operation of a plan
    ///
    /// Failures are isolated per operation: everything already dispatched in
    /// the current phase drains before the run reports
    /// [`Error::TransferFailed`] with the first failure in plan order.
    pub fn execute(&self, operations: &[TransferOperation]) -> Result<ExecutionReport> {
        let report = Mutex::new(ExecutionReport::new());
        let (deletes, promotes): (Vec<&TransferOperation>, Vec<&TransferOperation>) =
            operations.iter().partition(|op| op.is_delete());

        info!(
            "Executing {} deletion(s) and {} promotion(s)",
            deletes.len(),
            promotes.len()
        );

        let mut failures = self.run_phase(&deletes, &report);
        if failures.is_empty() {
            failures = self.run_phase(&promotes, &report);
        } else if !promotes.is_empty() {
            warn!(
                "Skipping {} promotion(s) because deletions failed",
                promotes.len()
            );
        }

        let mut report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
        report.finished_at = Some(Utc::now());

        if failures.is_empty() {
            info!(
                "Transfer complete: {} uploaded, {} downloaded, {} copied, {} deleted ({} bytes)",
                report.uploaded,
                report.downloaded,
                report.copied,
                report.deleted,
                report.bytes_transferred
            );
            return Ok(report);
        }

        let failed = failures.len();
        let first = failures.swap_remove(0);
        Err(Error::TransferFailed {
            failed,
            first: Box::new(first),
        })
    }

    fn run_phase(
        &self,
        operations: &[&TransferOperation],
        report: &Mutex<ExecutionReport>,
    ) -> Vec<Error> {
        self.file_pool.install(|| {
            operations
                .par_iter()
                .filter_map(|op| {
                    self.run(op, report)
                        .err()
                        .inspect(|e| error!("Failed to {}: {}", op, e))
                })
                .collect()
        })
    }

    fn run(&self, op: &TransferOperation, report: &Mutex<ExecutionReport>) -> Result<()> {
        let update = |outcome: Option<Outcome>, signature: bool| {
            let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Some(outcome) => report.record(outcome, signature),
                None => report.signatures_skipped += 1,
            }
        };

        let signature = op.signature();
        match op {
            TransferOperation::Promote { from, to, artifact } => {
                debug!("Starting {}", op);
                let outcome = self.transfer(from, to, artifact)?;
                update(Some(outcome), false);

                match self.transfer(from, to, &signature) {
                    Ok(outcome) => update(Some(outcome), true),
                    Err(e) => {
                        warn!("Signature {} not transferred: {}", signature, e);
                        update(None, true);
                    }
                }
            }
            TransferOperation::Delete { target, artifact } => {
                self.remove(target, artifact)?;
                info!("Deleted {} from {}", artifact, target);
                update(Some(Outcome::Deleted), false);

                match self.remove(target, &signature) {
                    Ok(()) => update(Some(Outcome::Deleted), true),
                    Err(e) => {
                        warn!("Signature {} not deleted: {}", signature, e);
                        update(None, true);
                    }
                }
            }
        }
        Ok(())
    }

    /// Move one object between two locations
    fn transfer(&self, from: &Location, to: &Location, name: &str) -> Result<Outcome> {
        match (from, to) {
            (Location::Directory(dir), Location::Store) => {
                self.upload(self.require_store()?, &dir.join(name), name)
            }
            (Location::Store, Location::Directory(dir)) => {
                let bytes = download(self.require_store()?, name, &dir.join(name))?;
                Ok(Outcome::Downloaded { bytes })
            }
            (Location::Directory(src), Location::Directory(dst)) => {
                let bytes = copy_local(&src.join(name), &dst.join(name))?;
                Ok(Outcome::Copied { bytes })
            }
            (Location::Store, Location::Store) => Err(Error::Config(
                "promotion from the store to itself is not supported".to_string(),
            )),
        }
    }

    fn remove(&self, target: &Location, name: &str) -> Result<()> {
        match target {
            Location::Store => self.require_store()?.delete(name),
            Location::Directory(dir) => {
                let path = dir.join(name);
                fs::remove_file(&path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::NotFound(path),
                    _ => e.into(),
                })
            }
        }
    }

    fn upload(&self, store: &dyn ObjectStore, path: &Path, key: &str) -> Result<Outcome> {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        if size < self.config.chunk_size {
            debug!("Uploading {} ({} bytes)", key, size);
            store.put(key, fs::read(path)?)?;
            return Ok(Outcome::Uploaded {
                bytes: size,
                multipart: false,
            });
        }

        self.upload_multipart(store, path, key, size)?;
        Ok(Outcome::Uploaded {
            bytes: size,
            multipart: true,
        })
    }

    /// Chunked upload; commits all parts or aborts the session
    fn upload_multipart(
        &self,
        store: &dyn ObjectStore,
        path: &Path,
        key: &str,
        size: u64,
    ) -> Result<()> {
        let chunk_size = self.config.chunk_size;
        let part_count = i32::try_from(size.div_ceil(chunk_size)).map_err(|_| {
            Error::Config(format!("{} needs too many parts; raise the chunk size", key))
        })?;

        info!(
            "Starting multipart upload for {} ({:.2} MiB, {} parts)",
            key,
            size as f64 / (1024.0 * 1024.0),
            part_count
        );

        let upload_id = store.create_multipart(key)?;
        let mut session = UploadSession::new(key, upload_id.clone());

        let failed = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();
        self.chunk_pool.scope(|scope| {
            for part_number in 1..=part_count {
                let tx = tx.clone();
                let failed = &failed;
                let upload_id = upload_id.as_str();
                scope.spawn(move |_| {
                    // Once a sibling part failed the session is lost anyway
                    if failed.load(Ordering::Relaxed) {
                        return;
                    }
                    let offset = (part_number as u64 - 1) * chunk_size;
                    let result = read_chunk(path, offset, chunk_size)
                        .and_then(|body| store.upload_part(key, upload_id, part_number, body));
                    if result.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    let _ = tx.send((part_number, result));
                });
            }
        });
        drop(tx);

        // Results arrive in completion order, not part order
        let mut first_failure: Option<(i32, Error)> = None;
        for (part_number, result) in rx {
            match result {
                Ok(etag) => {
                    debug!("Uploaded part {}/{} of {}", part_number, part_count, key);
                    session.record(part_number, etag);
                }
                Err(e) => {
                    error!("Failed to upload part {} of {}: {}", part_number, key, e);
                    if first_failure.as_ref().is_none_or(|(n, _)| part_number < *n) {
                        first_failure = Some((part_number, e));
                    }
                }
            }
        }

        let result = match first_failure {
            Some((part_number, cause)) => Err(Error::MultipartAborted {
                key: key.to_string(),
                part_number,
                source: Box::new(cause),
            }),
            None => session
                .completed_parts(part_count)
                .and_then(|parts| store.complete_multipart(key, &upload_id, &parts)),
        };

        match result {
            Ok(()) => {
                info!("Successfully uploaded {}", key);
                Ok(())
            }
            Err(e) => {
                match store.abort_multipart(key, &upload_id) {
                    Ok(()) => info!("Aborted multipart upload for {}", key),
                    Err(abort_err) => warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id, key, abort_err
                    ),
                }
                Err(e)
            }
        }
    }
}

fn read_chunk(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut body = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut body)?;
    Ok(body)
}

/// Hidden sibling a download lands in before being renamed into place
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.partial", name))
}

fn download(store: &dyn ObjectStore, key: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(dest);
    if let Err(e) = store.get(key, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, dest)?;

    info!("Downloaded {} to {}", key, dest.display());
    Ok(fs::metadata(dest)?.len())
}

fn copy_local(src: &Path, dest: &Path) -> Result<u64> {
    if !src.is_file() {
        return Err(Error::NotFound(src.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = fs::copy(src, dest)?;
    debug!("Copied {} to {}", src.display(), dest.display());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use std::thread;
    use std::time::Duration;

    /// Wraps a LocalStore to inject part failures and delays
    struct ScriptedStore {
        inner: LocalStore,
        fail_part: Option<i32>,
        reverse_completion: bool,
        aborted: Mutex<Vec<String>>,
        completed: Mutex<Vec<Vec<i32>>>,
        puts: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn new(root: &Path) -> Self {
            Self {
                inner: LocalStore::new(root).unwrap(),
                fail_part: None,
                reverse_completion: false,
                aborted: Mutex::new(Vec::new()),
                completed: Mutex::new(Vec::new()),
                puts: Mutex::new(Vec::new()),
            }
        }
    }

    impl ObjectStore for ScriptedStore {
        fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
            self.puts.lock().unwrap().push(key.to_string());
            self.inner.put(key, body)
        }

        fn get(&self, key: &str, dest: &Path) -> Result<()> {
            self.inner.get(key, dest)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }

        fn head_exists(&self, key: &str) -> Result<bool> {
            self.inner.head_exists(key)
        }

        fn create_multipart(&self, key: &str) -> Result<String> {
            self.inner.create_multipart(key)
        }

        fn upload_part(
            &self,
            key: &str,
            upload_id: &str,
            part_number: i32,
            body: Vec<u8>,
        ) -> Result<String> {
            if self.reverse_completion {
                // Earlier parts finish later
                thread::sleep(Duration::from_millis(40 * (5 - part_number.min(5)) as u64));
            }
            if self.fail_part == Some(part_number) {
                thread::sleep(Duration::from_millis(100));
                return Err(Error::store(StoreOp::UploadPart, key, "injected failure"));
            }
            self.inner.upload_part(key, upload_id, part_number, body)
        }

        fn complete_multipart(
            &self,
            key: &str,
            upload_id: &str,
            parts: &[CompletedPart],
        ) -> Result<()> {
            self.completed
                .lock()
                .unwrap()
                .push(parts.iter().map(|p| p.part_number).collect());
            self.inner.complete_multipart(key, upload_id, parts)
        }

        fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
            self.aborted.lock().unwrap().push(key.to_string());
            self.inner.abort_multipart(key, upload_id)
        }
    }

    const CHUNK: u64 = 1024;

    fn config() -> TransferConfig {
        TransferConfig {
            chunk_size: CHUNK,
            concurrency: 4,
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn upload_op(dir: &Path, name: &str) -> TransferOperation {
        TransferOperation::Promote {
            from: Location::Directory(dir.to_path_buf()),
            to: Location::Store,
            artifact: name.to_string(),
        }
    }

    #[test]
    fn test_small_file_single_put() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.pkg.tar.zst"), payload(100)).unwrap();
        fs::write(src.path().join("a.pkg.tar.zst.sig"), b"sig").unwrap();

        let store = Arc::new(ScriptedStore::new(bucket.path()));
        let executor = Executor::new(store.clone(), config()).unwrap();
        let report = executor
            .execute(&[upload_op(src.path(), "a.pkg.tar.zst")])
            .unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.multipart_sessions, 0);
        assert_eq!(report.signatures_transferred, 1);
        assert!(store.completed.lock().unwrap().is_empty());
        assert_eq!(
            fs::read(bucket.path().join("a.pkg.tar.zst")).unwrap(),
            payload(100)
        );
        assert_eq!(fs::read(bucket.path().join("a.pkg.tar.zst.sig")).unwrap(), b"sig");
    }

    #[test]
    fn test_multipart_three_parts() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        let data = payload(3 * CHUNK as usize);
        fs::write(src.path().join("big.pkg.tar.zst"), &data).unwrap();

        let store = Arc::new(ScriptedStore::new(bucket.path()));
        let executor = Executor::new(store.clone(), config()).unwrap();
        let report = executor
            .execute(&[upload_op(src.path(), "big.pkg.tar.zst")])
            .unwrap();

        assert_eq!(report.multipart_sessions, 1);
        assert_eq!(*store.completed.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(fs::read(bucket.path().join("big.pkg.tar.zst")).unwrap(), data);
        // No signature next to the artifact: skipped, not fatal
        assert_eq!(report.signatures_skipped, 1);
    }

    #[test]
    fn test_parts_sorted_despite_completion_order() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        let data = payload(4 * CHUNK as usize + 10);
        fs::write(src.path().join("big.pkg.tar.zst"), &data).unwrap();

        let mut store = ScriptedStore::new(bucket.path());
        store.reverse_completion = true;
        let store = Arc::new(store);
        let executor = Executor::new(store.clone(), config()).unwrap();
        executor
            .execute(&[upload_op(src.path(), "big.pkg.tar.zst")])
            .unwrap();

        assert_eq!(*store.completed.lock().unwrap(), vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(fs::read(bucket.path().join("big.pkg.tar.zst")).unwrap(), data);
    }

    #[test]
    fn test_failed_part_aborts_session() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        fs::write(src.path().join("big.pkg.tar.zst"), payload(3 * CHUNK as usize)).unwrap();

        let mut store = ScriptedStore::new(bucket.path());
        store.fail_part = Some(2);
        let store = Arc::new(store);
        let executor = Executor::new(store.clone(), config()).unwrap();

        let err = executor
            .execute(&[upload_op(src.path(), "big.pkg.tar.zst")])
            .unwrap_err();
        match err {
            Error::TransferFailed { failed, first } => {
                assert_eq!(failed, 1);
                assert!(matches!(
                    *first,
                    Error::MultipartAborted { part_number: 2, .. }
                ));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(*store.aborted.lock().unwrap(), vec!["big.pkg.tar.zst"]);
        assert!(store.completed.lock().unwrap().is_empty());
        assert!(!store.head_exists("big.pkg.tar.zst").unwrap());
    }

    #[test]
    fn test_failure_isolated_per_file() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        fs::write(src.path().join("ok.pkg.tar.zst"), payload(10)).unwrap();

        let store = Arc::new(ScriptedStore::new(bucket.path()));
        let executor = Executor::new(store.clone(), config()).unwrap();
        let err = executor
            .execute(&[
                upload_op(src.path(), "missing.pkg.tar.zst"),
                upload_op(src.path(), "ok.pkg.tar.zst"),
            ])
            .unwrap_err();

        match err {
            Error::TransferFailed { failed, first } => {
                assert_eq!(failed, 1);
                assert!(first.is_not_found());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.head_exists("ok.pkg.tar.zst").unwrap());
    }

    #[test]
    fn test_delete_tolerates_missing_signature() {
        let bucket = tempfile::tempdir().unwrap();
        let store = Arc::new(ScriptedStore::new(bucket.path()));
        store.put("old.pkg.tar.zst", b"x".to_vec()).unwrap();

        let executor = Executor::new(store.clone(), config()).unwrap();
        let report = executor
            .execute(&[TransferOperation::Delete {
                target: Location::Store,
                artifact: "old.pkg.tar.zst".to_string(),
            }])
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.signatures_skipped, 1);
        assert!(!store.head_exists("old.pkg.tar.zst").unwrap());
    }

    #[test]
    fn test_delete_missing_artifact_fails_and_skips_promotions() {
        let src = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        fs::write(src.path().join("new.pkg.tar.zst"), payload(10)).unwrap();

        let store = Arc::new(ScriptedStore::new(bucket.path()));
        let executor = Executor::new(store.clone(), config()).unwrap();
        let result = executor.execute(&[
            upload_op(src.path(), "new.pkg.tar.zst"),
            TransferOperation::Delete {
                target: Location::Store,
                artifact: "absent.pkg.tar.zst".to_string(),
            },
        ]);

        assert!(matches!(result, Err(Error::TransferFailed { failed: 1, .. })));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_local_copy_and_download() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let bucket = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.pkg.tar.zst"), b"a").unwrap();
        fs::write(src.path().join("a.pkg.tar.zst.sig"), b"sig").unwrap();

        let store = Arc::new(ScriptedStore::new(bucket.path()));
        store.put("b.pkg.tar.zst", b"b".to_vec()).unwrap();

        let executor = Executor::new(store, config()).unwrap();
        let report = executor
            .execute(&[
                TransferOperation::Promote {
                    from: Location::Directory(src.path().to_path_buf()),
                    to: Location::Directory(out.path().to_path_buf()),
                    artifact: "a.pkg.tar.zst".to_string(),
                },
                TransferOperation::Promote {
                    from: Location::Store,
                    to: Location::Directory(out.path().to_path_buf()),
                    artifact: "b.pkg.tar.zst".to_string(),
                },
            ])
            .unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(fs::read(out.path().join("a.pkg.tar.zst.sig")).unwrap(), b"sig");
        assert_eq!(fs::read(out.path().join("b.pkg.tar.zst")).unwrap(), b"b");
        assert!(!out.path().join(".b.pkg.tar.zst.partial").exists());
        assert!(!out.path().join(".b.pkg.tar.zst.sig.partial").exists());
    }

    #[test]
    fn test_local_executor_rejects_store_operations() {
        let executor = Executor::local(config()).unwrap();
        let result = executor.execute(&[TransferOperation::Delete {
            target: Location::Store,
            artifact: "x.pkg.tar.zst".to_string(),
        }]);

        match result {
            Err(Error::TransferFailed { first, .. }) => {
                assert!(matches!(*first, Error::Config(_)))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_session_requires_contiguous_parts() {
        let mut session = UploadSession::new("key", "id");
        session.record(3, "c".to_string());
        session.record(1, "a".to_string());
        assert!(session.completed_parts(3).is_err());

        let mut session = UploadSession::new("key", "id");
        session.record(2, "b".to_string());
        session.record(1, "a".to_string());
        let parts = session.completed_parts(2).unwrap();
        assert_eq!(
            parts.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Executor::local(TransferConfig {
            chunk_size: CHUNK,
            concurrency: 0,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
