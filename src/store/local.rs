// src/store/local.rs

//! Directory-backed object store
//!
//! Objects are plain files under a root directory. Multipart sessions stage
//! their parts under `<root>/.multipart/<upload-id>/` and only become visible
//! through an atomic rename on completion.

use super::{CompletedPart, ObjectStore};
use crate::error::{Error, Result, StoreOp};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const STAGING_DIR: &str = ".multipart";

/// Object store rooted at a local directory
pub struct LocalStore {
    root: PathBuf,
    next_upload: AtomicU64,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            next_upload: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, op: StoreOp, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !key.starts_with(STAGING_DIR);
        if !valid {
            return Err(Error::store(op, key, "invalid object key"));
        }
        Ok(self.root.join(relative))
    }

    fn session_dir(&self, op: StoreOp, key: &str, upload_id: &str) -> Result<PathBuf> {
        let dir = self.root.join(STAGING_DIR).join(upload_id);
        if upload_id.contains(['/', '\\']) || !dir.is_dir() {
            return Err(Error::store(op, key, format!("no such upload: {}", upload_id)));
        }
        Ok(dir)
    }

    /// Write `path` through a hidden sibling and rename it into place
    fn write_atomically<F>(path: &Path, fill: F) -> io::Result<()>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".pkgsync-")
            .tempfile_in(parent)?;
        fill(temp.as_file_mut())?;
        temp.as_file_mut().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn etag(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

fn part_file(dir: &Path, part_number: i32) -> PathBuf {
    dir.join(format!("part-{:05}", part_number))
}

impl ObjectStore for LocalStore {
    fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(StoreOp::Put, key)?;
        Self::write_atomically(&path, |file| file.write_all(&body))
            .map_err(|e| Error::store(StoreOp::Put, key, e))?;
        debug!("Stored {} ({} bytes)", key, body.len());
        Ok(())
    }

    fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let path = self.object_path(StoreOp::Get, key)?;
        if !path.is_file() {
            return Err(Error::store(StoreOp::Get, key, "no such object"));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&path, dest).map_err(|e| Error::store(StoreOp::Get, key, e))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(StoreOp::Delete, key)?;
        fs::remove_file(&path).map_err(|e| Error::store(StoreOp::Delete, key, e))
    }

    fn head_exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(StoreOp::Head, key)?.is_file())
    }

    fn create_multipart(&self, key: &str) -> Result<String> {
        self.object_path(StoreOp::CreateMultipart, key)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let upload_id = format!(
            "{}-{:x}-{}",
            std::process::id(),
            nanos,
            self.next_upload.fetch_add(1, Ordering::Relaxed)
        );

        fs::create_dir_all(self.root.join(STAGING_DIR).join(&upload_id))
            .map_err(|e| Error::store(StoreOp::CreateMultipart, key, e))?;
        debug!("Opened multipart session {} for {}", upload_id, key);
        Ok(upload_id)
    }

    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String> {
        if part_number < 1 {
            return Err(Error::store(
                StoreOp::UploadPart,
                key,
                format!("invalid part number {}", part_number),
            ));
        }
        let dir = self.session_dir(StoreOp::UploadPart, key, upload_id)?;
        fs::write(part_file(&dir, part_number), &body)
            .map_err(|e| Error::store(StoreOp::UploadPart, key, e))?;
        Ok(etag(&body))
    }

    fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let op = StoreOp::CompleteMultipart;
        let dir = self.session_dir(op, key, upload_id)?;
        let path = self.object_path(op, key)?;

        if parts.is_empty() {
            return Err(Error::store(op, key, "no parts listed"));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(Error::store(op, key, "parts are not in ascending order"));
        }

        // Verify every listed part before anything becomes visible
        let mut bodies = Vec::with_capacity(parts.len());
        for part in parts {
            let body = fs::read(part_file(&dir, part.part_number)).map_err(|e| {
                Error::store(op, key, format!("part {}: {}", part.part_number, e))
            })?;
            if etag(&body) != part.etag {
                return Err(Error::store(
                    op,
                    key,
                    format!("part {} integrity tag mismatch", part.part_number),
                ));
            }
            bodies.push(body);
        }

        Self::write_atomically(&path, |file| {
            for body in &bodies {
                file.write_all(body)?;
            }
            Ok(())
        })
        .map_err(|e| Error::store(op, key, e))?;

        fs::remove_dir_all(&dir).map_err(|e| Error::store(op, key, e))?;
        debug!("Completed multipart session {} ({} parts)", upload_id, parts.len());
        Ok(())
    }

    fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
        let dir = self.session_dir(StoreOp::AbortMultipart, key, upload_id)?;
        fs::remove_dir_all(&dir).map_err(|e| Error::store(StoreOp::AbortMultipart, key, e))?;
        debug!("Aborted multipart session {}", upload_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path()).unwrap();

        store.put("repo/foo.pkg.tar.zst", b"payload".to_vec()).unwrap();
        assert!(store.head_exists("repo/foo.pkg.tar.zst").unwrap());

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("foo.pkg.tar.zst");
        store.get("repo/foo.pkg.tar.zst", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");

        store.delete("repo/foo.pkg.tar.zst").unwrap();
        assert!(!store.head_exists("repo/foo.pkg.tar.zst").unwrap());
        assert!(store.delete("repo/foo.pkg.tar.zst").is_err());
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path()).unwrap();

        assert!(store.put("../escape", b"x".to_vec()).is_err());
        assert!(store.put("/abs", b"x".to_vec()).is_err());
        assert!(store.put(".multipart/x", b"x".to_vec()).is_err());
    }

    #[test]
    fn test_multipart_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path()).unwrap();

        let id = store.create_multipart("big.pkg.tar.zst").unwrap();
        let second = store.upload_part("big.pkg.tar.zst", &id, 2, b"world".to_vec()).unwrap();
        let first = store.upload_part("big.pkg.tar.zst", &id, 1, b"hello ".to_vec()).unwrap();
        assert!(!store.head_exists("big.pkg.tar.zst").unwrap());

        let parts = [
            CompletedPart { part_number: 1, etag: first },
            CompletedPart { part_number: 2, etag: second },
        ];
        store.complete_multipart("big.pkg.tar.zst", &id, &parts).unwrap();

        assert_eq!(
            fs::read(root.path().join("big.pkg.tar.zst")).unwrap(),
            b"hello world"
        );
        assert!(!root.path().join(STAGING_DIR).join(&id).exists());
    }

    #[test]
    fn test_complete_rejects_unsorted_parts() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path()).unwrap();

        let id = store.create_multipart("big").unwrap();
        let a = store.upload_part("big", &id, 1, b"a".to_vec()).unwrap();
        let b = store.upload_part("big", &id, 2, b"b".to_vec()).unwrap();

        let parts = [
            CompletedPart { part_number: 2, etag: b },
            CompletedPart { part_number: 1, etag: a },
        ];
        assert!(store.complete_multipart("big", &id, &parts).is_err());
        assert!(!store.head_exists("big").unwrap());
    }

    #[test]
    fn test_abort_discards_parts() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path()).unwrap();

        let id = store.create_multipart("big").unwrap();
        store.upload_part("big", &id, 1, b"a".to_vec()).unwrap();
        store.abort_multipart("big", &id).unwrap();

        assert!(!store.head_exists("big").unwrap());
        assert!(store.upload_part("big", &id, 2, b"b".to_vec()).is_err());
    }
}
