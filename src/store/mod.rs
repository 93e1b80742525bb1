// src/store/mod.rs

//! Object store boundary
//!
//! The executor only talks to storage through [`ObjectStore`]. Keys handed
//! to a store are repository-relative (`foo-1.0-1-any.pkg.tar.zst`); the
//! store applies its own root prefix.

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

use crate::error::Result;
use std::path::Path;

/// One uploaded part of a multipart session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based sequence number
    pub part_number: i32,
    /// Integrity tag returned by the store for this part
    pub etag: String,
}

/// Primitive operations the transfer executor needs from a store
///
/// Implementations must be usable from several worker threads at once.
/// `put` and `complete_multipart` must be atomic: an object is either fully
/// visible or not visible at all.
pub trait ObjectStore: Send + Sync {
    /// Store a whole object in one call
    fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Download an object into `dest`
    fn get(&self, key: &str, dest: &Path) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    fn head_exists(&self, key: &str) -> Result<bool>;

    /// Open a multipart session, returning its upload id
    fn create_multipart(&self, key: &str) -> Result<String>;

    /// Upload one part, returning its integrity tag
    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String>;

    /// Commit a session; `parts` must be in ascending part-number order
    fn complete_multipart(&self, key: &str, upload_id: &str, parts: &[CompletedPart])
    -> Result<()>;

    /// Discard a session and every part uploaded to it
    fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()>;
}
