// src/config.rs

//! Run configuration
//!
//! Every setting is gathered into these structs once at process start and
//! passed by reference into the pipelines. Nothing in the library reads the
//! environment on its own.

use crate::error::{Error, Result};
use crate::repository::database_filename;
use std::path::PathBuf;

/// Default multipart chunk size and single-put threshold (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default worker count for both the file pool and the chunk pool
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Smallest part size S3-compatible stores accept for non-final parts
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Object store connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Override base URL (MinIO, R2, ...); `None` uses the AWS endpoint
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Key prefix every object lives under, without leading/trailing slashes
    pub root_prefix: String,
    /// Upload objects with the `public-read` canned ACL
    pub public_read: bool,
}

impl StoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            root_prefix: String::new(),
            public_read: true,
        }
    }

    /// Set the root path; surrounding slashes are stripped (`/repo/x86_64/` -> `repo/x86_64`)
    pub fn with_root_prefix(mut self, prefix: &str) -> Self {
        self.root_prefix = prefix.trim_matches('/').to_string();
        self
    }

    /// Full object key for a repository-relative name
    pub fn object_key(&self, name: &str) -> String {
        if self.root_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.root_prefix, name)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::Config("bucket name must not be empty".to_string()));
        }
        if self.access_key.is_none() || self.secret_key.is_none() {
            return Err(Error::Config(
                "both access key and secret key are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Executor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Objects at or above this size are uploaded in parts of this size
    pub chunk_size: u64,
    /// Workers per pool (files and chunks each get their own pool)
    pub concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Directories taking part in a promotion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    /// Repository name; the database is `<repo_name>.db.tar.gz`
    pub repo_name: String,
    /// Freshly built artifacts and their signatures
    pub source_dir: PathBuf,
    /// Currently published artifacts, read for copy-forward
    pub dest_dir: PathBuf,
    /// Receives the complete resulting repository
    pub output_dir: PathBuf,
}

impl RepoLayout {
    pub fn source_database(&self) -> PathBuf {
        self.source_dir.join(database_filename(&self.repo_name))
    }

    pub fn dest_database(&self) -> PathBuf {
        self.dest_dir.join(database_filename(&self.repo_name))
    }
}
