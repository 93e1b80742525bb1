// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for pkgsync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An expected file or directory does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Repository database could not be decoded as a tar container
    #[error("Invalid repository database {}: {reason}", path.display())]
    ArchiveFormat { path: PathBuf, reason: String },

    /// Object store call failed
    #[error("Object store {op} failed for {key}: {message}")]
    Store {
        op: StoreOp,
        key: String,
        message: String,
    },

    /// A multipart upload lost a part and was aborted
    #[error("Multipart upload of {key} aborted after part {part_number} failed: {source}")]
    MultipartAborted {
        key: String,
        part_number: i32,
        #[source]
        source: Box<Error>,
    },

    /// One or more operations of a transfer plan failed
    #[error("{failed} transfer operation(s) failed; first failure: {first}")]
    TransferFailed { failed: usize, first: Box<Error> },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Object store primitive that produced a [`Error::Store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Put,
    Get,
    Delete,
    Head,
    CreateMultipart,
    UploadPart,
    CompleteMultipart,
    AbortMultipart,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::Put => "put",
            StoreOp::Get => "get",
            StoreOp::Delete => "delete",
            StoreOp::Head => "head",
            StoreOp::CreateMultipart => "create-multipart",
            StoreOp::UploadPart => "upload-part",
            StoreOp::CompleteMultipart => "complete-multipart",
            StoreOp::AbortMultipart => "abort-multipart",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Build a [`Error::Store`] from any displayable cause
    pub fn store(op: StoreOp, key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Store {
            op,
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// True when the error means "the thing is not there"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias using pkgsync's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_path() {
        let err = Error::NotFound(PathBuf::from("/srv/repo/core.db.tar.gz"));
        assert_eq!(err.to_string(), "File not found: /srv/repo/core.db.tar.gz");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_store_error_display() {
        let err = Error::store(StoreOp::UploadPart, "repo/big.pkg.tar.zst", "timeout");
        assert_eq!(
            err.to_string(),
            "Object store upload-part failed for repo/big.pkg.tar.zst: timeout"
        );
        assert!(!err.is_not_found());
    }
}
