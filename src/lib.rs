// src/lib.rs

//! pkgsync
//!
//! Keeps an Arch-style package repository published in object storage in
//! step with freshly built packages.
//!
//! # Architecture
//!
//! - Repository databases (`<repo>.db.tar.gz`) are the source of truth for
//!   what is built and what is published
//! - Reconciliation compares them with `vercmp` ordering
//! - Plans are flat lists of promote/delete operations, signatures included
//! - The executor runs plans on bounded worker pools; large objects go up as
//!   multipart uploads that are committed whole or aborted

pub mod config;
mod error;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod repository;
pub mod store;
pub mod transfer;
pub mod version;

pub use error::{Error, Result, StoreOp};
