//! S3 object storage client.
//!
//! This crate provides:
//! - The `BlobStore` abstraction the worker stages talk to
//! - An S3-backed implementation (download/upload/delete by bucket and key)
//! - Error classification into transient and permanent failures

pub mod blob;
pub mod client;
pub mod error;

pub use blob::{content_type_for, BlobStore};
pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
