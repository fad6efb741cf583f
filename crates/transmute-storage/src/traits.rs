//! Artifact store abstraction
//!
//! This module defines the ArtifactStore trait the pipeline works against.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;
use transmute_core::{AppError, Artifact, Namespace};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("Artifact not found: {}", name)),
            StorageError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                AppError::NotFound(e.to_string())
            }
            other => AppError::StorageFailure(other.to_string()),
        }
    }
}

/// Result of an idempotent removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    AlreadyAbsent,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Artifact store abstraction
///
/// Owns naming, existence checks and deletion for both namespaces. Artifacts are immutable
/// once materialized; the only mutation is `remove`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `data` under a fresh collision-resistant name derived from `original_name`
    async fn materialize(
        &self,
        data: Bytes,
        original_name: &str,
        namespace: Namespace,
    ) -> StorageResult<Artifact>;

    /// Claim a fresh name by creating an empty file that an external writer (the encoder)
    /// fills in afterwards
    async fn reserve(&self, original_name: &str, namespace: Namespace) -> StorageResult<Artifact>;

    /// Address an existing artifact by its generated name. Does not touch the disk;
    /// `InvalidName` for anything that is not a plain file name.
    fn locate(&self, name: &str, namespace: Namespace) -> StorageResult<Artifact>;

    /// Stream the artifact's content. `NotFound` if it was already reclaimed.
    async fn open(&self, artifact: &Artifact) -> StorageResult<ByteStream>;

    /// Read the whole artifact into memory
    async fn read(&self, artifact: &Artifact) -> StorageResult<Bytes> {
        let mut stream = self.open(artifact).await?;
        let mut buf = BytesMut::with_capacity(artifact.size_bytes.unwrap_or(0) as usize);
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Delete the artifact. A file that is already gone is `AlreadyAbsent`, never an error.
    async fn remove(&self, artifact: &Artifact) -> StorageResult<RemoveOutcome>;

    /// Refresh the artifact's size from disk. `NotFound` if the file is gone.
    async fn stat(&self, artifact: &Artifact) -> StorageResult<Artifact>;

    async fn exists(&self, artifact: &Artifact) -> StorageResult<bool>;
}
