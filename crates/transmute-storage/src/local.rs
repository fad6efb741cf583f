use crate::names::{compose, is_plain_name, random_token, sanitize_name};
use crate::traits::{ArtifactStore, ByteStream, RemoveOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use transmute_core::{Artifact, Namespace};

const MAX_NAME_ATTEMPTS: usize = 8;

/// Local filesystem artifact store
#[derive(Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    sequence: Arc<AtomicU64>,
}

impl LocalArtifactStore {
    /// Create a new LocalArtifactStore, creating both namespace directories
    ///
    /// # Arguments
    /// * `root` - Storage root (e.g., "/var/lib/transmute"); `intake/` and `output/` live below it
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        for namespace in Namespace::ALL {
            let dir = root.join(namespace.dir_name());
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        // Encoder manifests carry absolute paths, so the root must not stay relative
        let root = fs::canonicalize(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        tracing::info!(root = %root.display(), "Artifact store initialized");

        Ok(LocalArtifactStore {
            root,
            sequence: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Directory backing a namespace
    pub fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    /// Resolve an artifact to its path, refusing anything that is not a direct child of its
    /// namespace directory
    fn artifact_path(&self, artifact: &Artifact) -> StorageResult<PathBuf> {
        if !is_plain_name(&artifact.name) {
            return Err(StorageError::InvalidName(artifact.name.clone()));
        }
        Ok(self.namespace_dir(artifact.namespace).join(&artifact.name))
    }

    fn next_name(&self, sanitized: &str) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        compose(
            chrono::Utc::now().timestamp_millis(),
            sequence,
            &random_token(),
            sanitized,
        )
    }

    /// Exclusively create a fresh file, retrying with the next sequence number if the name
    /// is somehow taken
    async fn create_exclusive(
        &self,
        original_name: &str,
        namespace: Namespace,
    ) -> StorageResult<(Artifact, fs::File)> {
        let sanitized = sanitize_name(original_name);
        let dir = self.namespace_dir(namespace);

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.next_name(&sanitized);
            let path = dir.join(&name);

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((Artifact::new(name, namespace, path), file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(name = %name, "Artifact name taken, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(StorageError::WriteFailed(format!(
                        "Failed to create file {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(StorageError::WriteFailed(format!(
            "Could not allocate a unique name for '{}' in {}",
            sanitized, namespace
        )))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn materialize(
        &self,
        data: Bytes,
        original_name: &str,
        namespace: Namespace,
    ) -> StorageResult<Artifact> {
        let start = std::time::Instant::now();
        let (artifact, mut file) = self.create_exclusive(original_name, namespace).await?;
        let size = data.len() as u64;

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            // A half-written file must not linger until reclamation
            let _ = fs::remove_file(&artifact.path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to write file {}: {}",
                artifact.path.display(),
                e
            )));
        }

        tracing::info!(
            artifact = %artifact,
            namespace = %namespace,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Artifact materialized"
        );

        Ok(artifact.with_size(size))
    }

    async fn reserve(&self, original_name: &str, namespace: Namespace) -> StorageResult<Artifact> {
        let (artifact, file) = self.create_exclusive(original_name, namespace).await?;
        drop(file);

        tracing::debug!(artifact = %artifact, "Artifact name reserved");

        Ok(artifact)
    }

    fn locate(&self, name: &str, namespace: Namespace) -> StorageResult<Artifact> {
        if !is_plain_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        let path = self.namespace_dir(namespace).join(name);
        Ok(Artifact::new(name.to_string(), namespace, path))
    }

    async fn open(&self, artifact: &Artifact) -> StorageResult<ByteStream> {
        let path = self.artifact_path(artifact)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(artifact.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::ReadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn remove(&self, artifact: &Artifact) -> StorageResult<RemoveOutcome> {
        let path = self.artifact_path(artifact)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(artifact = %artifact, "Artifact removed");
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RemoveOutcome::AlreadyAbsent),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn stat(&self, artifact: &Artifact) -> StorageResult<Artifact> {
        let path = self.artifact_path(artifact)?;

        match fs::metadata(&path).await {
            Ok(meta) => Ok(artifact.clone().with_size(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(artifact.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn exists(&self, artifact: &Artifact) -> StorageResult<bool> {
        let path = self.artifact_path(artifact)?;
        Ok(fs::try_exists(&path).await?)
    }
}
