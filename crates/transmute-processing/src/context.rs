//! Per-request transform context

use bytes::Bytes;
use std::sync::{Arc, Mutex};
use transmute_core::{AppError, Artifact, Namespace, Operation};
use transmute_storage::ArtifactStore;

/// Gives a strategy access to the store and records every file it creates, so the
/// coordinator can schedule all of them for reclamation whatever the outcome.
pub struct TransformContext {
    store: Arc<dyn ArtifactStore>,
    operation: Operation,
    created: Mutex<Vec<Artifact>>,
}

impl TransformContext {
    pub fn new(store: Arc<dyn ArtifactStore>, operation: Operation) -> Self {
        Self {
            store,
            operation,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Read an input. A missing input is fatal here.
    pub async fn read_input(&self, input: &Artifact) -> Result<Bytes, AppError> {
        self.store.read(input).await.map_err(AppError::from)
    }

    /// Persist encoded output bytes under a fresh output name
    pub async fn write_output(&self, data: Bytes, input: &Artifact, extension: &str) -> Result<Artifact, AppError> {
        let hint = self.output_hint(input, extension);
        let artifact = self.store.materialize(data, &hint, Namespace::Output).await?;
        self.record(&artifact);
        Ok(artifact)
    }

    /// Claim an empty output file for an external writer
    pub async fn reserve_output(&self, input: &Artifact, extension: &str) -> Result<Artifact, AppError> {
        let hint = self.output_hint(input, extension);
        let artifact = self.store.reserve(&hint, Namespace::Output).await?;
        self.record(&artifact);
        Ok(artifact)
    }

    /// Persist a helper file (e.g. a concat manifest). Scratch files live in the intake
    /// namespace and are never served.
    pub async fn scratch(&self, data: Bytes, name_hint: &str) -> Result<Artifact, AppError> {
        let artifact = self.store.materialize(data, name_hint, Namespace::Intake).await?;
        self.record(&artifact);
        Ok(artifact)
    }

    /// Every file created through this context so far
    pub fn created(&self) -> Vec<Artifact> {
        match self.created.lock() {
            Ok(created) => created.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, artifact: &Artifact) {
        match self.created.lock() {
            Ok(mut created) => created.push(artifact.clone()),
            Err(poisoned) => poisoned.into_inner().push(artifact.clone()),
        }
    }

    /// `{original stem}-{operation}.{extension}`
    fn output_hint(&self, input: &Artifact, extension: &str) -> String {
        let original = input.name.splitn(4, '-').nth(3).unwrap_or(&input.name);
        let stem = original
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(original);
        format!("{}-{}.{}", stem, self.operation, extension)
    }
}
