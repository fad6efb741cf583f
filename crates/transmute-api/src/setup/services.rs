//! Store, scheduler, registry and coordinator wiring

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use transmute_core::{Config, ReferenceResolver};
use transmute_infra::ReclamationScheduler;
use transmute_processing::{PipelineCoordinator, PipelineSettings, TransformRegistry};
use transmute_storage::{ArtifactStore, LocalArtifactStore};

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let store: Arc<dyn ArtifactStore> = Arc::new(
        LocalArtifactStore::new(config.storage_root.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to initialize storage at {}",
                    config.storage_root.display()
                )
            })?,
    );
    tracing::info!(root = %config.storage_root.display(), "Artifact store ready");

    let (scheduler, _reclamation_task) = ReclamationScheduler::start(store.clone());

    let registry = TransformRegistry::with_defaults(config)
        .context("Failed to initialize transform strategies")?;
    tracing::info!(
        operations = registry.operations().len(),
        "Transform registry ready"
    );

    let coordinator = PipelineCoordinator::new(
        store.clone(),
        Arc::new(registry),
        scheduler.clone(),
        ReferenceResolver::new(config.public_base_url.clone()),
        PipelineSettings::from(config),
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        store,
        coordinator,
        scheduler,
    }))
}
