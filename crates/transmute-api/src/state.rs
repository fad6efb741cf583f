//! Application state

use std::sync::Arc;
use transmute_core::Config;
use transmute_infra::ReclamationScheduler;
use transmute_processing::PipelineCoordinator;
use transmute_storage::ArtifactStore;

/// Shared state handed to every handler as `State<Arc<AppState>>`
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ArtifactStore>,
    pub coordinator: PipelineCoordinator,
    pub scheduler: ReclamationScheduler,
}
