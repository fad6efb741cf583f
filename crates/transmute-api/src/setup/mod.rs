//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::constants::SERVICE_NAME;
use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use transmute_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    transmute_infra::init_telemetry(config.log_json, SERVICE_NAME, env!("CARGO_PKG_VERSION"))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let state = services::initialize_services(&config).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
