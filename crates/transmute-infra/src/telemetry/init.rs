use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "transmute=debug,tower_http=debug";

/// Initialize tracing for the process. `RUST_LOG` overrides the default filter.
pub fn init_telemetry(
    log_json: bool,
    service_name: &str,
    service_version: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let json_layer = log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        version = service_version,
        json = log_json,
        "Tracing initialized"
    );
    Ok(())
}
