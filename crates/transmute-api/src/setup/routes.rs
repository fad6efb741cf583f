//! Route configuration and setup

use crate::constants::API_PREFIX;
use crate::error::{panic_response, redact_error_details};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use transmute_core::{Config, PUBLIC_FILES_PREFIX};
use transmute_infra::{request_id_middleware, RequestSpan};

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    tracing::info!(
        http_concurrency_limit = config.http_concurrency_limit,
        max_upload_size_mb = config.max_upload_size_bytes / 1024 / 1024,
        "HTTP limits configured"
    );

    let mut app = Router::new()
        .route(
            &format!("{}/{{operation}}", API_PREFIX),
            post(handlers::process::process_operation)
                .fallback(handlers::fallback::method_not_allowed),
        )
        .route(
            &format!("{}/{{name}}", PUBLIC_FILES_PREFIX),
            get(handlers::files::serve_output),
        )
        .route("/health", get(handlers::health::health_check))
        .fallback(handlers::fallback::not_found);

    if config.is_production() {
        app = app.layer(axum::middleware::map_response(redact_error_details));
    }

    let app = app
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin '{}'", o))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
