//! Operation endpoint: `POST /api/{operation}`

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::forwarding::forwarding_context;
use crate::utils::upload::extract_submission;
use axum::{
    extract::{Path, Request, State},
    Json,
};
use std::sync::Arc;
use transmute_core::{AppError, Operation, ProcessingResult};
use transmute_processing::ProcessingRequest;

#[tracing::instrument(skip(state, request), fields(operation = %operation))]
pub async fn process_operation(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    request: Request,
) -> Result<Json<ProcessingResult>, HttpAppError> {
    // Unknown ids are rejected before the body is read
    let operation: Operation = operation.parse()?;
    let forwarding = forwarding_context(request.headers(), request.uri());

    let submission = extract_submission(request, state.config.max_files_per_request).await?;

    // Detached so a client disconnect cannot cancel the transform before its files are
    // registered for reclamation
    let coordinator = state.coordinator.clone();
    let task = tokio::spawn(async move {
        coordinator
            .process(ProcessingRequest {
                operation,
                uploads: submission.uploads,
                params: submission.params,
                forwarding,
            })
            .await
    });

    let result = task
        .await
        .map_err(|e| AppError::Internal(format!("Processing task failed: {}", e)))??;

    Ok(Json(result))
}
