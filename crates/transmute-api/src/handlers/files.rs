//! Static serving of the output namespace: `GET /files/{name}`

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;
use transmute_core::{AppError, Namespace};
use transmute_storage::StorageError;

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "aac" | "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Stream an output artifact. Reclaimed and never-existing names are both 404; intake
/// files are not reachable.
#[tracing::instrument(skip(state))]
pub async fn serve_output(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, HttpAppError> {
    let not_found = || AppError::NotFound(format!("File '{}' not found", name));

    let artifact = state
        .store
        .locate(&name, Namespace::Output)
        .map_err(|_| not_found())?;

    let artifact = match state.store.stat(&artifact).await {
        Ok(artifact) => artifact,
        Err(StorageError::NotFound(_)) => return Err(not_found().into()),
        Err(e) => return Err(e.into()),
    };

    // The file can still be reclaimed between stat and open
    let stream = match state.store.open(&artifact).await {
        Ok(stream) => stream,
        Err(StorageError::NotFound(_)) => return Err(not_found().into()),
        Err(e) => return Err(e.into()),
    };

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&artifact.name))
        .header(header::CACHE_CONTROL, "no-store");
    if let Some(size) = artifact.size_bytes {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    let response = builder.body(Body::from_stream(body_stream)).map_err(|e| {
        tracing::error!(error = %e, "Failed to build response");
        HttpAppError::from(AppError::Internal(e.to_string()))
    })?;

    Ok(response)
}
