use crate::constants::API_PREFIX;
use crate::error::HttpAppError;
use axum::extract::Path;
use axum::http::{Method, Uri};
use transmute_core::{AppError, Operation};

/// Anything unrouted under `/api/` is an operation this service does not implement
pub async fn not_found(uri: Uri) -> HttpAppError {
    let path = uri.path();
    let api_root = format!("{}/", API_PREFIX);

    match path.strip_prefix(&api_root) {
        Some(operation) => HttpAppError(AppError::UnknownOperation(operation.to_string())),
        None => HttpAppError(AppError::NotFound(format!("No route for {}", path))),
    }
}

/// Non-POST requests on `/api/{operation}`: unknown ids stay 404, known ones are 405
pub async fn method_not_allowed(method: Method, Path(operation): Path<String>) -> HttpAppError {
    match operation.parse::<Operation>() {
        Ok(operation) => HttpAppError(AppError::MethodNotAllowed {
            method: method.to_string(),
            operation: operation.to_string(),
        }),
        Err(err) => HttpAppError(err),
    }
}
