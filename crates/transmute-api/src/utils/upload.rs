//! Submission extraction for operation endpoints
//!
//! Multipart bodies carry files under the `file` field (repeated for multi-input operations)
//! and parameters as plain text fields. JSON bodies carry parameters only. Files are buffered
//! in memory, bounded by the request body limit, so nothing touches the disk before the
//! operation contract has been checked.

use crate::constants::FILE_FIELDS;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header, StatusCode},
};
use bytes::Bytes;
use transmute_core::{AppError, Params};
use transmute_processing::Upload;

const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Files and parameters of one request
#[derive(Debug, Default)]
pub struct Submission {
    pub uploads: Vec<Upload>,
    pub params: Params,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::ValidationFailure(format!("Failed to read multipart: {}", err.body_text()))
    }
}

fn content_type(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_lowercase())
}

/// Read the submission according to its content type. A request without a body yields an
/// empty submission; the contract check decides whether that is acceptable.
pub async fn extract_submission(request: Request, max_files: usize) -> Result<Submission, AppError> {
    match content_type(&request) {
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| AppError::ValidationFailure(e.body_text()))?;
            extract_multipart(multipart, max_files).await
        }
        Some(ct) if ct.starts_with("application/json") => {
            let body = read_body(request).await?;
            extract_json(&body)
        }
        Some(ct) => {
            let body = read_body(request).await?;
            if body.is_empty() {
                Ok(Submission::default())
            } else {
                Err(AppError::ValidationFailure(format!(
                    "Unsupported content type '{}'; send multipart/form-data or application/json",
                    ct
                )))
            }
        }
        None => Ok(Submission::default()),
    }
}

async fn read_body(request: Request) -> Result<Bytes, AppError> {
    Bytes::from_request(request, &()).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::ValidationFailure(format!("Failed to read body: {}", rejection.body_text()))
        }
    })
}

pub async fn extract_multipart(mut multipart: Multipart, max_files: usize) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if FILE_FIELDS.contains(&field_name.as_str()) {
            if submission.uploads.len() >= max_files {
                return Err(AppError::ValidationFailure(format!(
                    "Too many files: at most {} per request",
                    max_files
                )));
            }

            let original_name = field
                .file_name()
                .map(|s: &str| s.to_string())
                .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
            let data = field.bytes().await.map_err(multipart_error)?;

            submission.uploads.push(Upload {
                original_name,
                data,
            });
        } else if field.file_name().is_some() {
            return Err(AppError::ValidationFailure(format!(
                "Unexpected file field '{}'; upload files under 'file'",
                field_name
            )));
        } else if !field_name.is_empty() {
            let value = field.text().await.map_err(multipart_error)?;
            submission.params.insert(field_name, value);
        }
    }

    Ok(submission)
}

pub fn extract_json(body: &[u8]) -> Result<Submission, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Submission::default());
    }

    let value: serde_json::Value = serde_json::from_slice(body)?;
    Ok(Submission {
        uploads: Vec::new(),
        params: Params::from_json(value)?,
    })
}
