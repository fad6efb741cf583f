use crate::models::Artifact;
use serde::Serialize;

/// Outcome of one processing request.
///
/// Serializes to `{ fileUrl, text? }`. Read-only operations (dominant color) carry text
/// and no file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip)]
    pub output: Option<Artifact>,
}
