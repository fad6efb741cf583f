/// Path prefix of every operation endpoint
pub const API_PREFIX: &str = "/api";

/// Multipart field names carrying uploaded files. Repeat the field for multi-input operations.
pub const FILE_FIELDS: &[&str] = &["file", "files"];

/// Service name reported by telemetry and health output
pub const SERVICE_NAME: &str = "transmute";
