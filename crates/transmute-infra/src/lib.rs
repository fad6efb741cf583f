//! Transmute Infrastructure Library
//!
//! This crate provides shared infrastructure components used by the Transmute service:
//! - Middleware (request ID and its trace span)
//! - Telemetry initialization
//! - Reclamation of expired artifacts

pub mod middleware;
pub mod reclamation;
pub mod telemetry;

// Re-export commonly used types
pub use middleware::{request_id_middleware, RequestId, RequestSpan};
pub use reclamation::ReclamationScheduler;
pub use telemetry::init_telemetry;
