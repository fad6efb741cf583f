//! Tracing initialization
//!
//! Human-readable output by default; JSON lines when `LOG_FORMAT=json`.

mod init;

pub use init::init_telemetry;
