//! Transmute API Library
//!
//! This crate provides the HTTP handlers, request extraction and application setup.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
