//! Transmute Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and reference
//! resolution shared by every Transmute component.

pub mod config;
pub mod error;
pub mod models;
pub mod reference;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    Artifact, Arity, Namespace, Operation, OperationContract, ParamKind, ParamSpec,
    ParamValue, Params, ProcessingResult, ResolvedParams, MAX_DIMENSION,
};
pub use reference::{ForwardingContext, ReferenceResolver, PUBLIC_FILES_PREFIX};
