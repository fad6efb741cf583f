//! Transmute Processing Library
//!
//! This crate provides the transform strategies (image, video, PDF), the registry that
//! dispatches operations to them, and the pipeline coordinator that drives one request
//! from upload to resolved reference.

pub mod context;
pub mod document;
pub mod image;
pub mod pipeline;
pub mod registry;
pub mod traits;
pub mod video;

// Re-export commonly used types
pub use context::TransformContext;
pub use document::DocumentTransformer;
pub use self::image::ImageTransformer;
pub use pipeline::{PipelineCoordinator, PipelineSettings, ProcessingRequest, Stage, Upload};
pub use registry::TransformRegistry;
pub use traits::{TransformOutput, TransformStrategy};
pub use video::VideoTransformer;
