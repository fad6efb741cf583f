//! Raster image strategy

pub mod color;
pub mod encode;
pub mod resize;
pub mod transformer;

pub use color::dominant_color;
pub use encode::{encode, target_format};
pub use resize::ImageResize;
pub use transformer::ImageTransformer;
