//! Video strategy backed by the ffmpeg and ffprobe binaries

pub mod args;
pub mod probe;
pub mod transformer;

pub use probe::StreamProfile;
pub use transformer::VideoTransformer;
