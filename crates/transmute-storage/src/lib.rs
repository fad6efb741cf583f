//! Transmute Storage Library
//!
//! This crate provides the artifact store: two namespaces of files (`intake` for uploads,
//! `output` for servable results) below one storage root.
//!
//! # Artifact names
//!
//! Every stored file is named `{unix_millis}-{sequence}-{token}-{sanitized_original_name}`,
//! where `token` is 16 random hex digits. The sequence is process-wide and monotonic, and
//! files are created exclusively, so a name is never handed out twice within a namespace.
//! The token keeps output names from being guessed before they are disclosed. Names never
//! contain path separators.

pub(crate) mod names;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalArtifactStore;
pub use names::sanitize_name;
pub use traits::{ArtifactStore, ByteStream, RemoveOutcome, StorageError, StorageResult};
