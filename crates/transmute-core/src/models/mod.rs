//! Domain models for the artifact pipeline

pub mod artifact;
pub mod operation;
pub mod params;
pub mod result;

pub use artifact::{Artifact, Namespace};
pub use operation::{Arity, Operation, MAX_DIMENSION, OperationContract, ParamKind, ParamSpec};
pub use params::{ParamValue, Params, ResolvedParams};
pub use result::ProcessingResult;
