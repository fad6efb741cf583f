//! Deferred deletion of artifacts
//!
//! Every registered artifact is removed once its retention window elapses. The schedule
//! lives in memory only; entries still pending when the process exits are not carried over.

mod scheduler;

pub use scheduler::ReclamationScheduler;
