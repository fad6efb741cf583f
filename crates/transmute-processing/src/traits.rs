//! Core traits for transform strategies
//!
//! This module defines the interface every strategy plugged into the registry implements.

use crate::context::TransformContext;
use async_trait::async_trait;
use transmute_core::{AppError, Artifact, Operation, ResolvedParams};

/// What a strategy produced
#[derive(Debug, Clone)]
pub enum TransformOutput {
    /// An output-namespace artifact allocated through the context
    File(Artifact),
    /// Derived text, no artifact
    Text(String),
}

/// Transform strategy trait
///
/// Strategies read only the inputs they are given and create files only through the
/// `TransformContext`. They never delete anything; reclamation belongs to the coordinator.
#[async_trait]
pub trait TransformStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// List supported operations
    fn supported_operations(&self) -> Vec<Operation>;

    /// Run `operation` over `inputs`. Arity and parameters have already been validated
    /// against the operation's contract.
    async fn run(
        &self,
        operation: Operation,
        ctx: &TransformContext,
        inputs: &[Artifact],
        params: &ResolvedParams,
    ) -> Result<TransformOutput, AppError>;
}
