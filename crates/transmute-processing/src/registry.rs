//! Transform registry
//!
//! Maps every operation to the strategy that implements it. Contracts live on the
//! operation itself; the registry only dispatches.

use crate::document::DocumentTransformer;
use crate::image::ImageTransformer;
use crate::traits::TransformStrategy;
use crate::video::VideoTransformer;
use std::collections::HashMap;
use std::sync::Arc;
use transmute_core::{AppError, Config, Operation};

#[derive(Default, Clone)]
pub struct TransformRegistry {
    strategies: HashMap<Operation, Arc<dyn TransformStrategy>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the image, video and document strategies
    pub fn with_defaults(config: &Config) -> Result<Self, anyhow::Error> {
        let mut registry = Self::new();
        registry.register(Arc::new(ImageTransformer::new()));
        registry.register(Arc::new(VideoTransformer::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
            config.video_crf,
        )?));
        registry.register(Arc::new(DocumentTransformer::new()));
        Ok(registry)
    }

    /// Register `strategy` for every operation it supports, replacing earlier entries
    pub fn register(&mut self, strategy: Arc<dyn TransformStrategy>) {
        for operation in strategy.supported_operations() {
            if let Some(previous) = self.strategies.insert(operation, strategy.clone()) {
                tracing::debug!(
                    operation = %operation,
                    previous = previous.name(),
                    replacement = strategy.name(),
                    "Strategy replaced"
                );
            }
        }
    }

    pub fn get(&self, operation: Operation) -> Result<Arc<dyn TransformStrategy>, AppError> {
        self.strategies
            .get(&operation)
            .cloned()
            .ok_or_else(|| AppError::UnknownOperation(operation.to_string()))
    }

    /// Registered operations in catalogue order
    pub fn operations(&self) -> Vec<Operation> {
        let mut operations: Vec<_> = self.strategies.keys().copied().collect();
        operations.sort();
        operations
    }
}
