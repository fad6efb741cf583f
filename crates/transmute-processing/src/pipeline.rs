//! Pipeline coordinator
//!
//! Drives one request through
//! `Received -> Validated -> InputsMaterialized -> Dispatched -> OutputMaterialized -> Resolved -> Complete`,
//! or `Received -> Rejected` when the request does not satisfy the operation's contract.
//! Every file that gets created is registered for reclamation right after it exists, on
//! success and failure paths alike. Outputs of a failed transform are deleted immediately.

use crate::context::TransformContext;
use crate::registry::TransformRegistry;
use crate::traits::TransformOutput;
use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use transmute_core::{
    AppError, Artifact, Config, ErrorMetadata, ForwardingContext, LogLevel, Namespace, Operation,
    Params, ProcessingResult, ReferenceResolver,
};
use transmute_infra::ReclamationScheduler;
use transmute_storage::{ArtifactStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    InputsMaterialized,
    Dispatched,
    OutputMaterialized,
    Resolved,
    Complete,
    Rejected,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::InputsMaterialized => "inputs_materialized",
            Stage::Dispatched => "dispatched",
            Stage::OutputMaterialized => "output_materialized",
            Stage::Resolved => "resolved",
            Stage::Complete => "complete",
            Stage::Rejected => "rejected",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One uploaded file part, still in memory
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub operation: Operation,
    pub uploads: Vec<Upload>,
    pub params: Params,
    pub forwarding: ForwardingContext,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retention: Duration,
    pub transform_timeout: Duration,
    pub early_input_cleanup: bool,
    pub max_files_per_request: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            retention: config.retention,
            transform_timeout: config.transform_timeout,
            early_input_cleanup: config.early_input_cleanup,
            max_files_per_request: config.max_files_per_request,
        }
    }
}

#[derive(Clone)]
pub struct PipelineCoordinator {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<TransformRegistry>,
    scheduler: ReclamationScheduler,
    resolver: ReferenceResolver,
    settings: PipelineSettings,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<TransformRegistry>,
        scheduler: ReclamationScheduler,
        resolver: ReferenceResolver,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler,
            resolver,
            settings,
        }
    }

    /// Process one request into exactly one result
    #[tracing::instrument(
        skip(self, request),
        fields(operation = %request.operation, files = request.uploads.len())
    )]
    pub async fn process(&self, request: ProcessingRequest) -> Result<ProcessingResult, AppError> {
        let start = Instant::now();
        let operation = request.operation;
        let mut stage = Stage::Received;
        tracing::debug!(stage = %stage, "Request received");

        // Contract checks happen before anything touches the filesystem
        let params = match self.validate(&request) {
            Ok(params) => params,
            Err(err) => {
                tracing::debug!(stage = %Stage::Rejected, error = %err, "Request rejected");
                return Err(err);
            }
        };
        let strategy = self.registry.get(operation)?;
        stage = Stage::Validated;
        tracing::debug!(stage = %stage, strategy = strategy.name(), "Request validated");

        let inputs = match self.materialize_inputs(request.uploads).await {
            Ok(inputs) => inputs,
            Err(err) => return Err(self.fail(stage, err)),
        };
        stage = Stage::InputsMaterialized;
        tracing::debug!(stage = %stage, inputs = inputs.len(), "Inputs materialized");

        let ctx = TransformContext::new(self.store.clone(), operation);
        stage = Stage::Dispatched;
        tracing::debug!(stage = %stage, "Strategy dispatched");

        let outcome = tokio::time::timeout(
            self.settings.transform_timeout,
            strategy.run(operation, &ctx, &inputs, &params),
        )
        .await;

        let created = ctx.created();
        for artifact in &created {
            self.scheduler.register(artifact, self.settings.retention);
        }

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(self.abort(stage, err, &created).await),
            Err(_) => {
                let err = AppError::TransformFailure(format!(
                    "Operation '{}' exceeded the {:?} time limit",
                    operation, self.settings.transform_timeout
                ));
                return Err(self.abort(stage, err, &created).await);
            }
        };

        let result = match output {
            TransformOutput::Text(text) => ProcessingResult {
                file_url: None,
                text: Some(text),
                output: None,
            },
            TransformOutput::File(artifact) => {
                let artifact = match self.verify_output(&artifact).await {
                    Ok(artifact) => artifact,
                    Err(err) => return Err(self.abort(stage, err, &created).await),
                };
                stage = Stage::OutputMaterialized;
                tracing::debug!(
                    stage = %stage,
                    artifact = %artifact,
                    size_bytes = artifact.size_bytes.unwrap_or(0),
                    "Output materialized"
                );

                let url = match self.resolver.resolve(&request.forwarding, &artifact) {
                    Ok(url) => url,
                    Err(err) => return Err(self.abort(stage, err, &created).await),
                };
                stage = Stage::Resolved;
                tracing::debug!(stage = %stage, "Reference resolved");

                ProcessingResult {
                    file_url: Some(url),
                    text: None,
                    output: Some(artifact),
                }
            }
        };

        if self.settings.early_input_cleanup {
            let scratch = created.iter().filter(|a| a.namespace == Namespace::Intake);
            for artifact in inputs.iter().chain(scratch) {
                if let Err(e) = self.store.remove(artifact).await {
                    tracing::warn!(artifact = %artifact, error = %e, "Early cleanup failed");
                }
            }
        }

        stage = Stage::Complete;
        tracing::info!(
            stage = %stage,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Request processed"
        );
        Ok(result)
    }

    fn validate(&self, request: &ProcessingRequest) -> Result<transmute_core::ResolvedParams, AppError> {
        if request.uploads.len() > self.settings.max_files_per_request {
            return Err(AppError::ValidationFailure(format!(
                "Too many files: {} (maximum {})",
                request.uploads.len(),
                self.settings.max_files_per_request
            )));
        }

        if let Some(empty) = request.uploads.iter().find(|u| u.data.is_empty()) {
            return Err(AppError::ValidationFailure(format!(
                "File '{}' is empty",
                empty.original_name
            )));
        }

        request
            .operation
            .contract()
            .validate(request.operation, request.uploads.len(), &request.params)
    }

    /// Persist uploads to intake, registering each for reclamation as soon as it exists
    async fn materialize_inputs(&self, uploads: Vec<Upload>) -> Result<Vec<Artifact>, AppError> {
        let mut inputs = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let artifact = self
                .store
                .materialize(upload.data, &upload.original_name, Namespace::Intake)
                .await?;
            self.scheduler.register(&artifact, self.settings.retention);
            inputs.push(artifact);
        }
        Ok(inputs)
    }

    /// The output must exist, be non-empty and be servable
    async fn verify_output(&self, artifact: &Artifact) -> Result<Artifact, AppError> {
        if artifact.namespace != Namespace::Output {
            return Err(AppError::Internal(format!(
                "Strategy returned non-output artifact '{}'",
                artifact
            )));
        }

        let artifact = match self.store.stat(artifact).await {
            Ok(artifact) => artifact,
            Err(StorageError::NotFound(_)) => {
                return Err(AppError::TransformFailure(
                    "Transform produced no output file".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if artifact.size_bytes == Some(0) {
            return Err(AppError::TransformFailure(
                "Transform produced an empty output file".to_string(),
            ));
        }
        Ok(artifact)
    }

    /// Fail after dispatch. Outputs the strategy left behind are deleted right away so a
    /// partial or unverified file is never served; they stay registered for reclamation.
    async fn abort(&self, stage: Stage, err: AppError, created: &[Artifact]) -> AppError {
        for artifact in created.iter().filter(|a| a.namespace == Namespace::Output) {
            if let Err(e) = self.store.remove(artifact).await {
                tracing::warn!(artifact = %artifact, error = %e, "Failed to discard output");
            }
        }
        self.fail(stage, err)
    }

    fn fail(&self, stage: Stage, err: AppError) -> AppError {
        match err.log_level() {
            LogLevel::Debug => tracing::debug!(stage = %stage, error = %err, "Request failed"),
            LogLevel::Warn => tracing::warn!(stage = %stage, error = %err, "Request failed"),
            LogLevel::Error => {
                tracing::error!(stage = %stage, error = %err.detailed_message(), "Request failed")
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::pdf::fixtures::{markers, pdf};
    use crate::traits::TransformStrategy;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;
    use transmute_core::ResolvedParams;
    use transmute_storage::LocalArtifactStore;

    struct Harness {
        dir: TempDir,
        store: Arc<LocalArtifactStore>,
        scheduler: ReclamationScheduler,
        coordinator: PipelineCoordinator,
    }

    impl Harness {
        fn count(&self, namespace: Namespace) -> usize {
            std::fs::read_dir(self.dir.path().join(namespace.dir_name()))
                .unwrap()
                .count()
        }
    }

    async fn harness_with(registry: TransformRegistry, settings: PipelineSettings) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalArtifactStore::new(dir.path()).await.unwrap());
        let (scheduler, _handle) = ReclamationScheduler::start(store.clone());
        let coordinator = PipelineCoordinator::new(
            store.clone(),
            Arc::new(registry),
            scheduler.clone(),
            ReferenceResolver::default(),
            settings,
        );
        Harness {
            dir,
            store,
            scheduler,
            coordinator,
        }
    }

    async fn harness() -> Harness {
        let config = Config {
            early_input_cleanup: false,
            ..Config::default()
        };
        harness_with(
            TransformRegistry::with_defaults(&config).unwrap(),
            PipelineSettings::from(&config),
        )
        .await
    }

    fn upload(name: &str, data: Vec<u8>) -> Upload {
        Upload {
            original_name: name.to_string(),
            data: Bytes::from(data),
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 10, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn request(operation: Operation, uploads: Vec<Upload>, pairs: &[(&str, &str)]) -> ProcessingRequest {
        ProcessingRequest {
            operation,
            uploads,
            params: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            forwarding: ForwardingContext {
                forwarded_proto: Some("https".to_string()),
                host: Some("files.example.com".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_success_resolves_url_and_registers_everything() {
        let h = harness().await;
        let result = h
            .coordinator
            .process(request(
                Operation::ImageResize,
                vec![upload("cat.png", png(40, 20))],
                &[("width", "10")],
            ))
            .await
            .unwrap();

        let output = result.output.clone().unwrap();
        assert_eq!(
            result.file_url.as_deref(),
            Some(format!("https://files.example.com/files/{}", output.name).as_str())
        );
        assert!(h.store.exists(&output).await.unwrap());
        // one input plus one output
        assert_eq!(h.scheduler.pending(), 2);
    }

    #[tokio::test]
    async fn test_merge_with_one_file_creates_no_artifacts() {
        let h = harness().await;
        for operation in [Operation::PdfMerge, Operation::VideoMerge] {
            let err = h
                .coordinator
                .process(request(operation, vec![upload("a.pdf", pdf(&[1]))], &[]))
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(h.count(Namespace::Intake), 0);
        assert_eq!(h.count(Namespace::Output), 0);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_crop_missing_parameter_writes_nothing() {
        let h = harness().await;
        let err = h
            .coordinator
            .process(request(
                Operation::ImageCrop,
                vec![upload("cat.png", png(20, 20))],
                &[("width", "5"), ("height", "5"), ("left", "0")],
            ))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.count(Namespace::Intake), 0);
    }

    #[tokio::test]
    async fn test_strategy_failure_still_registers_inputs() {
        let h = harness().await;
        let err = h
            .coordinator
            .process(request(
                Operation::PdfRotate,
                vec![upload("broken.pdf", b"not a pdf".to_vec())],
                &[],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TransformFailure(_)));
        assert_eq!(h.count(Namespace::Intake), 1);
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_early_cleanup_removes_inputs_only() {
        let config = Config::default();
        let h = harness_with(
            TransformRegistry::with_defaults(&config).unwrap(),
            PipelineSettings::from(&config),
        )
        .await;
        let result = h
            .coordinator
            .process(request(
                Operation::PdfMerge,
                vec![upload("a.pdf", pdf(&[1])), upload("b.pdf", pdf(&[2]))],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(h.count(Namespace::Intake), 0);
        let output = result.output.unwrap();
        let data = h.store.read(&output).await.unwrap();
        assert_eq!(markers(&data), vec![1, 2]);
        // inputs stay registered; their scheduled removal will find them absent
        assert_eq!(h.scheduler.pending(), 3);
    }

    #[tokio::test]
    async fn test_dominant_color_returns_text_without_artifact() {
        let h = harness().await;
        let result = h
            .coordinator
            .process(request(
                Operation::ImageDominantColor,
                vec![upload("leaf.png", png(4, 4))],
                &[],
            ))
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("#08c808"));
        assert!(result.file_url.is_none());
        assert_eq!(h.count(Namespace::Output), 0);
    }

    struct Hanging;

    #[async_trait]
    impl TransformStrategy for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn supported_operations(&self) -> Vec<Operation> {
            vec![Operation::VideoCompress]
        }

        async fn run(
            &self,
            _operation: Operation,
            ctx: &TransformContext,
            inputs: &[Artifact],
            _params: &ResolvedParams,
        ) -> Result<TransformOutput, AppError> {
            ctx.reserve_output(&inputs[0], "mp4").await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            unreachable!("the coordinator enforces a time limit")
        }
    }

    #[tokio::test]
    async fn test_timeout_discards_partial_output_but_keeps_it_registered() {
        let mut registry = TransformRegistry::new();
        registry.register(Arc::new(Hanging));
        let settings = PipelineSettings {
            transform_timeout: Duration::from_millis(100),
            ..PipelineSettings::from(&Config::default())
        };
        let h = harness_with(registry, settings).await;

        let err = h
            .coordinator
            .process(request(
                Operation::VideoCompress,
                vec![upload("clip.mp4", vec![0u8; 16])],
                &[],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransformFailure(msg) if msg.contains("time limit")));
        assert_eq!(h.count(Namespace::Output), 0);
        assert_eq!(h.scheduler.pending(), 2);
    }

    struct EmptyOutput;

    #[async_trait]
    impl TransformStrategy for EmptyOutput {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn supported_operations(&self) -> Vec<Operation> {
            vec![Operation::VideoToGif]
        }

        async fn run(
            &self,
            _operation: Operation,
            ctx: &TransformContext,
            inputs: &[Artifact],
            _params: &ResolvedParams,
        ) -> Result<TransformOutput, AppError> {
            let output = ctx.reserve_output(&inputs[0], "gif").await?;
            Ok(TransformOutput::File(output))
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_transform_failure() {
        let mut registry = TransformRegistry::new();
        registry.register(Arc::new(EmptyOutput));
        let h = harness_with(registry, PipelineSettings::from(&Config::default())).await;

        let err = h
            .coordinator
            .process(request(
                Operation::VideoToGif,
                vec![upload("clip.mp4", vec![1u8; 16])],
                &[],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TransformFailure(_)));
        assert_eq!(h.count(Namespace::Output), 0);
        assert_eq!(h.scheduler.pending(), 2);
    }

    struct WritesThenFails;

    #[async_trait]
    impl TransformStrategy for WritesThenFails {
        fn name(&self) -> &'static str {
            "writes-then-fails"
        }

        fn supported_operations(&self) -> Vec<Operation> {
            vec![Operation::VideoConvert]
        }

        async fn run(
            &self,
            _operation: Operation,
            ctx: &TransformContext,
            inputs: &[Artifact],
            _params: &ResolvedParams,
        ) -> Result<TransformOutput, AppError> {
            let output = ctx.reserve_output(&inputs[0], "webm").await?;
            tokio::fs::write(&output.path, b"truncated container")
                .await
                .map_err(AppError::from)?;
            Err(AppError::TransformFailure("ffmpeg exited with status 1".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_transform_leaves_no_servable_output() {
        let mut registry = TransformRegistry::new();
        registry.register(Arc::new(WritesThenFails));
        let h = harness_with(registry, PipelineSettings::from(&Config::default())).await;

        let err = h
            .coordinator
            .process(request(
                Operation::VideoConvert,
                vec![upload("clip.mp4", vec![1u8; 16])],
                &[("format", "webm")],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransformFailure(_)));
        assert_eq!(h.count(Namespace::Output), 0);
        // input plus the discarded output
        assert_eq!(h.scheduler.pending(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let h = harness().await;
        let first = h.coordinator.process(request(
            Operation::PdfSplit,
            vec![upload("same.pdf", pdf(&[1, 2, 3]))],
            &[("pages", "2")],
        ));
        let second = h.coordinator.process(request(
            Operation::PdfSplit,
            vec![upload("same.pdf", pdf(&[4, 5, 6]))],
            &[("pages", "3")],
        ));
        let (first, second) = tokio::join!(first, second);
        let (first, second) = (first.unwrap(), second.unwrap());

        let a = first.output.unwrap();
        let b = second.output.unwrap();
        assert_ne!(a.name, b.name);
        assert_eq!(markers(&h.store.read(&a).await.unwrap()), vec![2]);
        assert_eq!(markers(&h.store.read(&b).await.unwrap()), vec![6]);
    }
}
