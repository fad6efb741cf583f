//! Document transformer - PDF merge, split and rotate

use crate::context::TransformContext;
use crate::document::pdf;
use crate::traits::{TransformOutput, TransformStrategy};
use async_trait::async_trait;
use bytes::Bytes;
use transmute_core::{AppError, Artifact, Operation, ResolvedParams};

pub struct DocumentTransformer;

impl Default for DocumentTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStrategy for DocumentTransformer {
    fn name(&self) -> &'static str {
        "document"
    }

    fn supported_operations(&self) -> Vec<Operation> {
        vec![Operation::PdfMerge, Operation::PdfSplit, Operation::PdfRotate]
    }

    #[tracing::instrument(skip(self, ctx, inputs, params), fields(operation = %operation, inputs = inputs.len()))]
    async fn run(
        &self,
        operation: Operation,
        ctx: &TransformContext,
        inputs: &[Artifact],
        params: &ResolvedParams,
    ) -> Result<TransformOutput, AppError> {
        let first = inputs
            .first()
            .ok_or_else(|| AppError::ValidationFailure("No input document".to_string()))?;

        let mut documents = Vec::with_capacity(inputs.len());
        for input in inputs {
            documents.push(ctx.read_input(input).await?);
        }

        let job: Box<dyn FnOnce(Vec<Bytes>) -> Result<Vec<u8>, AppError> + Send> = match operation {
            Operation::PdfMerge => {
                if documents.len() < 2 {
                    return Err(AppError::TransformFailure(
                        "Merge requires at least 2 inputs".to_string(),
                    ));
                }
                Box::new(|docs: Vec<Bytes>| {
                    let slices: Vec<&[u8]> = docs.iter().map(|d| d.as_ref()).collect();
                    pdf::merge(&slices)
                })
            }
            Operation::PdfSplit => {
                let selection = params.require_text("pages")?.to_string();
                Box::new(move |docs: Vec<Bytes>| pdf::split(&docs[0], &selection))
            }
            Operation::PdfRotate => {
                let angle = params.require_integer("angle")?;
                Box::new(move |docs: Vec<Bytes>| pdf::rotate(&docs[0], angle))
            }
            other => {
                return Err(AppError::Internal(format!(
                    "Document transformer cannot run '{}'",
                    other
                )))
            }
        };

        let start = std::time::Instant::now();
        let data = tokio::task::spawn_blocking(move || job(documents))
            .await
            .map_err(|e| AppError::Internal(format!("Document task failed: {}", e)))??;

        tracing::debug!(
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Document rendered"
        );

        let output = ctx.write_output(Bytes::from(data), first, "pdf").await?;
        Ok(TransformOutput::File(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::pdf::fixtures::{markers, pdf as pdf_fixture, rotations};
    use std::sync::Arc;
    use tempfile::tempdir;
    use transmute_core::{Namespace, Params};
    use transmute_storage::{ArtifactStore, LocalArtifactStore};

    async fn run(
        operation: Operation,
        documents: Vec<Vec<u8>>,
        pairs: &[(&str, &str)],
    ) -> (Result<TransformOutput, AppError>, Arc<LocalArtifactStore>, TransformContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalArtifactStore::new(dir.path()).await.unwrap());
        let mut inputs = Vec::new();
        for (i, data) in documents.into_iter().enumerate() {
            inputs.push(
                store
                    .materialize(Bytes::from(data), &format!("doc{}.pdf", i), Namespace::Intake)
                    .await
                    .unwrap(),
            );
        }
        let params: Params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let resolved = operation
            .contract()
            .validate(operation, inputs.len(), &params)
            .unwrap();
        let ctx = TransformContext::new(store.clone(), operation);
        let result = DocumentTransformer::new()
            .run(operation, &ctx, &inputs, &resolved)
            .await;
        (result, store, ctx, dir)
    }

    async fn output_bytes(store: &LocalArtifactStore, output: TransformOutput) -> Bytes {
        match output {
            TransformOutput::File(artifact) => store.read(&artifact).await.unwrap(),
            TransformOutput::Text(_) => panic!("expected a file"),
        }
    }

    #[tokio::test]
    async fn test_merge_writes_one_output() {
        let (result, store, ctx, _dir) = run(
            Operation::PdfMerge,
            vec![pdf_fixture(&[1]), pdf_fixture(&[2, 3])],
            &[],
        )
        .await;
        let data = output_bytes(&store, result.unwrap()).await;
        assert_eq!(markers(&data), vec![1, 2, 3]);
        assert_eq!(ctx.created().len(), 1);
    }

    #[tokio::test]
    async fn test_split_default_selection_is_first_page() {
        let (result, store, _ctx, _dir) =
            run(Operation::PdfSplit, vec![pdf_fixture(&[7, 8, 9])], &[]).await;
        let data = output_bytes(&store, result.unwrap()).await;
        assert_eq!(markers(&data), vec![7]);
    }

    #[tokio::test]
    async fn test_rotate_default_angle() {
        let (result, store, _ctx, _dir) =
            run(Operation::PdfRotate, vec![pdf_fixture(&[1, 2])], &[]).await;
        let data = output_bytes(&store, result.unwrap()).await;
        assert_eq!(rotations(&data), vec![90, 90]);
    }

    #[tokio::test]
    async fn test_failed_merge_creates_nothing() {
        let (result, _store, ctx, dir) = run(
            Operation::PdfMerge,
            vec![pdf_fixture(&[1]), b"not a pdf".to_vec()],
            &[],
        )
        .await;
        assert!(matches!(result, Err(AppError::TransformFailure(_))));
        assert!(ctx.created().is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("output")).unwrap().count(), 0);
    }
}
