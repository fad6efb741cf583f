//! Image transformer - raster operations on a single input
//!
//! Decoding, processing and encoding are CPU-bound and run on the blocking pool.

use crate::context::TransformContext;
use crate::image::color::dominant_color;
use crate::image::encode::{encode, encode_jpeg, encode_png_best, extension, target_format};
use crate::image::resize::{ImageResize, MAX_DECODE_ALLOC};
use crate::traits::{TransformOutput, TransformStrategy};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use transmute_core::{AppError, Artifact, Operation, ResolvedParams};

/// Encoded result of one image operation
enum Rendered {
    Encoded { data: Vec<u8>, format: ImageFormat },
    Text(String),
}

/// Image operation with its typed parameters
#[derive(Debug, Clone)]
enum ImageJob {
    Resize { width: Option<u32>, height: Option<u32> },
    Compress { quality: u8 },
    Crop { width: u32, height: u32, left: u32, top: u32 },
    Blur { radius: f32 },
    Convert { format: ImageFormat },
    Grayscale,
    Rotate { angle: u32 },
    DominantColor,
}

impl ImageJob {
    fn from_params(operation: Operation, params: &ResolvedParams) -> Result<Self, AppError> {
        let dimension = |name: &str| params.integer(name).map(|v| v as u32);

        Ok(match operation {
            Operation::ImageResize => ImageJob::Resize {
                width: dimension("width"),
                height: dimension("height"),
            },
            Operation::ImageCompress => ImageJob::Compress {
                quality: params.require_integer("quality")? as u8,
            },
            Operation::ImageCrop => ImageJob::Crop {
                width: params.require_integer("width")? as u32,
                height: params.require_integer("height")? as u32,
                left: params.require_integer("left")? as u32,
                top: params.require_integer("top")? as u32,
            },
            Operation::ImageBlur => ImageJob::Blur {
                radius: params.require_integer("radius")? as f32,
            },
            Operation::ImageConvert => ImageJob::Convert {
                format: target_format(params.require_text("format")?)?,
            },
            Operation::ImageGrayscale => ImageJob::Grayscale,
            Operation::ImageRotate => ImageJob::Rotate {
                angle: params.require_integer("angle")? as u32,
            },
            Operation::ImageDominantColor => ImageJob::DominantColor,
            other => {
                return Err(AppError::Internal(format!(
                    "Image transformer cannot run '{}'",
                    other
                )))
            }
        })
    }

    fn render(&self, data: &[u8]) -> Result<Rendered, AppError> {
        let source_format = image::guess_format(data)
            .map_err(|e| AppError::TransformFailure(format!("Unrecognized image format: {}", e)))?;
        let img = decode(data, source_format)?;

        // Re-encode in the input's format when the encoder exists, PNG otherwise
        let same_format = if source_format.writing_enabled() {
            source_format
        } else {
            ImageFormat::Png
        };

        let (output, format) = match self {
            ImageJob::Resize { width, height } => {
                (ImageResize::resize(&img, *width, *height)?, same_format)
            }
            ImageJob::Compress { quality } => {
                return if source_format == ImageFormat::Png {
                    Ok(Rendered::Encoded {
                        data: encode_png_best(&img)?,
                        format: ImageFormat::Png,
                    })
                } else {
                    Ok(Rendered::Encoded {
                        data: encode_jpeg(&img, *quality)?,
                        format: ImageFormat::Jpeg,
                    })
                };
            }
            ImageJob::Crop {
                width,
                height,
                left,
                top,
            } => {
                let (img_width, img_height) = img.dimensions();
                let fits_x = left.checked_add(*width).is_some_and(|right| right <= img_width);
                let fits_y = top.checked_add(*height).is_some_and(|bottom| bottom <= img_height);
                if !fits_x || !fits_y {
                    return Err(AppError::ValidationFailure(format!(
                        "Crop region {}x{}+{}+{} exceeds image bounds {}x{}",
                        width, height, left, top, img_width, img_height
                    )));
                }
                (img.crop_imm(*left, *top, *width, *height), same_format)
            }
            ImageJob::Blur { radius } => (img.blur(*radius), same_format),
            ImageJob::Convert { format } => (img, *format),
            ImageJob::Grayscale => (img.grayscale(), same_format),
            ImageJob::Rotate { angle } => {
                let rotated = match angle {
                    90 => img.rotate90(),
                    180 => img.rotate180(),
                    270 => img.rotate270(),
                    _ => img,
                };
                (rotated, same_format)
            }
            ImageJob::DominantColor => return Ok(Rendered::Text(dominant_color(&img))),
        };

        Ok(Rendered::Encoded {
            data: encode(&output, format)?,
            format,
        })
    }
}

fn decode(data: &[u8], format: ImageFormat) -> Result<DynamicImage, AppError> {
    let mut limits = Limits::default();
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::with_format(Cursor::new(data), format);
    reader.limits(limits);
    reader
        .decode()
        .map_err(|e| AppError::TransformFailure(format!("Failed to decode image: {}", e)))
}

pub struct ImageTransformer;

impl Default for ImageTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageTransformer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStrategy for ImageTransformer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn supported_operations(&self) -> Vec<Operation> {
        vec![
            Operation::ImageResize,
            Operation::ImageCompress,
            Operation::ImageCrop,
            Operation::ImageBlur,
            Operation::ImageConvert,
            Operation::ImageGrayscale,
            Operation::ImageRotate,
            Operation::ImageDominantColor,
        ]
    }

    #[tracing::instrument(skip(self, ctx, inputs, params), fields(operation = %operation))]
    async fn run(
        &self,
        operation: Operation,
        ctx: &TransformContext,
        inputs: &[Artifact],
        params: &ResolvedParams,
    ) -> Result<TransformOutput, AppError> {
        let input = inputs
            .first()
            .ok_or_else(|| AppError::ValidationFailure("No input image".to_string()))?;
        let job = ImageJob::from_params(operation, params)?;
        let data = ctx.read_input(input).await?;

        let start = std::time::Instant::now();
        let rendered = tokio::task::spawn_blocking(move || job.render(&data))
            .await
            .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))??;

        match rendered {
            Rendered::Text(text) => {
                tracing::debug!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Image analysis finished"
                );
                Ok(TransformOutput::Text(text))
            }
            Rendered::Encoded { data, format } => {
                tracing::debug!(
                    size_bytes = data.len(),
                    format = ?format,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Image rendered"
                );
                let output = ctx
                    .write_output(Bytes::from(data), input, extension(format))
                    .await?;
                Ok(TransformOutput::File(output))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;
    use tempfile::tempdir;
    use transmute_core::{Namespace, Params};
    use transmute_storage::{ArtifactStore, LocalArtifactStore};

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    async fn run(
        operation: Operation,
        pairs: &[(&str, &str)],
        data: Bytes,
    ) -> (Arc<LocalArtifactStore>, Result<TransformOutput, AppError>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalArtifactStore::new(dir.path()).await.unwrap());
        let input = store
            .materialize(data, "photo.png", Namespace::Intake)
            .await
            .unwrap();
        let params: Params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let resolved = operation.contract().validate(operation, 1, &params).unwrap();
        let ctx = TransformContext::new(store.clone(), operation);
        let result = ImageTransformer::new()
            .run(operation, &ctx, &[input], &resolved)
            .await;
        (store, result, dir)
    }

    async fn decoded(store: &LocalArtifactStore, output: TransformOutput) -> (DynamicImage, Artifact) {
        let artifact = match output {
            TransformOutput::File(artifact) => artifact,
            TransformOutput::Text(text) => panic!("expected a file, got text {text}"),
        };
        let data = store.read(&artifact).await.unwrap();
        (image::load_from_memory(&data).unwrap(), artifact)
    }

    #[tokio::test]
    async fn test_resize_keeps_format_and_aspect() {
        let (store, result, _dir) = run(Operation::ImageResize, &[("width", "20")], png(40, 10)).await;
        let (img, artifact) = decoded(&store, result.unwrap()).await;
        assert_eq!(img.dimensions(), (20, 5));
        assert_eq!(artifact.extension().as_deref(), Some("png"));
        assert_eq!(artifact.namespace, Namespace::Output);
    }

    #[tokio::test]
    async fn test_resize_extreme_aspect_rejected_without_output() {
        let (_store, result, dir) =
            run(Operation::ImageResize, &[("width", "16384")], png(1, 1000)).await;
        assert!(result.unwrap_err().is_validation());
        let outputs = std::fs::read_dir(dir.path().join("output")).unwrap().count();
        assert_eq!(outputs, 0);
    }

    #[tokio::test]
    async fn test_crop_out_of_bounds_rejected() {
        let (_store, result, _dir) = run(
            Operation::ImageCrop,
            &[("width", "20"), ("height", "20"), ("left", "15"), ("top", "0")],
            png(30, 30),
        )
        .await;
        assert!(result.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_crop_region() {
        let (store, result, _dir) = run(
            Operation::ImageCrop,
            &[("width", "10"), ("height", "5"), ("left", "2"), ("top", "3")],
            png(30, 30),
        )
        .await;
        let (img, _) = decoded(&store, result.unwrap()).await;
        assert_eq!(img.dimensions(), (10, 5));
    }

    #[tokio::test]
    async fn test_convert_lowercases_format() {
        let (store, result, _dir) =
            run(Operation::ImageConvert, &[("format", "JPEG")], png(8, 8)).await;
        let (_, artifact) = decoded(&store, result.unwrap()).await;
        assert_eq!(artifact.extension().as_deref(), Some("jpg"));
    }

    #[tokio::test]
    async fn test_convert_unsupported_format() {
        let (_store, result, _dir) =
            run(Operation::ImageConvert, &[("format", "xyz")], png(8, 8)).await;
        assert!(matches!(result, Err(AppError::TransformFailure(_))));
    }

    #[tokio::test]
    async fn test_rotate_swaps_dimensions() {
        let (store, result, _dir) = run(Operation::ImageRotate, &[], png(12, 4)).await;
        let (img, _) = decoded(&store, result.unwrap()).await;
        assert_eq!(img.dimensions(), (4, 12));
    }

    #[tokio::test]
    async fn test_compress_png_stays_png() {
        let (store, result, _dir) = run(Operation::ImageCompress, &[("quality", "40")], png(16, 16)).await;
        let (_, artifact) = decoded(&store, result.unwrap()).await;
        assert_eq!(artifact.extension().as_deref(), Some("png"));
    }

    #[tokio::test]
    async fn test_dominant_color_is_text_only() {
        let (_store, result, dir) = run(Operation::ImageDominantColor, &[], png(8, 8)).await;
        match result.unwrap() {
            TransformOutput::Text(text) => assert_eq!(text, "#c81818"),
            TransformOutput::File(_) => panic!("dominant color must not create a file"),
        }
        let outputs = std::fs::read_dir(dir.path().join("output")).unwrap().count();
        assert_eq!(outputs, 0);
    }

    #[tokio::test]
    async fn test_garbage_input_is_transform_failure() {
        let (_store, result, _dir) = run(
            Operation::ImageBlur,
            &[],
            Bytes::from_static(b"definitely not an image"),
        )
        .await;
        assert!(matches!(result, Err(AppError::TransformFailure(_))));
    }
}
