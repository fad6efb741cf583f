//! Video transformer - ffmpeg subprocess per operation
//!
//! The encoder runs as a child process awaited cooperatively. Children are killed if the
//! awaiting future is dropped, which is how the coordinator's time limit takes effect.

use crate::context::TransformContext;
use crate::traits::{TransformOutput, TransformStrategy};
use crate::video::args;
use crate::video::probe::{ensure_compatible, parse_probe, StreamProfile};
use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use transmute_core::{AppError, Artifact, Operation, ResolvedParams};

const DANGEROUS_CHARS: [char; 11] = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
const STDERR_TAIL_LINES: usize = 3;

pub struct VideoTransformer {
    ffmpeg_path: String,
    ffprobe_path: String,
    crf: u8,
}

impl VideoTransformer {
    pub fn new(ffmpeg_path: String, ffprobe_path: String, crf: u8) -> Result<Self, anyhow::Error> {
        for (name, path) in [("ffmpeg_path", &ffmpeg_path), ("ffprobe_path", &ffprobe_path)] {
            if path.is_empty() || path.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
                return Err(anyhow!("Invalid {}: contains dangerous characters", name));
            }
        }

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            crf,
        })
    }

    async fn run_ffmpeg(&self, label: &str, args: &[String], involved: &[&Artifact]) -> Result<(), AppError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::TransformFailure(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                label,
                status = ?output.status.code(),
                stderr = %stderr,
                "FFmpeg failed"
            );
            return Err(AppError::TransformFailure(format!(
                "FFmpeg {} failed: {}",
                label,
                redact(&stderr_tail(&stderr), involved)
            )));
        }

        tracing::debug!(
            label,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg finished"
        );
        Ok(())
    }

    async fn probe(&self, input: &Artifact) -> Result<Option<StreamProfile>, AppError> {
        let output = Command::new(&self.ffprobe_path)
            .args(args::probe_args(&input.path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::TransformFailure(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::TransformFailure(format!(
                "FFprobe failed: {}",
                redact(&stderr_tail(&stderr), &[input])
            )));
        }

        parse_probe(&String::from_utf8_lossy(&output.stdout))
    }

    async fn merge(&self, ctx: &TransformContext, inputs: &[Artifact]) -> Result<Artifact, AppError> {
        if inputs.len() < 2 {
            return Err(AppError::TransformFailure(
                "Merge requires at least 2 inputs".to_string(),
            ));
        }

        let mut profiles = Vec::with_capacity(inputs.len());
        for input in inputs {
            profiles.push(self.probe(input).await?);
        }
        ensure_compatible(&profiles)?;

        let paths: Vec<&Path> = inputs.iter().map(|a| a.path.as_path()).collect();
        let manifest = ctx
            .scratch(Bytes::from(args::concat_manifest(&paths)), "concat.txt")
            .await?;

        let first = &inputs[0];
        let output = ctx
            .reserve_output(first, &first.extension().unwrap_or_else(|| "mp4".to_string()))
            .await?;

        let mut involved: Vec<&Artifact> = inputs.iter().collect();
        involved.push(&manifest);
        involved.push(&output);

        self.run_ffmpeg(
            "merge",
            &args::merge_args(&manifest.path, &output.path),
            &involved,
        )
        .await?;
        Ok(output)
    }
}

#[async_trait]
impl TransformStrategy for VideoTransformer {
    fn name(&self) -> &'static str {
        "video"
    }

    fn supported_operations(&self) -> Vec<Operation> {
        vec![
            Operation::VideoConvert,
            Operation::VideoCompress,
            Operation::VideoMerge,
            Operation::VideoSpeed,
            Operation::VideoToGif,
            Operation::VideoExtractAudio,
        ]
    }

    #[tracing::instrument(skip(self, ctx, inputs, params), fields(operation = %operation, inputs = inputs.len()))]
    async fn run(
        &self,
        operation: Operation,
        ctx: &TransformContext,
        inputs: &[Artifact],
        params: &ResolvedParams,
    ) -> Result<TransformOutput, AppError> {
        if operation == Operation::VideoMerge {
            return self.merge(ctx, inputs).await.map(TransformOutput::File);
        }

        let input = inputs
            .first()
            .ok_or_else(|| AppError::ValidationFailure("No input video".to_string()))?;
        let same_container = input.extension().unwrap_or_else(|| "mp4".to_string());

        let (label, extension, codec) = match operation {
            Operation::VideoConvert => (
                "convert",
                args::video_container(params.require_text("format")?)?,
                None,
            ),
            Operation::VideoCompress => ("compress", "mp4".to_string(), None),
            Operation::VideoSpeed => ("speed", same_container, None),
            Operation::VideoToGif => ("to-gif", "gif".to_string(), None),
            Operation::VideoExtractAudio => {
                let (format, codec) = args::audio_codec(params.require_text("format")?)?;
                ("extract-audio", format, Some(codec))
            }
            other => {
                return Err(AppError::Internal(format!(
                    "Video transformer cannot run '{}'",
                    other
                )))
            }
        };

        let output = ctx.reserve_output(input, &extension).await?;

        let ffmpeg_args = match operation {
            Operation::VideoConvert => args::convert_args(&input.path, &output.path, &extension),
            Operation::VideoCompress => args::compress_args(&input.path, &output.path, self.crf),
            Operation::VideoSpeed => {
                args::speed_args(&input.path, &output.path, params.require_number("speed")?)
            }
            Operation::VideoToGif => args::gif_args(
                &input.path,
                &output.path,
                params.require_integer("width")? as u32,
                params.require_integer("fps")? as u32,
            ),
            _ => args::extract_audio_args(&input.path, &output.path, codec.unwrap_or("copy")),
        };

        self.run_ffmpeg(label, &ffmpeg_args, &[input, &output]).await?;
        Ok(TransformOutput::File(output))
    }
}

/// Last few non-empty stderr lines, which is where ffmpeg puts the actual error
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join(" | ")
}

/// Replace absolute artifact paths with bare artifact names
fn redact(message: &str, involved: &[&Artifact]) -> String {
    involved.iter().fold(message.to_string(), |acc, artifact| {
        acc.replace(&*artifact.path.to_string_lossy(), &artifact.name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use transmute_core::Namespace;

    #[test]
    fn test_rejects_dangerous_binary_paths() {
        assert!(VideoTransformer::new("ffmpeg; rm -rf /".to_string(), "ffprobe".to_string(), 28).is_err());
        assert!(VideoTransformer::new("ffmpeg".to_string(), "$(ffprobe)".to_string(), 28).is_err());
        assert!(VideoTransformer::new("/usr/bin/ffmpeg".to_string(), "ffprobe".to_string(), 28).is_ok());
    }

    #[test]
    fn test_stderr_tail_and_redaction() {
        let input = Artifact::new(
            "1-1-clip.mp4".to_string(),
            Namespace::Intake,
            PathBuf::from("/srv/data/intake/1-1-clip.mp4"),
        );
        let stderr = "ffmpeg version 6\n\n  built with gcc\n/srv/data/intake/1-1-clip.mp4: Invalid data found when processing input\n";
        let message = redact(&stderr_tail(stderr), &[&input]);
        assert!(message.ends_with("1-1-clip.mp4: Invalid data found when processing input"));
        assert!(!message.contains("/srv/data"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_transform_failure() {
        let transformer = VideoTransformer::new(
            "/nonexistent/transmute-ffmpeg".to_string(),
            "/nonexistent/transmute-ffprobe".to_string(),
            28,
        )
        .unwrap();
        let err = transformer
            .run_ffmpeg("convert", &["-version".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TransformFailure(_)));
    }
}
