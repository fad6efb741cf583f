//! FFmpeg argument builders
//!
//! Pure functions from paths and parameters to argument vectors. Every builder forces
//! overwrite (`-y`) because the output file has already been reserved empty.

use std::path::Path;
use transmute_core::AppError;

pub const VIDEO_CONTAINERS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi", "m4v"];

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn base_args(input: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        path_arg(input),
    ]
}

/// Normalize and check a container for video-convert
pub fn video_container(requested: &str) -> Result<String, AppError> {
    let format = requested.trim().to_lowercase();
    if VIDEO_CONTAINERS.contains(&format.as_str()) {
        Ok(format)
    } else {
        Err(AppError::TransformFailure(format!(
            "Unsupported target format '{}'. Supported: {}",
            format,
            VIDEO_CONTAINERS.join(", ")
        )))
    }
}

/// Audio codec for an extract-audio target format
pub fn audio_codec(requested: &str) -> Result<(String, &'static str), AppError> {
    let format = requested.trim().to_lowercase();
    let codec = match format.as_str() {
        "mp3" => "libmp3lame",
        "aac" | "m4a" => "aac",
        "wav" => "pcm_s16le",
        "ogg" => "libvorbis",
        "flac" => "flac",
        "opus" => "libopus",
        _ => {
            return Err(AppError::TransformFailure(format!(
                "Unsupported audio format '{}'",
                format
            )))
        }
    };
    Ok((format, codec))
}

pub fn convert_args(input: &Path, output: &Path, format: &str) -> Vec<String> {
    let mut args = base_args(input);
    if format == "webm" {
        args.extend_from_slice(&[
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-c:a".to_string(),
            "libopus".to_string(),
        ]);
    }
    args.push(path_arg(output));
    args
}

/// Constant-rate-factor re-encode
pub fn compress_args(input: &Path, output: &Path, crf: u8) -> Vec<String> {
    let mut args = base_args(input);
    args.extend_from_slice(&[
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        path_arg(output),
    ]);
    args
}

/// Concat demuxer over a manifest, streams copied without re-encoding. `-safe 0` lets the
/// manifest carry absolute paths.
pub fn merge_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_arg(manifest),
        "-c".to_string(),
        "copy".to_string(),
        path_arg(output),
    ]
}

/// Concat manifest listing `paths` in order
pub fn concat_manifest(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|path| format!("file '{}'\n", path.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// Timestamps scaled by `1/speed`, audio tempo by `speed`
pub fn speed_args(input: &Path, output: &Path, speed: f64) -> Vec<String> {
    let mut args = base_args(input);
    args.extend_from_slice(&[
        "-filter:v".to_string(),
        format!("setpts=PTS/{}", speed),
        "-filter:a".to_string(),
        format!("atempo={}", speed),
        path_arg(output),
    ]);
    args
}

/// Frame-rate downsampling plus width-bounded lanczos scaling; `min(width,iw)` never upscales
pub fn gif_args(input: &Path, output: &Path, width: u32, fps: u32) -> Vec<String> {
    let mut args = base_args(input);
    args.extend_from_slice(&[
        "-vf".to_string(),
        format!("fps={},scale='min({},iw)':-1:flags=lanczos", fps, width),
        "-loop".to_string(),
        "0".to_string(),
        path_arg(output),
    ]);
    args
}

pub fn extract_audio_args(input: &Path, output: &Path, codec: &str) -> Vec<String> {
    let mut args = base_args(input);
    args.extend_from_slice(&[
        "-vn".to_string(),
        "-acodec".to_string(),
        codec.to_string(),
        path_arg(output),
    ]);
    args
}

/// First video stream's codec and dimensions as JSON
pub fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=codec_name,width,height".to_string(),
        "-of".to_string(),
        "json".to_string(),
        path_arg(input),
    ]
}
