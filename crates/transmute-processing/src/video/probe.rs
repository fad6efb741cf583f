//! Stream profile probing for zero-re-encode merges

use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use transmute_core::AppError;

/// Codec and resolution of a file's first video stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamProfile {
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Display for StreamProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} {}x{}",
            self.codec_name.as_deref().unwrap_or("unknown"),
            self.width.map_or("?".to_string(), |w| w.to_string()),
            self.height.map_or("?".to_string(), |h| h.to_string())
        )
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<StreamProfile>,
}

/// Parse `ffprobe -of json` output. `None` when the file has no video stream.
pub fn parse_probe(json: &str) -> Result<Option<StreamProfile>, AppError> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::TransformFailure(format!("Unreadable ffprobe output: {}", e)))?;
    Ok(output.streams.into_iter().next())
}

/// All inputs must share the first input's profile. Mismatches are reported, never
/// normalized.
pub fn ensure_compatible(profiles: &[Option<StreamProfile>]) -> Result<(), AppError> {
    let Some(reference) = profiles.first() else {
        return Ok(());
    };

    for (index, profile) in profiles.iter().enumerate().skip(1) {
        if profile != reference {
            return Err(AppError::TransformFailure(format!(
                "Input {} ({}) does not match input 1 ({}); merge requires identical codec and resolution",
                index + 1,
                describe(profile),
                describe(reference)
            )));
        }
    }
    Ok(())
}

fn describe(profile: &Option<StreamProfile>) -> String {
    match profile {
        Some(profile) => profile.to_string(),
        None => "no video stream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: &str = r#"{"programs":[],"streams":[{"codec_name":"h264","width":1920,"height":1080}]}"#;
    const SD: &str = r#"{"streams":[{"codec_name":"h264","width":1280,"height":720}]}"#;

    #[test]
    fn test_parse_probe() {
        let profile = parse_probe(HD).unwrap().unwrap();
        assert_eq!(profile.codec_name.as_deref(), Some("h264"));
        assert_eq!(profile.width, Some(1920));
        assert_eq!(parse_probe(r#"{"streams":[]}"#).unwrap(), None);
        assert_eq!(parse_probe("{}").unwrap(), None);
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_resolution_mismatch_fails() {
        let profiles = vec![
            parse_probe(HD).unwrap(),
            parse_probe(HD).unwrap(),
            parse_probe(SD).unwrap(),
        ];
        let err = ensure_compatible(&profiles).unwrap_err();
        match err {
            AppError::TransformFailure(msg) => {
                assert!(msg.contains("Input 3"));
                assert!(msg.contains("1280x720"));
                assert!(msg.contains("1920x1080"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_identical_profiles_pass() {
        let profiles = vec![parse_probe(SD).unwrap(), parse_probe(SD).unwrap()];
        assert!(ensure_compatible(&profiles).is_ok());
    }
}
