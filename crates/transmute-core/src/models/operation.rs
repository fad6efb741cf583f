//! Closed catalogue of operations and the contract each one declares.

use crate::error::AppError;
use crate::models::params::{ParamValue, Params, ResolvedParams};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Largest width or height any image operation accepts or produces
pub const MAX_DIMENSION: i64 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    ImageResize,
    ImageCompress,
    ImageCrop,
    ImageBlur,
    ImageConvert,
    ImageGrayscale,
    ImageRotate,
    ImageDominantColor,
    VideoConvert,
    VideoCompress,
    VideoMerge,
    VideoSpeed,
    VideoToGif,
    VideoExtractAudio,
    PdfMerge,
    PdfSplit,
    PdfRotate,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::ImageResize,
        Operation::ImageCompress,
        Operation::ImageCrop,
        Operation::ImageBlur,
        Operation::ImageConvert,
        Operation::ImageGrayscale,
        Operation::ImageRotate,
        Operation::ImageDominantColor,
        Operation::VideoConvert,
        Operation::VideoCompress,
        Operation::VideoMerge,
        Operation::VideoSpeed,
        Operation::VideoToGif,
        Operation::VideoExtractAudio,
        Operation::PdfMerge,
        Operation::PdfSplit,
        Operation::PdfRotate,
    ];

    /// Operation id as it appears in `/api/<id>`
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ImageResize => "image-resize",
            Operation::ImageCompress => "image-compress",
            Operation::ImageCrop => "image-crop",
            Operation::ImageBlur => "image-blur",
            Operation::ImageConvert => "image-convert",
            Operation::ImageGrayscale => "image-grayscale",
            Operation::ImageRotate => "image-rotate",
            Operation::ImageDominantColor => "image-dominant-color",
            Operation::VideoConvert => "video-convert",
            Operation::VideoCompress => "video-compress",
            Operation::VideoMerge => "video-merge",
            Operation::VideoSpeed => "video-speed",
            Operation::VideoToGif => "video-to-gif",
            Operation::VideoExtractAudio => "video-extract-audio",
            Operation::PdfMerge => "pdf-merge",
            Operation::PdfSplit => "pdf-split",
            Operation::PdfRotate => "pdf-rotate",
        }
    }

    pub fn contract(&self) -> OperationContract {
        match self {
            Operation::ImageResize => OperationContract {
                arity: Arity::Single,
                params: RESIZE_PARAMS,
                at_least_one_of: &["width", "height"],
            },
            Operation::ImageCompress => OperationContract::single(COMPRESS_PARAMS),
            Operation::ImageCrop => OperationContract::single(CROP_PARAMS),
            Operation::ImageBlur => OperationContract::single(BLUR_PARAMS),
            Operation::ImageConvert => OperationContract::single(IMAGE_CONVERT_PARAMS),
            Operation::ImageGrayscale
            | Operation::ImageDominantColor
            | Operation::VideoCompress => OperationContract::single(&[]),
            Operation::ImageRotate | Operation::PdfRotate => {
                OperationContract::single(ROTATE_PARAMS)
            }
            Operation::VideoConvert => OperationContract::single(VIDEO_CONVERT_PARAMS),
            Operation::VideoMerge | Operation::PdfMerge => OperationContract {
                arity: Arity::AtLeast(2),
                params: &[],
                at_least_one_of: &[],
            },
            Operation::VideoSpeed => OperationContract::single(SPEED_PARAMS),
            Operation::VideoToGif => OperationContract::single(GIF_PARAMS),
            Operation::VideoExtractAudio => OperationContract::single(EXTRACT_AUDIO_PARAMS),
            Operation::PdfSplit => OperationContract::single(SPLIT_PARAMS),
        }
    }
}

const RESIZE_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("width", ParamKind::Integer { min: 1, max: MAX_DIMENSION }),
    ParamSpec::optional("height", ParamKind::Integer { min: 1, max: MAX_DIMENSION }),
];

const COMPRESS_PARAMS: &[ParamSpec] = &[ParamSpec::with_default(
    "quality",
    ParamKind::Integer { min: 1, max: 100 },
    "80",
)];

const CROP_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("width", ParamKind::Integer { min: 1, max: MAX_DIMENSION }),
    ParamSpec::required("height", ParamKind::Integer { min: 1, max: MAX_DIMENSION }),
    ParamSpec::required("left", ParamKind::Integer { min: 0, max: MAX_DIMENSION }),
    ParamSpec::required("top", ParamKind::Integer { min: 0, max: MAX_DIMENSION }),
];

const BLUR_PARAMS: &[ParamSpec] = &[ParamSpec::with_default(
    "radius",
    ParamKind::Integer { min: 1, max: 100 },
    "5",
)];

const IMAGE_CONVERT_PARAMS: &[ParamSpec] = &[ParamSpec::required("format", ParamKind::Text)];

const ROTATE_PARAMS: &[ParamSpec] = &[ParamSpec::with_default("angle", ParamKind::RightAngle, "90")];

const VIDEO_CONVERT_PARAMS: &[ParamSpec] =
    &[ParamSpec::with_default("format", ParamKind::Text, "mp4")];

const SPEED_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "speed",
    ParamKind::Number { min: 0.5, max: 2.0 },
)];

const GIF_PARAMS: &[ParamSpec] = &[
    ParamSpec::with_default("width", ParamKind::Integer { min: 1, max: 4096 }, "480"),
    ParamSpec::with_default("fps", ParamKind::Integer { min: 1, max: 30 }, "10"),
];

const EXTRACT_AUDIO_PARAMS: &[ParamSpec] =
    &[ParamSpec::with_default("format", ParamKind::Text, "mp3")];

const SPLIT_PARAMS: &[ParamSpec] = &[ParamSpec::with_default("pages", ParamKind::Text, "1")];

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| AppError::UnknownOperation(s.to_string()))
    }
}

/// Number of input files an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Single => count == 1,
            Arity::AtLeast(min) => count >= *min,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Arity::Single => f.write_str("exactly 1 file"),
            Arity::AtLeast(min) => write!(f, "at least {} files", min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Inclusive range
    Integer { min: i64, max: i64 },
    /// Inclusive range
    Number { min: f64, max: f64 },
    Text,
    /// Integer multiple of 90, normalized into `0..360`
    RightAngle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub const fn with_default(name: &'static str, kind: ParamKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// Input arity and parameter contract declared by an operation
#[derive(Debug, Clone, Copy)]
pub struct OperationContract {
    pub arity: Arity,
    pub params: &'static [ParamSpec],
    /// Names of which at least one must be supplied
    pub at_least_one_of: &'static [&'static str],
}

impl OperationContract {
    const fn single(params: &'static [ParamSpec]) -> Self {
        Self {
            arity: Arity::Single,
            params,
            at_least_one_of: &[],
        }
    }

    /// Check input count and parameters, returning typed parameters with defaults applied.
    ///
    /// Performs no I/O; every rejection is a `ValidationFailure`.
    pub fn validate(
        &self,
        operation: Operation,
        input_count: usize,
        params: &Params,
    ) -> Result<ResolvedParams, AppError> {
        if !self.arity.accepts(input_count) {
            return Err(AppError::ValidationFailure(format!(
                "Operation '{}' requires {}, got {}",
                operation, self.arity, input_count
            )));
        }

        if !self.at_least_one_of.is_empty()
            && !self.at_least_one_of.iter().any(|name| params.get(name).is_some())
        {
            return Err(AppError::ValidationFailure(format!(
                "Operation '{}' requires at least one of: {}",
                operation,
                self.at_least_one_of.join(", ")
            )));
        }

        let mut resolved = ResolvedParams::default();
        for spec in self.params {
            let raw = match params.get(spec.name).or(spec.default) {
                Some(raw) => raw,
                None if spec.required => {
                    return Err(AppError::ValidationFailure(format!(
                        "Missing required parameter '{}'",
                        spec.name
                    )));
                }
                None => continue,
            };
            resolved.insert(spec.name, spec.kind.parse(spec.name, raw)?);
        }

        Ok(resolved)
    }
}

impl ParamKind {
    fn parse(&self, name: &str, raw: &str) -> Result<ParamValue, AppError> {
        match *self {
            ParamKind::Integer { min, max } => {
                let value: i64 = raw.parse().map_err(|_| {
                    AppError::ValidationFailure(format!(
                        "Parameter '{}' must be an integer, got '{}'",
                        name, raw
                    ))
                })?;
                if value < min || value > max {
                    return Err(AppError::ValidationFailure(format!(
                        "Parameter '{}' must be between {} and {}, got {}",
                        name, min, max, value
                    )));
                }
                Ok(ParamValue::Integer(value))
            }
            ParamKind::Number { min, max } => {
                let value: f64 = raw.parse().map_err(|_| {
                    AppError::ValidationFailure(format!(
                        "Parameter '{}' must be a number, got '{}'",
                        name, raw
                    ))
                })?;
                if !value.is_finite() || value < min || value > max {
                    return Err(AppError::ValidationFailure(format!(
                        "Parameter '{}' must be between {} and {}, got {}",
                        name, min, max, raw
                    )));
                }
                Ok(ParamValue::Number(value))
            }
            ParamKind::Text => Ok(ParamValue::Text(raw.to_string())),
            ParamKind::RightAngle => {
                let value: i64 = raw.parse().map_err(|_| {
                    AppError::ValidationFailure(format!(
                        "Parameter '{}' must be an integer angle, got '{}'",
                        name, raw
                    ))
                })?;
                if value % 90 != 0 {
                    return Err(AppError::ValidationFailure(format!(
                        "Parameter '{}' must be a multiple of 90, got {}",
                        name, value
                    )));
                }
                Ok(ParamValue::Integer(value.rem_euclid(360)))
            }
        }
    }
}
