//! Configuration module
//!
//! Runtime configuration is read from the environment (optionally seeded from a `.env`
//! file) and validated once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const SERVER_PORT: u16 = 4000;
const RETENTION_SECS: u64 = 600;
const TRANSFORM_TIMEOUT_SECS: u64 = 300;
const MAX_UPLOAD_SIZE_MB: usize = 200;
const MAX_FILES_PER_REQUEST: usize = 20;
const VIDEO_CRF: u8 = 28;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    /// Root directory holding the `intake` and `output` namespaces
    pub storage_root: PathBuf,
    /// When set, overrides the scheme and host used for resolved file URLs
    pub public_base_url: Option<String>,
    /// How long every artifact lives before it is reclaimed
    pub retention: Duration,
    /// Maximum wall-clock time a single transform may run
    pub transform_timeout: Duration,
    pub max_upload_size_bytes: usize,
    pub max_files_per_request: usize,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Constant rate factor used by lossy video compression
    pub video_crf: u8,
    /// Delete intake files as soon as a request succeeds
    pub early_input_cleanup: bool,
    pub http_concurrency_limit: usize,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            storage_root: PathBuf::from("./data"),
            public_base_url: None,
            retention: Duration::from_secs(RETENTION_SECS),
            transform_timeout: Duration::from_secs(TRANSFORM_TIMEOUT_SECS),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            max_files_per_request: MAX_FILES_PER_REQUEST,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_crf: VIDEO_CRF,
            early_input_cleanup: true,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let retention_secs = parse_env("RETENTION_SECS", RETENTION_SECS)?;
        let transform_timeout_secs = parse_env("TRANSFORM_TIMEOUT_SECS", TRANSFORM_TIMEOUT_SECS)?;
        let max_upload_size_mb = parse_env("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?;

        let config = Config {
            server_port,
            environment,
            cors_origins,
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            retention: Duration::from_secs(retention_secs),
            transform_timeout: Duration::from_secs(transform_timeout_secs),
            max_upload_size_bytes: megabytes_to_bytes(max_upload_size_mb)?,
            max_files_per_request: parse_env("MAX_FILES_PER_REQUEST", MAX_FILES_PER_REQUEST)?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            video_crf: parse_env("VIDEO_CRF", VIDEO_CRF)?,
            early_input_cleanup: env::var("EARLY_INPUT_CLEANUP")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
            http_concurrency_limit: parse_env("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)?
                .max(1),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.retention.is_zero() {
            return Err(anyhow::anyhow!("RETENTION_SECS must be greater than zero"));
        }

        if self.transform_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "TRANSFORM_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.max_files_per_request < 2 {
            return Err(anyhow::anyhow!(
                "MAX_FILES_PER_REQUEST must allow at least 2 files for merge operations"
            ));
        }

        if self.video_crf > 51 {
            return Err(anyhow::anyhow!("VIDEO_CRF must be between 0 and 51"));
        }

        if let Some(base) = &self.public_base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "PUBLIC_BASE_URL must start with http:// or https://"
                ));
            }
        }

        Ok(())
    }
}

fn megabytes_to_bytes(megabytes: usize) -> Result<usize, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
