//! Configuration types for vidxpress

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// API server configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address the HTTP server binds to (default: "0.0.0.0:8000")
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Whether to apply a CORS layer (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins, "*" allows any (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve interactive Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,

    /// Legal notice returned by the status endpoint
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
            disclaimer: default_disclaimer(),
        }
    }
}

/// Output storage configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where fetched and converted files land (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum accepted size of a fetched file in bytes (default: 100 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

/// Cleanup sweeper configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// How often the sweeper runs (default: 1 hour)
    #[serde(default = "default_cleanup_interval", with = "duration_serde")]
    pub interval: Duration,

    /// How long output files and finished task records are kept (default: 1 hour)
    #[serde(default = "default_cleanup_retention", with = "duration_serde")]
    pub retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: default_cleanup_interval(),
            retention: default_cleanup_retention(),
        }
    }
}

/// Media fetch (yt-dlp) configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Hosts accepted for fetches; subdomains of an entry are accepted too
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    /// Netscape-format cookies file passed to yt-dlp (optional; absence is
    /// logged, never an error)
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for the binary if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Maximum wall time for a single fetch (default: 180 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            cookies_file: None,
            ytdlp_path: None,
            search_path: true,
            timeout: default_fetch_timeout(),
        }
    }
}

/// Transcode (ffmpeg) configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the ffprobe executable, used for progress estimation
    /// (auto-detected if None; transcodes still work without it)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for the binaries if no explicit paths are set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Maximum wall time for an audio transcode (default: 300 seconds)
    #[serde(default = "default_audio_timeout", with = "duration_serde")]
    pub audio_timeout: Duration,

    /// Maximum wall time for a video transcode (default: 600 seconds)
    #[serde(default = "default_video_timeout", with = "duration_serde")]
    pub video_timeout: Duration,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
            audio_timeout: default_audio_timeout(),
            video_timeout: default_video_timeout(),
        }
    }
}

/// Main configuration for [`VideoConverter`](crate::VideoConverter)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — bind address, CORS, Swagger UI
/// - [`storage`](StorageConfig) — output directory, size cap
/// - [`cleanup`](CleanupConfig) — sweep interval and retention
/// - [`fetch`](FetchConfig) — domain allow-list, yt-dlp settings
/// - [`transcode`](TranscodeConfig) — ffmpeg settings and timeouts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Output storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cleanup sweeper settings
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Media fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Transcode settings
    #[serde(default)]
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Build a configuration from defaults overridden by environment variables.
    ///
    /// Recognized variables: `VIDXPRESS_PORT` (or `PORT`), `OUTPUT_DIR`,
    /// `MAX_FILE_SIZE_BYTES`, `CLEANUP_INTERVAL_SECS`, `CLEANUP_RETENTION_SECS`,
    /// `ALLOWED_DOMAINS` (comma-separated), `COOKIES_FILE`, `CORS_ORIGINS`
    /// (comma-separated). Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = read_env_u16("VIDXPRESS_PORT").or_else(|| read_env_u16("PORT")) {
            config.api.bind_address = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if let Ok(dir) = std::env::var("OUTPUT_DIR")
            && !dir.trim().is_empty()
        {
            config.storage.output_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = read_env_u64("MAX_FILE_SIZE_BYTES") {
            config.storage.max_file_size_bytes = bytes;
        }
        if let Some(secs) = read_env_u64("CLEANUP_INTERVAL_SECS") {
            config.cleanup.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env_u64("CLEANUP_RETENTION_SECS") {
            config.cleanup.retention = Duration::from_secs(secs);
        }
        if let Ok(raw) = std::env::var("ALLOWED_DOMAINS") {
            let domains = parse_csv(&raw);
            if !domains.is_empty() {
                config.fetch.allowed_domains = domains;
            }
        }
        if let Ok(path) = std::env::var("COOKIES_FILE")
            && !path.trim().is_empty()
        {
            config.fetch.cookies_file = Some(PathBuf::from(path));
        }
        if let Ok(raw) = std::env::var("CORS_ORIGINS") {
            let origins = parse_csv(&raw);
            if !origins.is_empty() {
                config.api.cors_origins = origins;
            }
        }

        config
    }
}

/// Split a comma-separated environment value into trimmed, non-empty entries
fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn read_env_u16(name: &str) -> Option<u16> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_disclaimer() -> String {
    "This service is for personal use with content you have the right to download. \
     Respect the terms of service of source platforms and applicable copyright law."
        .to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_cleanup_retention() -> Duration {
    Duration::from_secs(3600)
}

fn default_allowed_domains() -> Vec<String> {
    [
        "youtube.com",
        "youtu.be",
        "tiktok.com",
        "facebook.com",
        "instagram.com",
        "twitter.com",
        "x.com",
        "vimeo.com",
        "dailymotion.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_audio_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_video_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.api.bind_address.port(), 8000);
        assert!(config.api.cors_enabled);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.swagger_ui);
        assert_eq!(config.storage.output_dir, PathBuf::from("./downloads"));
        assert_eq!(config.storage.max_file_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.cleanup.interval, Duration::from_secs(3600));
        assert_eq!(config.cleanup.retention, Duration::from_secs(3600));
        assert_eq!(config.fetch.timeout, Duration::from_secs(180));
        assert_eq!(config.transcode.audio_timeout, Duration::from_secs(300));
        assert_eq!(config.transcode.video_timeout, Duration::from_secs(600));
        assert!(config.fetch.search_path);
        assert!(config.fetch.cookies_file.is_none());
    }

    #[test]
    fn default_allow_list_contains_expected_hosts() {
        let config = Config::default();
        for host in ["youtube.com", "youtu.be", "vimeo.com", "x.com"] {
            assert!(
                config.fetch.allowed_domains.iter().any(|d| d == host),
                "allow-list should contain {host}"
            );
        }
    }

    #[test]
    fn empty_config_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api.bind_address.port(), 8000);
        assert_eq!(config.cleanup.retention, Duration::from_secs(3600));
    }

    #[test]
    fn duration_fields_serialize_as_seconds() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["cleanup"]["interval"], 3600);
        assert_eq!(json["cleanup"]["retention"], 3600);
        assert_eq!(json["fetch"]["timeout"], 180);
    }

    #[test]
    fn duration_fields_deserialize_from_seconds() {
        let config: Config =
            serde_json::from_str(r#"{"cleanup": {"interval": 60, "retention": 120}}"#).unwrap();

        assert_eq!(config.cleanup.interval, Duration::from_secs(60));
        assert_eq!(config.cleanup.retention, Duration::from_secs(120));
    }

    #[test]
    fn parse_csv_trims_and_drops_empty_entries() {
        assert_eq!(
            parse_csv(" youtube.com, vimeo.com ,,"),
            vec!["youtube.com".to_string(), "vimeo.com".to_string()]
        );
        assert!(parse_csv("").is_empty());
        assert!(parse_csv(" , ").is_empty());
    }
}
