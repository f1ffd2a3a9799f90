//! Media fetching via yt-dlp
//!
//! [`MediaFetcher`] abstracts the source-fetch step so the conversion
//! pipeline can be tested without invoking any external tool.
//! [`YtDlpFetcher`] is the production implementation, shelling out to the
//! yt-dlp binary for both metadata probes and downloads.

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::types::{FetchedMedia, FormatCatalog, OutputFormat, VideoMetadata};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Source-media fetching operations
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Probe a URL for title, thumbnail, duration, and available formats
    async fn metadata(&self, url: &str) -> Result<VideoMetadata, FetchError>;

    /// Download the media behind a URL into `output_dir` as `file_stem.<ext>`.
    ///
    /// Progress percentages (0..=100, source-fetch scale) are sent through
    /// `progress` as they become known.
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        file_stem: &str,
        format: OutputFormat,
        progress: mpsc::Sender<f32>,
    ) -> Result<FetchedMedia, FetchError>;
}

/// yt-dlp backed [`MediaFetcher`]
#[derive(Debug)]
pub struct YtDlpFetcher {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpFetcher {
    /// Build a fetcher from configuration, resolving the yt-dlp binary.
    ///
    /// An explicit `ytdlp_path` wins; otherwise the system PATH is searched
    /// when `search_path` is enabled. A configured cookies file that does not
    /// exist is logged and skipped rather than treated as fatal.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let binary = match &config.ytdlp_path {
            Some(path) => path.clone(),
            None if config.search_path => {
                which::which("yt-dlp").map_err(|_| FetchError::BinaryMissing)?
            }
            None => return Err(FetchError::BinaryMissing),
        };

        let cookies_file = match &config.cookies_file {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => {
                tracing::warn!(
                    path = %path.display(),
                    "cookies file not found, continuing without cookies"
                );
                None
            }
            None => None,
        };

        Ok(Self {
            binary,
            cookies_file,
            timeout: config.timeout,
        })
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-playlist").arg("--no-warnings");
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn metadata(&self, url: &str) -> Result<VideoMetadata, FetchError> {
        let mut cmd = self.base_command();
        cmd.arg("--dump-single-json")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| FetchError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| FetchError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(FetchError::Failed {
                diagnostic: extract_diagnostic(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let info: YtDlpVideoInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::InvalidMetadata(e.to_string()))?;
        Ok(map_metadata(info))
    }

    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        file_stem: &str,
        format: OutputFormat,
        progress: mpsc::Sender<f32>,
    ) -> Result<FetchedMedia, FetchError> {
        let output_template = output_dir.join(format!("{file_stem}.%(ext)s"));

        let mut cmd = self.base_command();
        cmd.arg("--newline")
            .arg("--progress-template")
            .arg("download:%(progress._percent_str)s");
        match format {
            OutputFormat::Mp4 => {
                cmd.arg("-f")
                    .arg("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best");
            }
            OutputFormat::Mp3 => {
                cmd.arg("-f")
                    .arg("bestaudio/best")
                    .arg("-x")
                    .arg("--audio-format")
                    .arg("mp3")
                    .arg("--audio-quality")
                    .arg("192K");
            }
        }
        cmd.arg("-o")
            .arg(&output_template)
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| FetchError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Spawn("no stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Spawn("no stderr handle".into()))?;

        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut last_sent = -1.0f32;
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(pct) = parse_percent_line(&line) {
                    // Coalesce to whole-percent steps so slow readers are
                    // not flooded with sub-percent updates
                    if pct >= last_sent + 1.0 || (pct >= 100.0 && last_sent < 100.0) {
                        last_sent = pct;
                        let _ = progress.send(pct).await;
                    }
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut buf = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| FetchError::Spawn(e.to_string()))?,
            Err(_) => {
                let _ = child.kill().await;
                progress_task.abort();
                stderr_task.abort();
                return Err(FetchError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let _ = progress_task.await;
        let captured_stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(FetchError::Failed {
                diagnostic: extract_diagnostic(&captured_stderr),
            });
        }

        let path = find_output(output_dir, file_stem).await?;
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FetchError::Spawn(e.to_string()))?
            .len();
        Ok(FetchedMedia { path, size_bytes })
    }
}

/// Subset of the yt-dlp `--dump-single-json` payload this service reads
#[derive(Debug, Deserialize)]
struct YtDlpVideoInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    ext: Option<String>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

fn map_metadata(info: YtDlpVideoInfo) -> VideoMetadata {
    let mut heights: Vec<u32> = info
        .formats
        .iter()
        .filter(|f| {
            f.ext.as_deref() == Some("mp4") && f.vcodec.as_deref().is_some_and(|v| v != "none")
        })
        .filter_map(|f| f.height)
        .collect();
    heights.sort_unstable_by(|a, b| b.cmp(a));
    heights.dedup();

    let mut audio: Vec<String> = info
        .formats
        .iter()
        .filter(|f| {
            f.acodec.as_deref().is_some_and(|a| a != "none")
                && f.vcodec.as_deref().is_none_or(|v| v == "none")
        })
        .filter_map(|f| f.ext.clone())
        .collect();
    audio.sort_unstable();
    audio.dedup();

    VideoMetadata {
        title: info.title.unwrap_or_else(|| "Unknown title".to_string()),
        thumbnail: info.thumbnail,
        duration: info.duration.map(format_duration),
        formats: FormatCatalog {
            mp4: heights.into_iter().map(|h| format!("{h}p")).collect(),
            audio,
        },
    }
}

/// Render a duration in seconds as "M:SS"
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn percent_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").ok())
        .as_ref()
}

/// Pull the percentage out of a `--progress-template` line
fn parse_percent_line(line: &str) -> Option<f32> {
    let rest = line.trim().strip_prefix("download:")?;
    let captures = percent_regex()?.captures(rest)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Reduce yt-dlp stderr to the line worth reporting
fn extract_diagnostic(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with("ERROR"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("yt-dlp exited with a failure status")
        .trim()
        .to_string()
}

/// Locate the downloaded file.
///
/// yt-dlp picks the final extension itself (and post-processing can change
/// it), so the output is found by scanning for the stem rather than assuming
/// an extension. Partial-download artifacts are ignored.
async fn find_output(dir: &Path, stem: &str) -> Result<PathBuf, FetchError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FetchError::Spawn(e.to_string()))?;
    let mut newest: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(stem) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(_, m)| modified > *m) {
            newest = Some((path, modified));
        }
    }

    newest.map(|(p, _)| p).ok_or(FetchError::MissingOutput)
}
