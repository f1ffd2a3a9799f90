//! Media transcoding via ffmpeg
//!
//! [`Transcoder`] is the seam between the conversion pipeline and the actual
//! encoder; [`FfmpegTranscoder`] shells out to ffmpeg and, when available,
//! ffprobe for duration-based progress estimation.

use crate::config::TranscodeConfig;
use crate::error::TranscodeError;
use crate::types::{OutputFormat, VideoQuality};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Conversion of a fetched source file into the requested output format
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` into `output`.
    ///
    /// Progress percentages (0..=100, transcode scale) are sent through
    /// `progress` when the source duration is known; without it the
    /// transcode still runs, just silently.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
        quality: VideoQuality,
        progress: mpsc::Sender<f32>,
    ) -> Result<(), TranscodeError>;
}

/// ffmpeg backed [`Transcoder`]
#[derive(Debug)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
    audio_timeout: Duration,
    video_timeout: Duration,
}

impl FfmpegTranscoder {
    /// Build a transcoder from configuration, resolving the ffmpeg binary.
    ///
    /// ffprobe is optional: without it progress estimation is skipped but
    /// transcodes still complete.
    pub fn from_config(config: &TranscodeConfig) -> Result<Self, TranscodeError> {
        let ffmpeg = match &config.ffmpeg_path {
            Some(path) => path.clone(),
            None if config.search_path => {
                which::which("ffmpeg").map_err(|_| TranscodeError::BinaryMissing)?
            }
            None => return Err(TranscodeError::BinaryMissing),
        };
        let ffprobe = match &config.ffprobe_path {
            Some(path) => Some(path.clone()),
            None if config.search_path => which::which("ffprobe").ok(),
            None => None,
        };

        Ok(Self {
            ffmpeg,
            ffprobe,
            audio_timeout: config.audio_timeout,
            video_timeout: config.video_timeout,
        })
    }

    /// Ask ffprobe for the source duration in seconds
    async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let ffprobe = self.ffprobe.as_ref()?;
        let output = Command::new(ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
        quality: VideoQuality,
        progress: mpsc::Sender<f32>,
    ) -> Result<(), TranscodeError> {
        let timeout = match format {
            OutputFormat::Mp3 => self.audio_timeout,
            OutputFormat::Mp4 => self.video_timeout,
        };
        let total_seconds = self.probe_duration(input).await;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-i").arg(input);
        match format {
            OutputFormat::Mp3 => {
                cmd.args(["-vn", "-acodec", "libmp3lame", "-q:a", "2", "-ar", "44100"]);
            }
            OutputFormat::Mp4 => {
                cmd.arg("-vf").arg(quality.scale_filter()).args([
                    "-c:v",
                    "libx264",
                    "-preset",
                    "fast",
                    "-crf",
                    "23",
                    "-c:a",
                    "aac",
                    "-b:a",
                    "128k",
                    "-movflags",
                    "+faststart",
                ]);
            }
        }
        cmd.args(["-progress", "pipe:1", "-nostats", "-y"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| TranscodeError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TranscodeError::Spawn("no stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscodeError::Spawn("no stderr handle".into()))?;

        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut last_sent = -1.0f32;
            while let Ok(Some(line)) = lines.next_line().await {
                let Some(total) = total_seconds else { continue };
                if let Some(elapsed) = parse_out_time_line(&line) {
                    let pct = percent_of(elapsed, total);
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

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| TranscodeError::Spawn(e.to_string()))?,
            Err(_) => {
                let _ = child.kill().await;
                progress_task.abort();
                stderr_task.abort();
                return Err(TranscodeError::Timeout {
                    seconds: timeout.as_secs(),
                });
            }
        };

        let _ = progress_task.await;
        let captured_stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(TranscodeError::Failed {
                diagnostic: extract_diagnostic(&captured_stderr),
            });
        }

        // ffmpeg can exit zero yet leave nothing usable behind
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(TranscodeError::MissingOutput),
        }
    }
}

/// Parse an elapsed-time line from `-progress pipe:1` output into seconds.
///
/// ffmpeg emits `out_time_us` and `out_time_ms` (both are microseconds) as
/// well as a clock-style `out_time=HH:MM:SS.micros`.
fn parse_out_time_line(line: &str) -> Option<f64> {
    let line = line.trim();
    if let Some(value) = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))
    {
        let micros: i64 = value.trim().parse().ok()?;
        return Some((micros.max(0) as f64) / 1_000_000.0);
    }
    if let Some(clock) = line.strip_prefix("out_time=") {
        return parse_clock(clock.trim());
    }
    None
}

/// Parse "HH:MM:SS.micros" into seconds
fn parse_clock(clock: &str) -> Option<f64> {
    let mut parts = clock.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn percent_of(elapsed: f64, total: f64) -> f32 {
    if total <= 0.0 {
        return 0.0;
    }
    ((elapsed / total * 100.0) as f32).clamp(0.0, 100.0)
}

/// Reduce ffmpeg stderr to the line worth reporting
fn extract_diagnostic(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("ffmpeg exited with a failure status")
        .trim()
        .to_string()
}
