//! Core types for vidxpress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a conversion task
///
/// Short random alphanumeric string, unique for the lifetime of the process.
/// Also used as the file stem for the task's output file so concurrent tasks
/// never collide on disk.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(value_type = String)]
#[serde(transparent)]
pub struct TaskId(String);

/// Length of generated task identifiers
const TASK_ID_LEN: usize = 12;

impl TaskId {
    /// Generate a new random task identifier
    pub fn generate() -> Self {
        use rand::{Rng, distributions::Alphanumeric};

        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TASK_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversion task status
///
/// Statuses advance through a strict partial order:
/// `pending -> downloading -> converting -> completed`, with `downloading`
/// and `converting` also allowed to move to `failed`. Terminal statuses
/// (`completed`, `failed`) never change again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, not yet started
    Pending,
    /// Source media is being fetched
    Downloading,
    /// Fetched media is being transcoded
    Converting,
    /// Output file is ready
    Completed,
    /// Task failed, see error message
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a transition from this status to `next` is allowed
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Downloading)
                | (TaskStatus::Downloading, TaskStatus::Converting)
                | (TaskStatus::Downloading, TaskStatus::Failed)
                | (TaskStatus::Converting, TaskStatus::Completed)
                | (TaskStatus::Converting, TaskStatus::Failed)
        )
    }

    /// Lowercase name matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Converting => "converting",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Consistent point-in-time view of a conversion task
///
/// This is the payload delivered to SSE subscribers and returned by the
/// registry: readers always see status and progress together, never a
/// torn update.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskSnapshot {
    /// Task identifier
    pub id: TaskId,

    /// Current status
    pub status: TaskStatus,

    /// Overall progress percentage (0.0 to 100.0, non-decreasing)
    pub progress: f32,

    /// Path to the finished output file (only set once completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub output_path: Option<PathBuf>,

    /// Failure diagnostic (only set once failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Target container/codec for a conversion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Audio-only MP3
    Mp3,
    /// H.264 MP4
    Mp4,
}

impl OutputFormat {
    /// Parse a user-supplied format string ("mp3" or "mp4")
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(OutputFormat::Mp3),
            "mp4" => Some(OutputFormat::Mp4),
            _ => None,
        }
    }

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Mp4 => "mp4",
        }
    }

    /// MIME type served for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Mp4 => "video/mp4",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Target resolution for MP4 output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VideoQuality {
    /// 360p
    #[serde(rename = "360p")]
    P360,
    /// 720p (default)
    #[default]
    #[serde(rename = "720p")]
    P720,
    /// 1080p
    #[serde(rename = "1080p")]
    P1080,
}

impl VideoQuality {
    /// Parse a user-supplied quality string ("360p", "720p", "1080p")
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "360p" | "360" => Some(VideoQuality::P360),
            "720p" | "720" => Some(VideoQuality::P720),
            "1080p" | "1080" => Some(VideoQuality::P1080),
            _ => None,
        }
    }

    /// Target frame height in pixels
    pub fn height(&self) -> u32 {
        match self {
            VideoQuality::P360 => 360,
            VideoQuality::P720 => 720,
            VideoQuality::P1080 => 1080,
        }
    }

    /// ffmpeg scale filter expression (width derived, kept even)
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.height())
    }
}

/// Video metadata returned by the fetch endpoint
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoMetadata {
    /// Video title
    pub title: String,

    /// Thumbnail URL, if the source provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Duration formatted as "M:SS"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Available formats grouped by kind
    pub formats: FormatCatalog,
}

/// Available source formats, grouped for the client
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct FormatCatalog {
    /// Available MP4 resolutions, highest first (e.g. "1080p")
    pub mp4: Vec<String>,

    /// Available audio-only container extensions (e.g. "m4a")
    pub audio: Vec<String>,
}

/// A fetched media file on disk
#[derive(Clone, Debug)]
pub struct FetchedMedia {
    /// Where the file landed
    pub path: PathBuf,

    /// File size in bytes
    pub size_bytes: u64,
}
