//! Request and response types shared by both upstream dialects
//!
//! Request structs serialize to the sunoapi.org wire shape; the AceData
//! backend builds its own bodies from the same structs.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Requests
// ============================================================================

/// Generation model accepted by the default dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicModel {
    #[serde(rename = "V4")]
    V4,
    #[serde(rename = "V4_5")]
    V4_5,
    #[serde(rename = "V4_5PLUS")]
    V4_5Plus,
    #[serde(rename = "V4_5ALL")]
    V4_5All,
    #[serde(rename = "V5")]
    V5,
}

impl MusicModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MusicModel::V4 => "V4",
            MusicModel::V4_5 => "V4_5",
            MusicModel::V4_5Plus => "V4_5PLUS",
            MusicModel::V4_5All => "V4_5ALL",
            MusicModel::V5 => "V5",
        }
    }
}

impl fmt::Display for MusicModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MusicModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "V4" => Ok(MusicModel::V4),
            "V4_5" => Ok(MusicModel::V4_5),
            "V4_5PLUS" => Ok(MusicModel::V4_5Plus),
            "V4_5ALL" => Ok(MusicModel::V4_5All),
            "V5" => Ok(MusicModel::V5),
            other => Err(format!(
                "unknown model '{}' (expected V4, V4_5, V4_5PLUS, V4_5ALL or V5)",
                other
            )),
        }
    }
}

/// Music generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMusicRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumental: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<MusicModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_param_flag: Option<bool>,
    /// Seconds into `upload_url` audio to continue from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_at: Option<f64>,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl GenerateMusicRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Lyrics generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateLyricsRequest {
    pub prompt: String,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl GenerateLyricsRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            callback_url: None,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// One generated track
///
/// Upstreams send `null` for fields they have not filled in yet; those decode
/// as empty values. `audio_url` must be present (possibly `null`) so audio
/// items stay distinguishable from lyrics items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub audio_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// Seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocal_removal_info: Option<VocalRemovalInfo>,
}

/// Stem URLs produced by vocal removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocalRemovalInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub instrumental_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vocal_url: String,
}

/// One generated lyrics sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Payload attached to a successful task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskResult {
    Audio(Vec<AudioData>),
    Lyrics(Vec<LyricsData>),
}

impl TaskResult {
    pub fn len(&self) -> usize {
        match self {
            TaskResult::Audio(items) => items.len(),
            TaskResult::Lyrics(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Normalized contract
// ============================================================================

/// Upstream task state after dialect normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failed,
}

impl TaskState {
    /// Whether polling stops on this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }

    /// Map a default-dialect status string
    ///
    /// `SUCCESS` and `FAILED` are terminal; any other non-empty status is an
    /// intermediate stage. Empty strings are not a status at all.
    pub fn from_upstream(status: &str) -> Option<Self> {
        match status.trim() {
            "" => None,
            "SUCCESS" => Some(TaskState::Success),
            "FAILED" => Some(TaskState::Failed),
            _ => Some(TaskState::Pending),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Pending => "PENDING",
            TaskState::Success => "SUCCESS",
            TaskState::Failed => "FAILED",
        })
    }
}

/// Normalized answer to a status query
///
/// `status` is `None` when the upstream answered without a recognizable
/// status; the poller treats that as fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatusReport {
    pub status: Option<TaskState>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    /// Raw upstream payload, kept for diagnostics
    pub raw: Option<serde_json::Value>,
}

/// Remaining credit balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credits {
    Remaining(i64),
    /// Backend has no usable credits endpoint
    Unknown,
}

impl Credits {
    /// Integer form, `-1` for unknown
    pub fn as_i64(&self) -> i64 {
        match self {
            Credits::Remaining(n) => *n,
            Credits::Unknown => -1,
        }
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credits::Remaining(n) => write!(f, "{}", n),
            Credits::Unknown => f.write_str("unknown"),
        }
    }
}
