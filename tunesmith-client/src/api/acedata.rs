//! Alternate dialect (api.acedata.cloud)
//!
//! Submissions go to a single endpoint with an `action` discriminator and
//! answer `{success, task_id, data[]}`. Task state lives on the first item of
//! `data`. The credits endpoint is undocumented, so every failure there is
//! reported as [`Credits::Unknown`] instead of an error.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use tunesmith_common::ApiProvider;

use super::types::{
    Credits, GenerateLyricsRequest, GenerateMusicRequest, TaskState, TaskStatusReport,
};
use super::{decode, decode_result, GenerationBackend, HttpTransport};
use crate::error::{ApiError, ApiResult};

/// Model used when the request does not name one
pub const DEFAULT_MODEL: &str = "chirp-v4-5";

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudiosResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
}

/// Map an AceData `state` string onto the normalized state
///
/// Unknown but non-empty states are treated as still running.
pub fn map_state(state: &str) -> Option<TaskState> {
    match state.trim() {
        "" => None,
        "succeeded" => Some(TaskState::Success),
        "failed" => Some(TaskState::Failed),
        "pending" | "processing" => Some(TaskState::Pending),
        other => {
            debug!(state = other, "Unrecognized AceData state, treating as pending");
            Some(TaskState::Pending)
        }
    }
}

/// api.acedata.cloud backend
pub struct AceDataBackend {
    transport: HttpTransport,
}

impl AceDataBackend {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    async fn submit(&self, body: Value) -> ApiResult<String> {
        let value = self.transport.post_json("suno/audios", &body).await?;
        let response: SubmitResponse = decode(&value, "submit response")?;

        match response.task_id.filter(|id| !id.is_empty()) {
            Some(task_id) if response.success => Ok(task_id),
            _ => Err(ApiError::upstream_with_data(
                200,
                Some(&error_message(&value).unwrap_or_else(|| "generation failed".to_string())),
                Some(value),
            )),
        }
    }
}

#[async_trait]
impl GenerationBackend for AceDataBackend {
    fn provider(&self) -> ApiProvider {
        ApiProvider::AceData
    }

    async fn generate_music(&self, request: &GenerateMusicRequest) -> ApiResult<String> {
        let model = request
            .model
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let body = json!({
            "action": "generate",
            "prompt": request.prompt,
            "model": model,
            "custom": request.custom_mode.unwrap_or(false),
            "title": request.title,
            "style": request.style,
            "instrumental": request.instrumental,
        });

        let task_id = self.submit(body).await?;
        debug!(task_id = %task_id, "Music generation submitted");
        Ok(task_id)
    }

    async fn generate_lyrics(&self, request: &GenerateLyricsRequest) -> ApiResult<String> {
        let body = json!({
            "action": "generate",
            "prompt": request.prompt,
            "custom": true,
            "instrumental": true,
        });

        let task_id = self.submit(body).await?;
        debug!(task_id = %task_id, "Lyrics generation submitted");
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatusReport> {
        let value = self
            .transport
            .get_json(&format!("suno/audios/{}", task_id), &[])
            .await?;
        let response: AudiosResponse = decode(&value, "audios response")?;

        if !response.success {
            return Err(ApiError::upstream_with_data(
                200,
                Some(&error_message(&value).unwrap_or_else(|| "status query failed".to_string())),
                Some(value),
            ));
        }

        let first = response
            .data
            .first()
            .ok_or_else(|| ApiError::upstream(404, Some("task not found")))?;

        let state = first.get("state").and_then(Value::as_str).unwrap_or("");
        let status = map_state(state);
        let error = first
            .get("error_message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);

        debug!(task_id, state, "Task status received");

        let result = if status == Some(TaskState::Success) {
            decode_result(&Value::Array(response.data.clone()), task_id)
        } else {
            None
        };

        Ok(TaskStatusReport {
            status,
            result,
            error,
            raw: Some(value),
        })
    }

    async fn credits(&self) -> ApiResult<Credits> {
        let value = match self.transport.get_json("suno/credits", &[]).await {
            Ok(value) => value,
            Err(e) => {
                debug!("AceData credits lookup failed, reporting unknown: {}", e);
                return Ok(Credits::Unknown);
            }
        };

        if !value.get("success").and_then(Value::as_bool).unwrap_or(false) {
            debug!("AceData credits lookup unsuccessful, reporting unknown");
            return Ok(Credits::Unknown);
        }

        let remaining = value
            .get("data")
            .and_then(|d| d.get("credits_left"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        Ok(Credits::Remaining(remaining))
    }
}

/// Best-effort error text from an AceData body (`error.message` or `message`)
fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_state() {
        assert_eq!(map_state("pending"), Some(TaskState::Pending));
        assert_eq!(map_state("processing"), Some(TaskState::Pending));
        assert_eq!(map_state("succeeded"), Some(TaskState::Success));
        assert_eq!(map_state("failed"), Some(TaskState::Failed));
        assert_eq!(map_state("queued"), Some(TaskState::Pending));
        assert_eq!(map_state(""), None);
    }

    #[test]
    fn test_error_message_lookup() {
        let nested = json!({"success": false, "error": {"code": "bad", "message": "prompt rejected"}});
        assert_eq!(error_message(&nested).as_deref(), Some("prompt rejected"));

        let flat = json!({"success": false, "message": "quota"});
        assert_eq!(error_message(&flat).as_deref(), Some("quota"));

        assert_eq!(error_message(&json!({"success": false})), None);
    }
}
