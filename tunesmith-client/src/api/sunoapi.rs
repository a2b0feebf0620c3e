//! Default dialect (sunoapi.org)
//!
//! Every response is wrapped in `{code, msg, data}`; `code == 200` means
//! success regardless of the HTTP status.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tunesmith_common::ApiProvider;

use super::types::{Credits, GenerateLyricsRequest, GenerateMusicRequest, TaskState, TaskStatusReport};
use super::{decode, decode_result, GenerationBackend, HttpTransport};
use crate::error::{ApiError, ApiResult};

const SUCCESS_CODE: i64 = 200;

/// Field names the credits endpoint has been seen to use, in lookup order
const CREDIT_FIELDS: [&str; 4] = ["credits_left", "remaining_credits", "limit", "credits"];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    // Missing `data` deserializes as None
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Business-level check; HTTP was already 2xx
    fn into_data(self) -> ApiResult<Option<T>> {
        if self.code != SUCCESS_CODE {
            let code = u16::try_from(self.code).unwrap_or(0);
            return Err(ApiError::upstream(code, self.msg.as_deref()));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(rename = "taskId", default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordInfo {
    #[serde(default)]
    status: Option<String>,
    /// Decoded lazily: intermediate stages carry partial items
    #[serde(default)]
    response: Option<Value>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

/// sunoapi.org backend
pub struct SunoApiBackend {
    transport: HttpTransport,
}

impl SunoApiBackend {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    async fn submit(&self, path: &str, body: Value) -> ApiResult<String> {
        let value = self.transport.post_json(path, &body).await?;
        let envelope: Envelope<SubmitData> = decode(&value, "submit response")?;

        envelope
            .into_data()?
            .and_then(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Malformed("submit response missing data.taskId".to_string()))
    }
}

#[async_trait]
impl GenerationBackend for SunoApiBackend {
    fn provider(&self) -> ApiProvider {
        ApiProvider::SunoApi
    }

    async fn generate_music(&self, request: &GenerateMusicRequest) -> ApiResult<String> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Malformed(format!("music request: {}", e)))?;
        let task_id = self.submit("generate", body).await?;
        debug!(task_id = %task_id, "Music generation submitted");
        Ok(task_id)
    }

    async fn generate_lyrics(&self, request: &GenerateLyricsRequest) -> ApiResult<String> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Malformed(format!("lyrics request: {}", e)))?;
        let task_id = self.submit("lyrics", body).await?;
        debug!(task_id = %task_id, "Lyrics generation submitted");
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatusReport> {
        let value = self
            .transport
            .get_json("generate/record-info", &[("taskId", task_id)])
            .await?;

        let envelope: Envelope<RecordInfo> = decode(&value, "record-info response")?;
        let info = envelope
            .into_data()?
            .ok_or_else(|| ApiError::Malformed("record-info returned empty data".to_string()))?;

        let status = info.status.as_deref().and_then(TaskState::from_upstream);
        debug!(task_id, status = ?info.status, "Task status received");

        let result = match (status, info.response.as_ref().and_then(|r| r.get("data"))) {
            (Some(TaskState::Success), Some(data)) if !data.is_null() => {
                decode_result(data, task_id)
            }
            _ => None,
        };

        Ok(TaskStatusReport {
            status,
            result,
            error: info.error_message.filter(|m| !m.trim().is_empty()),
            raw: Some(value),
        })
    }

    async fn credits(&self) -> ApiResult<Credits> {
        let value = self.transport.get_json("get_limit", &[]).await?;
        let envelope: Envelope<Value> = decode(&value, "credits response")?;
        let data = envelope.into_data()?.unwrap_or(Value::Null);

        if let Some(n) = data.as_i64() {
            return Ok(Credits::Remaining(n));
        }

        let remaining = CREDIT_FIELDS
            .iter()
            .filter_map(|field| data.get(*field).and_then(Value::as_i64))
            .find(|n| *n != 0)
            .unwrap_or(0);

        Ok(Credits::Remaining(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_business_error() {
        let envelope: Envelope<SubmitData> =
            serde_json::from_value(json!({"code": 429, "msg": "insufficient credits", "data": null}))
                .unwrap();

        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.code(), 429);
        assert_eq!(err.to_string(), "insufficient credits");
    }

    #[test]
    fn test_envelope_missing_data_is_none() {
        let envelope: Envelope<SubmitData> =
            serde_json::from_value(json!({"code": 200, "msg": "success"})).unwrap();
        assert!(envelope.into_data().unwrap().is_none());
    }
}
