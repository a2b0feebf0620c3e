//! Upstream generation API adapter
//!
//! Two dialects sit behind the [`GenerationBackend`] trait. The dialect is
//! chosen once, when the backend is built from configuration; call sites only
//! ever see the trait.

pub mod acedata;
pub mod http;
pub mod sunoapi;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tunesmith_common::ApiProvider;

pub use acedata::AceDataBackend;
pub use http::HttpTransport;
pub use sunoapi::SunoApiBackend;
pub use types::{
    AudioData, Credits, GenerateLyricsRequest, GenerateMusicRequest, LyricsData, MusicModel,
    TaskResult, TaskState, TaskStatusReport,
};

use crate::error::{ApiError, ApiResult};

/// Normalized generation API
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Dialect this backend speaks
    fn provider(&self) -> ApiProvider;

    /// Submit a music generation; returns the upstream task id
    async fn generate_music(&self, request: &GenerateMusicRequest) -> ApiResult<String>;

    /// Submit a lyrics generation; returns the upstream task id
    async fn generate_lyrics(&self, request: &GenerateLyricsRequest) -> ApiResult<String>;

    /// Query the current state of a task
    async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatusReport>;

    /// Remaining credit balance
    async fn credits(&self) -> ApiResult<Credits>;
}

/// Build the backend for `provider` on top of `transport`
pub fn build_backend(provider: ApiProvider, transport: HttpTransport) -> Arc<dyn GenerationBackend> {
    tracing::debug!(%provider, base_url = transport.base_url(), "Building API backend");
    match provider {
        ApiProvider::SunoApi => Arc::new(SunoApiBackend::new(transport)),
        ApiProvider::AceData => Arc::new(AceDataBackend::new(transport)),
    }
}

/// Decode a JSON payload, reporting shape mismatches as malformed responses
pub(crate) fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> ApiResult<T> {
    T::deserialize(value).map_err(|e| ApiError::Malformed(format!("{}: {}", what, e)))
}

/// Decode the payload of a successful task
///
/// The task already succeeded upstream, so a payload we cannot read is logged
/// and dropped rather than turned into an error. The raw response stays on
/// the status report.
pub(crate) fn decode_result(value: &Value, task_id: &str) -> Option<TaskResult> {
    match TaskResult::deserialize(value) {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::warn!(task_id, "Unrecognized result payload, keeping raw response only: {}", e);
            None
        }
    }
}
