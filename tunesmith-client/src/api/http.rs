//! HTTP transport shared by both dialect backends
//!
//! Injects the bearer credential, applies the request timeout and turns
//! transport failures and non-2xx statuses into [`ApiError`].

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::auth::AuthStore;
use crate::error::{ApiError, ApiResult};

const USER_AGENT: &str = concat!("tunesmith/", env!("CARGO_PKG_VERSION"));

/// Authenticated JSON-over-HTTP transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth: AuthStore,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration, auth: AuthStore) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Value> {
        let request = self.client.get(self.url(path)).query(query);
        self.send(request).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<Value> {
        let api_key = self.auth.require()?;

        let response = request
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let data = serde_json::from_str::<Value>(&body).ok();
            let message = data
                .as_ref()
                .and_then(|d| d.get("msg").or_else(|| d.get("message")))
                .and_then(Value::as_str)
                .map(str::to_string);

            tracing::debug!(status = status.as_u16(), "Upstream rejected request");

            return Err(ApiError::upstream_with_data(
                status.as_u16(),
                message.as_deref(),
                data,
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Malformed(format!("response body is not JSON: {}", e)))
    }
}

fn classify_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ApiError::Network(format!("network error, check your connection ({})", e))
    } else {
        ApiError::Network(e.to_string())
    }
}
