//! HTTP transport for the engage service.
//!
//! Thin wrapper over `reqwest` for the REST endpoints and the push-channel
//! open. Response normalization (canvas payloads, session events) lives in
//! the modules that own those shapes, so everything here is plain
//! request/response plumbing.

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionDetail;

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: std::time::Duration,
}

impl ApiClient {
    /// Build a client against a validated base URL.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidBaseUrl` for non-http(s) URLs, `ClientError::Http`
    /// if the underlying client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
        }

        // No client-wide timeout: it would also cut the long-lived event
        // stream. REST calls opt in per request.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, base_url, request_timeout: config.request_timeout })
    }

    /// Open the long-lived push channel for a session.
    pub async fn open_events(
        &self,
        session_id: &str,
        username: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/api/engage/sessions/{session_id}/events", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("username", username)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        check(response, "open events")
    }

    /// Fire one liveness ping. Empty body; callers treat failures as
    /// best-effort.
    pub async fn heartbeat(&self, session_id: &str, username: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/engage/sessions/{session_id}/heartbeat", self.base_url);
        let response = self
            .http
            .post(url)
            .query(&[("username", username)])
            .timeout(self.request_timeout)
            .send()
            .await?;
        check(response, "heartbeat")?;
        Ok(())
    }

    /// Re-fetch the full session detail payload.
    pub async fn session_detail(&self, session_id: &str) -> Result<SessionDetail, ClientError> {
        let url = format!(
            "{}/api/engage/sessions/get-updated-details/{session_id}",
            self.base_url
        );
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check(response, "session detail")?;
        Ok(response.json::<SessionDetail>().await?)
    }

    /// Fetch the raw canvas payload for a slide's content reference.
    ///
    /// `Ok(None)` means the slide has no drawing yet (404); transport and
    /// decode failures are errors.
    pub async fn canvas_content(&self, content_ref: &str) -> Result<Option<Value>, ClientError> {
        let url = format!("{}/api/engage/canvas/{content_ref}", self.base_url);
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response, "canvas content")?;
        Ok(Some(response.json::<Value>().await?))
    }
}

fn check(response: reqwest::Response, context: &'static str) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status { status: status.as_u16(), context })
    }
}
