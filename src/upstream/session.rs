//! Authenticated HTTP session against the Materials Project API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{Endpoint, MaterialsBackend, QueryParams, UpstreamRecord, UpstreamResponse};
use crate::config::UpstreamConfig;
use crate::error::{SessionError, UpstreamError};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Longest upstream error detail echoed back to the caller.
const MAX_DETAIL_LEN: usize = 300;

/// Response envelope used by every Materials Project endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<UpstreamRecord>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    total_doc: Option<u64>,
}

/// The long-lived, authenticated upstream session.
///
/// Created once at startup and never mutated afterwards.
pub struct MpSession {
    client: reqwest::Client,
    base_url: String,
}

impl MpSession {
    /// Creates a session.
    ///
    /// The API key is sent verbatim. When it is `None` no key header is
    /// sent and the upstream will answer with an authentication failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(api_key: Option<&str>, config: &UpstreamConfig) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key).map_err(|_| SessionError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SessionError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the full URL of an endpoint.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl MaterialsBackend for MpSession {
    async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &QueryParams,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.endpoint_url(endpoint);
        debug!(url = %url, params = ?query.pairs(), "Upstream request");

        let response = self
            .client
            .get(&url)
            .query(query.pairs())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::unavailable(format!("request to {endpoint} timed out"))
                } else {
                    UpstreamError::unavailable(format!("request to {endpoint} failed: {e}"))
                }
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), "Upstream response");

        if status == StatusCode::NOT_FOUND {
            return Ok(UpstreamResponse::empty());
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, &detail));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            UpstreamError::malformed(format!("could not decode response from {endpoint}: {e}"))
        })?;

        Ok(UpstreamResponse {
            records: envelope.data,
            total: envelope.meta.and_then(|m| m.total_doc),
        })
    }
}

/// Classifies a non-success, non-404 status.
fn status_error(status: StatusCode, detail: &str) -> UpstreamError {
    let detail: String = detail.trim().chars().take(MAX_DETAIL_LEN).collect();
    let message = if detail.is_empty() {
        format!("upstream returned HTTP {}", status.as_u16())
    } else {
        format!("upstream returned HTTP {}: {detail}", status.as_u16())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::unauthorized(format!(
            "API key missing, expired or rejected (HTTP {})",
            status.as_u16()
        )),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            UpstreamError::unavailable(message)
        }
        s if s.is_server_error() => UpstreamError::unavailable(message),
        _ => UpstreamError::rejected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamErrorKind;

    #[test]
    fn auth_statuses_are_unauthorized() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = status_error(status, "nope");
            assert_eq!(err.kind, UpstreamErrorKind::Unauthorized);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn transient_statuses_are_unavailable() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = status_error(status, "");
            assert_eq!(err.kind, UpstreamErrorKind::Unavailable);
            assert!(err.message.contains(&status.as_u16().to_string()));
        }
    }

    #[test]
    fn other_client_errors_are_rejected() {
        let err = status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad field");
        assert_eq!(err.kind, UpstreamErrorKind::Rejected);
        assert!(err.message.contains("bad field"));
    }

    #[test]
    fn long_details_are_clipped() {
        let detail = "x".repeat(2000);
        let err = status_error(StatusCode::BAD_REQUEST, &detail);
        assert!(err.message.len() < 400);
    }

    #[test]
    fn envelope_parses_data_and_meta() {
        let body = r#"{"data":[{"material_id":"mp-1"}],"meta":{"total_doc":12}}"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.meta.and_then(|m| m.total_doc), Some(12));
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_empty());
        assert!(envelope.meta.is_none());
    }

    #[test]
    fn session_builds_urls() {
        let config = UpstreamConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..UpstreamConfig::default()
        };
        let session = MpSession::new(Some("key"), &config).unwrap();
        assert_eq!(
            session.endpoint_url(Endpoint::Thermo),
            "http://localhost:9000/materials/thermo/"
        );
    }

    #[test]
    fn invalid_api_key_is_rejected() {
        let result = MpSession::new(Some("bad\nkey"), &UpstreamConfig::default());
        assert!(matches!(result, Err(SessionError::InvalidApiKey)));
    }
}
