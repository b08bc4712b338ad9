//! Mock upstream backend for testing.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Endpoint, MaterialsBackend, QueryParams, UpstreamRecord, UpstreamResponse};
use crate::error::UpstreamError;

/// Mock backend that returns scripted responses and records every call.
///
/// Scripted results are consumed first, in order; afterwards every call
/// returns the fallback result. This makes the mock deterministic, which
/// tests rely on for idempotence checks.
///
/// # Examples
///
/// ```
/// use materials_project_mcp::error::UpstreamError;
/// use materials_project_mcp::upstream::MockBackend;
///
/// // Fails once with a transient error, then returns no records.
/// let backend = MockBackend::with_records(Vec::new())
///     .fail_next(UpstreamError::unavailable("connection reset"));
/// ```
pub struct MockBackend {
    script: Mutex<VecDeque<Result<UpstreamResponse, UpstreamError>>>,
    fallback: Result<UpstreamResponse, UpstreamError>,
    calls: Mutex<Vec<(Endpoint, QueryParams)>>,
}

impl MockBackend {
    /// Creates a mock that always answers with `response`.
    #[must_use]
    pub fn with_response(response: UpstreamResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that always answers with `records`.
    #[must_use]
    pub fn with_records(records: Vec<UpstreamRecord>) -> Self {
        Self::with_response(UpstreamResponse::new(records))
    }

    /// Creates a mock that always fails with `error`.
    #[must_use]
    pub fn failing(error: UpstreamError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues a failure ahead of the fallback.
    #[must_use]
    pub fn fail_next(self, error: UpstreamError) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
        self
    }

    /// Queues a response ahead of the fallback.
    #[must_use]
    pub fn respond_next(self, response: UpstreamResponse) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(response));
        self
    }

    /// Returns how many times the backend was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(Endpoint, QueryParams)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MaterialsBackend for MockBackend {
    async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &QueryParams,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint, query.clone()));

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
