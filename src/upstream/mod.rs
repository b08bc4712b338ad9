//! Upstream client adapter for the Materials Project REST API.
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ UpstreamAdapter  │───▶│ MaterialsBackend │───▶│  Materials       │
//! │ (query, retry)   │    │ (MpSession/mock) │    │  Project API     │
//! └──────────────────┘    └──────────────────┘    └──────────────────┘
//! ```
//!
//! The adapter turns validated tool arguments into upstream query
//! parameters and retries transient failures once. The backend owns the
//! authenticated HTTP session. It is injected as a trait object so tests
//! can substitute [`MockBackend`].

mod adapter;
pub mod mock;
mod session;

pub use adapter::{UpstreamAdapter, DEFAULT_THERMO_TYPE};
pub use mock::MockBackend;
pub use session::MpSession;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::UpstreamError;

/// A single record as returned by the upstream database, before normalisation.
pub type UpstreamRecord = Map<String, Value>;

/// Upstream API endpoints used by the tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Material summary documents (search, structures).
    Summary,
    /// Thermodynamic documents (phase diagrams).
    Thermo,
    /// Electronic structure documents.
    ElectronicStructure,
}

impl Endpoint {
    /// Returns the URL path of this endpoint.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Summary => "/materials/summary/",
            Self::Thermo => "/materials/thermo/",
            Self::ElectronicStructure => "/materials/electronic_structure/",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Ordered upstream query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Creates an empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    /// Appends a parameter if `value` is present.
    #[must_use]
    pub fn with_opt<T: ToString>(self, key: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Returns the value of the first parameter named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns all parameters in insertion order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Records returned by one upstream query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamResponse {
    /// The records in upstream order.
    pub records: Vec<UpstreamRecord>,
    /// Total number of matching documents, when the upstream reports it.
    pub total: Option<u64>,
}

impl UpstreamResponse {
    /// Creates a response from records alone.
    #[must_use]
    pub const fn new(records: Vec<UpstreamRecord>) -> Self {
        Self {
            records,
            total: None,
        }
    }

    /// Creates an empty response.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the number of matching documents, never less than the
    /// number of records actually received.
    #[must_use]
    pub fn total_count(&self) -> usize {
        let reported = self
            .total
            .and_then(|t| usize::try_from(t).ok())
            .unwrap_or(0);
        reported.max(self.records.len())
    }
}

/// A source of upstream records.
///
/// Implemented by [`MpSession`] for the real API and by [`MockBackend`]
/// for tests.
#[async_trait]
pub trait MaterialsBackend: Send + Sync {
    /// Performs one upstream query.
    ///
    /// An empty result is `Ok` with no records, never an error.
    async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &QueryParams,
    ) -> Result<UpstreamResponse, UpstreamError>;
}
