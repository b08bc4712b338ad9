//! Tool-level calls against the upstream backend.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

use super::{Endpoint, MaterialsBackend, QueryParams, UpstreamResponse};
use crate::error::UpstreamError;
use crate::materials::{ChemicalSystem, MaterialId, SearchCriteria};

/// Fields requested for search results.
const SEARCH_FIELDS: &str = "material_id,formula_pretty,composition,band_gap,\
formation_energy_per_atom,energy_above_hull,is_stable,symmetry,nsites,density,volume";

/// Fields requested for structure retrieval.
const STRUCTURE_FIELDS: &str =
    "material_id,formula_pretty,composition,structure,symmetry,nsites,density,volume";

/// Fields requested for phase-diagram entries.
const THERMO_FIELDS: &str = "material_id,formula_pretty,composition,chemsys,thermo_type,\
formation_energy_per_atom,energy_above_hull,is_stable";

/// Fields requested for electronic structure.
const ELECTRONIC_FIELDS: &str = "material_id,formula_pretty,band_gap,cbm,vbm,efermi,\
is_gap_direct,is_metal,magnetic_ordering";

/// Upper bound on entries fetched for one phase diagram.
const PHASE_DIAGRAM_FETCH_LIMIT: usize = 1000;

/// Default delay before retrying a transient failure.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default thermodynamic mixing scheme for phase diagrams.
///
/// The thermo endpoint holds one document per material and calculation
/// scheme; hull energies are only comparable within one scheme.
pub const DEFAULT_THERMO_TYPE: &str = "GGA_GGA+U_R2SCAN";

/// Translates tool requests into upstream queries.
///
/// Transient failures (`Unavailable`) are retried exactly once after a
/// short delay. Authentication and query rejections are returned at once.
pub struct UpstreamAdapter {
    backend: Arc<dyn MaterialsBackend>,
    retry_delay: Duration,
    thermo_type: String,
}

impl UpstreamAdapter {
    /// Creates an adapter over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn MaterialsBackend>) -> Self {
        Self {
            backend,
            retry_delay: DEFAULT_RETRY_DELAY,
            thermo_type: DEFAULT_THERMO_TYPE.to_string(),
        }
    }

    /// Sets the delay before the single retry.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the thermodynamic scheme requested for phase diagrams.
    #[must_use]
    pub fn with_thermo_type(mut self, thermo_type: impl Into<String>) -> Self {
        self.thermo_type = thermo_type.into();
        self
    }

    /// Performs one upstream query, retrying a transient failure once.
    ///
    /// # Errors
    ///
    /// Returns the upstream error of the last attempt.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        query: &QueryParams,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let backend = &self.backend;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_max_times(1);

        let response = (move || async move { backend.fetch(endpoint, query).await })
            .retry(backoff)
            .when(UpstreamError::is_retryable)
            .notify(|err: &UpstreamError, delay: Duration| {
                warn!(
                    endpoint = %endpoint,
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Upstream call failed, retrying"
                );
            })
            .await?;

        debug!(
            endpoint = %endpoint,
            records = response.records.len(),
            total = ?response.total,
            "Upstream call succeeded"
        );
        Ok(response)
    }

    /// Searches material summaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    pub async fn search_materials(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.call(Endpoint::Summary, &search_query(criteria)).await
    }

    /// Retrieves the crystal structure of one material.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    pub async fn get_structure(&self, id: &MaterialId) -> Result<UpstreamResponse, UpstreamError> {
        let query = QueryParams::new()
            .with("material_ids", id)
            .with("_fields", STRUCTURE_FIELDS)
            .with("_limit", 1);
        self.call(Endpoint::Summary, &query).await
    }

    /// Retrieves every thermodynamic entry of a chemical system and its
    /// sub-systems.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    pub async fn get_phase_diagram(
        &self,
        chemsys: &ChemicalSystem,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let query = QueryParams::new()
            .with("chemsys", chemsys.subsystems().join(","))
            .with("thermo_types", &self.thermo_type)
            .with("_fields", THERMO_FIELDS)
            .with("_limit", PHASE_DIAGRAM_FETCH_LIMIT);
        self.call(Endpoint::Thermo, &query).await
    }

    /// Retrieves the electronic structure summary of one material.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    pub async fn get_electronic_structure(
        &self,
        id: &MaterialId,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let query = QueryParams::new()
            .with("material_ids", id)
            .with("_fields", ELECTRONIC_FIELDS)
            .with("_limit", 1);
        self.call(Endpoint::ElectronicStructure, &query).await
    }
}

/// Maps search criteria onto summary query parameters.
fn search_query(criteria: &SearchCriteria) -> QueryParams {
    let elements = (!criteria.elements.is_empty()).then(|| criteria.elements.join(","));
    QueryParams::new()
        .with_opt("elements", elements)
        .with_opt("band_gap_min", criteria.band_gap_min)
        .with_opt("band_gap_max", criteria.band_gap_max)
        .with_opt("is_stable", criteria.is_stable)
        .with_opt("energy_above_hull_max", criteria.energy_above_hull_max)
        .with("_fields", SEARCH_FIELDS)
        .with("_limit", criteria.limit)
}
