//! Result formatting for tool payloads.
//!
//! Upstream records use whatever field names and nesting each endpoint
//! chooses. The formatter maps them onto one vocabulary so the assistant
//! sees the same shape regardless of the tool that produced it:
//!
//! - Energies are in eV, and field names carry the unit (`band_gap_ev`,
//!   `formation_energy_ev_per_atom`).
//! - Lengths are in ångström, angles in degrees, densities in g/cm³.
//! - Compositions are Hill-ordered element → count mappings.
//! - Collections are capped; a cap that drops data is reported through
//!   `truncated`, `returned_count` and `total_count`.
//!
//! Payloads contain no timestamps, so the same upstream data always yields
//! the same payload.

mod composition;

pub use composition::hill_ordered;

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use serde_json::{json, Map, Value};

use crate::config::OutputConfig;
use crate::materials::{ChemicalSystem, MaterialId};
use crate::upstream::{UpstreamRecord, UpstreamResponse};

/// Upstream field → payload field, for fields copied without conversion.
type FieldMap = &'static [(&'static str, &'static str)];

const SUMMARY_FIELDS: FieldMap = &[
    ("material_id", "material_id"),
    ("formula_pretty", "formula"),
    ("band_gap", "band_gap_ev"),
    ("formation_energy_per_atom", "formation_energy_ev_per_atom"),
    ("energy_above_hull", "energy_above_hull_ev_per_atom"),
    ("is_stable", "is_stable"),
    ("nsites", "nsites"),
    ("density", "density_g_cm3"),
    ("volume", "volume_angstrom3"),
];

const THERMO_FIELDS: FieldMap = &[
    ("material_id", "material_id"),
    ("formula_pretty", "formula"),
    ("chemsys", "chemsys"),
    ("thermo_type", "thermo_type"),
    ("formation_energy_per_atom", "formation_energy_ev_per_atom"),
    ("energy_above_hull", "energy_above_hull_ev_per_atom"),
    ("is_stable", "is_stable"),
];

const ELECTRONIC_FIELDS: FieldMap = &[
    ("material_id", "material_id"),
    ("formula_pretty", "formula"),
    ("band_gap", "band_gap_ev"),
    ("cbm", "cbm_ev"),
    ("vbm", "vbm_ev"),
    ("efermi", "efermi_ev"),
    ("is_gap_direct", "is_gap_direct"),
    ("is_metal", "is_metal"),
    ("magnetic_ordering", "magnetic_ordering"),
];

const LATTICE_FIELDS: FieldMap = &[
    ("a", "a_angstrom"),
    ("b", "b_angstrom"),
    ("c", "c_angstrom"),
    ("alpha", "alpha_deg"),
    ("beta", "beta_deg"),
    ("gamma", "gamma_deg"),
    ("volume", "volume_angstrom3"),
    ("matrix", "matrix_angstrom"),
];

/// Hull energies at or below this are treated as on the hull.
const HULL_TOLERANCE: f64 = 1e-8;

/// The unit conventions shared by every payload.
#[must_use]
pub fn units() -> Value {
    json!({
        "energy": "eV",
        "energy_per_atom": "eV/atom",
        "length": "angstrom",
        "angle": "degree",
        "volume": "angstrom^3",
        "density": "g/cm^3",
    })
}

/// Shapes upstream responses into tool payloads.
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    max_results: usize,
    max_sites: usize,
}

impl Formatter {
    /// Creates a formatter with explicit caps.
    #[must_use]
    pub const fn new(max_results: usize, max_sites: usize) -> Self {
        Self {
            max_results,
            max_sites,
        }
    }

    /// Creates a formatter from the output configuration.
    #[must_use]
    pub const fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.max_results, config.max_sites)
    }

    /// Maximum number of records in any collection.
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    /// Formats a materials search.
    #[must_use]
    pub fn format_search(&self, response: &UpstreamResponse) -> Value {
        let materials: Vec<Value> = response
            .records
            .iter()
            .take(self.max_results)
            .map(|r| Value::Object(summary_entry(r)))
            .collect();

        let mut payload = success();
        payload.extend(collection_info(response.total_count(), materials.len()));
        payload.insert("materials".into(), Value::Array(materials));
        Value::Object(payload)
    }

    /// Formats a structure lookup.
    #[must_use]
    pub fn format_structure(&self, id: &MaterialId, response: &UpstreamResponse) -> Value {
        let Some(record) = response.records.first() else {
            return not_found(id);
        };

        let mut material = summary_entry(record);
        if let Some(structure) = record.get("structure").and_then(Value::as_object) {
            if let Some(lattice) = structure.get("lattice").and_then(Value::as_object) {
                material.insert(
                    "lattice".into(),
                    Value::Object(rename_fields(lattice, LATTICE_FIELDS)),
                );
            }

            let sites = structure
                .get("sites")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice);
            let shaped: Vec<Value> = sites.iter().take(self.max_sites).map(site_entry).collect();

            material.insert("site_count".into(), json!(sites.len()));
            material.insert("sites_returned".into(), json!(shaped.len()));
            material.insert("sites_truncated".into(), json!(shaped.len() < sites.len()));
            material.insert("sites".into(), Value::Array(shaped));
        }

        let mut payload = success();
        payload.insert("found".into(), json!(true));
        payload.insert("material".into(), Value::Object(material));
        Value::Object(payload)
    }

    /// Formats a phase diagram.
    ///
    /// Entries are ordered by energy above hull, then formula, then ID.
    /// A material listed more than once (one document per calculation
    /// scheme) keeps only its lowest-hull entry. `stable_phases` is computed
    /// before truncation, so it is complete even when the entry list is
    /// capped.
    #[must_use]
    pub fn format_phase_diagram(
        &self,
        chemsys: &ChemicalSystem,
        response: &UpstreamResponse,
        stable_only: bool,
    ) -> Value {
        let mut entries: Vec<Map<String, Value>> = response
            .records
            .iter()
            .map(|r| {
                let mut entry = rename_fields(r, THERMO_FIELDS);
                insert_composition(r, &mut entry);
                entry
            })
            .filter(|e| !stable_only || is_on_hull(e))
            .collect();
        entries.sort_by(compare_thermo_entries);

        let listed = entries.len();
        let mut seen = HashSet::new();
        entries.retain(|e| {
            e.get("material_id")
                .and_then(Value::as_str)
                .map_or(true, |id| seen.insert(id.to_owned()))
        });
        let duplicates = listed - entries.len();

        let stable_phases: BTreeSet<&str> = entries
            .iter()
            .filter(|e| is_on_hull(e))
            .filter_map(|e| e.get("formula").and_then(Value::as_str))
            .collect();
        let stable_phases: Vec<Value> = stable_phases.into_iter().map(|f| json!(f)).collect();

        let total = if stable_only {
            entries.len()
        } else {
            response.total_count().saturating_sub(duplicates)
        };
        let shown: Vec<Value> = entries
            .iter()
            .take(self.max_results)
            .cloned()
            .map(Value::Object)
            .collect();

        let mut payload = success();
        payload.insert("chemsys".into(), json!(chemsys.to_string()));
        payload.extend(collection_info(total, shown.len()));
        payload.insert("stable_phases".into(), Value::Array(stable_phases));
        payload.insert("entries".into(), Value::Array(shown));
        Value::Object(payload)
    }

    /// Formats an electronic-structure lookup.
    #[must_use]
    pub fn format_electronic_structure(&self, id: &MaterialId, response: &UpstreamResponse) -> Value {
        let Some(record) = response.records.first() else {
            return not_found(id);
        };

        let mut payload = success();
        payload.insert("found".into(), json!(true));
        payload.insert(
            "electronic_structure".into(),
            Value::Object(rename_fields(record, ELECTRONIC_FIELDS)),
        );
        Value::Object(payload)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}

fn success() -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("status".into(), json!("success"));
    payload.insert("units".into(), units());
    payload
}

fn not_found(id: &MaterialId) -> Value {
    let mut payload = success();
    payload.insert("found".into(), json!(false));
    payload.insert("material_id".into(), json!(id.as_str()));
    Value::Object(payload)
}

fn collection_info(total: usize, returned: usize) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("total_count".into(), json!(total));
    info.insert("returned_count".into(), json!(returned));
    info.insert("truncated".into(), json!(returned < total));
    info
}

/// Copies the mapped fields that are present, under their new names.
fn rename_fields(record: &UpstreamRecord, fields: FieldMap) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(from, to)| {
            record
                .get(*from)
                .filter(|v| !v.is_null())
                .map(|v| ((*to).to_string(), v.clone()))
        })
        .collect()
}

fn insert_composition(record: &UpstreamRecord, out: &mut Map<String, Value>) {
    if let Some(composition) = record.get("composition").and_then(hill_ordered) {
        let ordered: Map<String, Value> = composition
            .into_iter()
            .map(|(element, count)| (element, json!(count)))
            .collect();
        out.insert("composition".into(), Value::Object(ordered));
    }
}

fn summary_entry(record: &UpstreamRecord) -> Map<String, Value> {
    let mut entry = rename_fields(record, SUMMARY_FIELDS);
    insert_composition(record, &mut entry);

    if let Some(symmetry) = record.get("symmetry").and_then(Value::as_object) {
        for (from, to) in [
            ("crystal_system", "crystal_system"),
            ("symbol", "space_group"),
            ("number", "space_group_number"),
        ] {
            if let Some(v) = symmetry.get(from).filter(|v| !v.is_null()) {
                entry.insert(to.into(), v.clone());
            }
        }
    }
    entry
}

fn site_entry(site: &Value) -> Value {
    let species: Vec<Value> = site
        .get("species")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|sp| {
                    json!({
                        "element": sp.get("element").cloned().unwrap_or(Value::Null),
                        "occupancy": sp.get("occu").cloned().unwrap_or(json!(1.0)),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "species": species,
        "frac_coords": site.get("abc").cloned().unwrap_or(Value::Null),
        "cart_coords_angstrom": site.get("xyz").cloned().unwrap_or(Value::Null),
    })
}

fn hull_energy(entry: &Map<String, Value>) -> f64 {
    entry
        .get("energy_above_hull_ev_per_atom")
        .and_then(Value::as_f64)
        .unwrap_or(f64::INFINITY)
}

fn is_on_hull(entry: &Map<String, Value>) -> bool {
    entry
        .get("is_stable")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| hull_energy(entry) <= HULL_TOLERANCE)
}

fn compare_thermo_entries(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let text = |m: &Map<String, Value>, key: &str| {
        m.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    hull_energy(a)
        .total_cmp(&hull_energy(b))
        .then_with(|| text(a, "formula").cmp(&text(b, "formula")))
        .then_with(|| text(a, "material_id").cmp(&text(b, "material_id")))
}
