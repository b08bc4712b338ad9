//! End-to-end tool scenarios against a scripted upstream.
//!
//! Each test drives the dispatcher exactly as the MCP server does and checks
//! the payload or error an assistant would see.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use materials_project_mcp::error::{ErrorKind, UpstreamError};
use materials_project_mcp::format::Formatter;
use materials_project_mcp::tools::{Dispatcher, Status};
use materials_project_mcp::upstream::{
    Endpoint, MaterialsBackend, MockBackend, UpstreamAdapter, UpstreamRecord, UpstreamResponse,
};

// =============================================================================
// Fixtures
// =============================================================================

fn record(value: Value) -> UpstreamRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn lithium_manganese_oxides() -> Vec<UpstreamRecord> {
    vec![
        record(json!({
            "material_id": "mp-22584",
            "formula_pretty": "LiMn2O4",
            "composition": {"O": 4.0, "Mn": 2.0, "Li": 1.0},
            "band_gap": 1.92,
            "formation_energy_per_atom": -2.06,
            "energy_above_hull": 0.0,
            "is_stable": true,
            "symmetry": {"crystal_system": "Cubic", "symbol": "Fd-3m", "number": 227},
        })),
        record(json!({
            "material_id": "mp-18767",
            "formula_pretty": "LiMnO2",
            "composition": {"Li": 1.0, "O": 2.0, "Mn": 1.0},
            "band_gap": 0.52,
            "formation_energy_per_atom": -2.11,
            "energy_above_hull": 0.013,
            "is_stable": false,
        })),
    ]
}

fn dispatcher(mock: &Arc<MockBackend>) -> Dispatcher {
    let backend: Arc<dyn MaterialsBackend> = mock.clone();
    let adapter = UpstreamAdapter::new(backend).with_retry_delay(Duration::from_millis(1));
    Dispatcher::new(adapter, Formatter::default())
}

fn call(tool: &str, arguments: Value) -> Value {
    json!({"name": tool, "arguments": arguments})
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn search_by_elements_returns_normalised_materials() {
    let mock = Arc::new(MockBackend::with_records(lithium_manganese_oxides()));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call(
            "search-materials-by-criteria",
            json!({"elements": ["Li", "Mn", "O"], "limit": 5}),
        ))
        .await;

    assert_eq!(result.status(), Status::Ok);
    let payload = result.payload().unwrap();
    assert_eq!(payload["status"], "success");
    assert_eq!(payload["returned_count"], 2);
    assert_eq!(payload["truncated"], false);

    let materials = payload["materials"].as_array().unwrap();
    assert_eq!(materials.len(), 2);
    assert_eq!(materials[0]["material_id"], "mp-22584");
    assert_eq!(materials[0]["band_gap_ev"], 1.92);
    assert_eq!(materials[0]["crystal_system"], "Cubic");

    let keys: Vec<&String> = materials[1]["composition"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(keys, ["Li", "Mn", "O"]);

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Endpoint::Summary);
    assert_eq!(calls[0].1.get("elements"), Some("Li,Mn,O"));
    assert_eq!(calls[0].1.get("_limit"), Some("5"));
}

#[tokio::test]
async fn search_with_no_matches_is_success() {
    let mock = Arc::new(MockBackend::with_records(Vec::new()));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("search-materials-by-criteria", json!({"band_gap_min": 50.0})))
        .await;

    let payload = result.payload().unwrap();
    assert_eq!(payload["total_count"], 0);
    assert_eq!(payload["materials"], json!([]));
}

#[tokio::test]
async fn search_reports_upstream_total() {
    let response = UpstreamResponse {
        records: lithium_manganese_oxides(),
        total: Some(120),
    };
    let mock = Arc::new(MockBackend::with_response(response));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("search-materials-by-criteria", json!({"limit": 2})))
        .await;

    let payload = result.payload().unwrap();
    assert_eq!(payload["total_count"], 120);
    assert_eq!(payload["returned_count"], 2);
    assert_eq!(payload["truncated"], true);
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn structure_lookup_shapes_lattice_and_sites() {
    let silicon = record(json!({
        "material_id": "mp-149",
        "formula_pretty": "Si",
        "composition": {"Si": 2.0},
        "structure": {
            "lattice": {"a": 3.87, "b": 3.87, "c": 3.87, "alpha": 60.0, "beta": 60.0,
                        "gamma": 60.0, "volume": 40.89},
            "sites": [
                {"species": [{"element": "Si", "occu": 1.0}], "abc": [0.0, 0.0, 0.0],
                 "xyz": [0.0, 0.0, 0.0]},
                {"species": [{"element": "Si", "occu": 1.0}], "abc": [0.25, 0.25, 0.25],
                 "xyz": [1.37, 0.97, 2.37]},
            ],
        },
        "symmetry": {"crystal_system": "Cubic", "symbol": "Fd-3m", "number": 227},
    }));
    let mock = Arc::new(MockBackend::with_records(vec![silicon]));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("get-structure-by-id", json!({"material_id": "mp-149"})))
        .await;

    let payload = result.payload().unwrap();
    assert_eq!(payload["found"], true);
    let material = &payload["material"];
    assert_eq!(material["lattice"]["a_angstrom"], 3.87);
    assert_eq!(material["lattice"]["gamma_deg"], 60.0);
    assert_eq!(material["site_count"], 2);
    assert_eq!(material["sites"][1]["frac_coords"], json!([0.25, 0.25, 0.25]));
    assert_eq!(material["sites"][0]["species"][0]["element"], "Si");

    assert_eq!(mock.calls()[0].1.get("material_ids"), Some("mp-149"));
}

#[tokio::test]
async fn unknown_material_is_not_an_error() {
    let mock = Arc::new(MockBackend::with_records(Vec::new()));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("get-structure-by-id", json!({"material_id": "mp-99999999"})))
        .await;

    assert_eq!(result.status(), Status::Ok);
    let payload = result.payload().unwrap();
    assert_eq!(payload["found"], false);
    assert_eq!(payload["material_id"], "mp-99999999");
}

#[tokio::test]
async fn phase_diagram_covers_subsystems_and_orders_by_hull() {
    let entries = vec![
        record(json!({"material_id": "mp-2", "formula_pretty": "LiO2",
                      "energy_above_hull": 0.08, "is_stable": false})),
        record(json!({"material_id": "mp-1960", "formula_pretty": "Li2O",
                      "energy_above_hull": 0.0, "is_stable": true})),
        record(json!({"material_id": "mp-841", "formula_pretty": "Li2O2",
                      "energy_above_hull": 0.0, "is_stable": true})),
    ];
    let mock = Arc::new(MockBackend::with_records(entries));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call(
            "get-phase-diagram-for-chemical-system",
            json!({"chemsys": "O-Li"}),
        ))
        .await;

    let payload = result.payload().unwrap();
    assert_eq!(payload["chemsys"], "Li-O");
    assert_eq!(payload["stable_phases"], json!(["Li2O", "Li2O2"]));
    let formulas: Vec<&str> = payload["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["formula"].as_str().unwrap())
        .collect();
    assert_eq!(formulas, ["Li2O", "Li2O2", "LiO2"]);

    let calls = mock.calls();
    assert_eq!(calls[0].0, Endpoint::Thermo);
    assert_eq!(calls[0].1.get("chemsys"), Some("Li,O,Li-O"));

    let stable = d
        .handle(&call(
            "get-phase-diagram-for-chemical-system",
            json!({"chemsys": "Li-O", "stable_only": true}),
        ))
        .await;
    assert_eq!(stable.payload().unwrap()["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn phase_diagram_lists_each_material_once_across_schemes() {
    let entries = vec![
        record(json!({"material_id": "mp-1", "formula_pretty": "Li", "thermo_type": "GGA_GGA+U",
                      "energy_above_hull": 0.0, "is_stable": true})),
        record(json!({"material_id": "mp-1", "formula_pretty": "Li", "thermo_type": "R2SCAN",
                      "energy_above_hull": 0.02, "is_stable": false})),
    ];
    let mock = Arc::new(MockBackend::with_records(entries));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("get-phase-diagram-for-chemical-system", json!({"chemsys": "Li"})))
        .await;

    let payload = result.payload().unwrap();
    let entries = payload["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(payload["total_count"], 1);
    assert_eq!(entries[0]["material_id"], "mp-1");
    assert_eq!(entries[0]["energy_above_hull_ev_per_atom"], 0.0);
    assert_eq!(payload["stable_phases"], json!(["Li"]));

    let calls = mock.calls();
    assert_eq!(calls[0].1.get("thermo_types"), Some("GGA_GGA+U_R2SCAN"));
}

#[tokio::test]
async fn energies_use_the_same_unit_across_tools() {
    let summary = lithium_manganese_oxides().remove(0);
    let electronic = record(json!({
        "material_id": "mp-22584",
        "formula_pretty": "LiMn2O4",
        "band_gap": 1.92,
        "cbm": 6.1,
        "vbm": 4.18,
        "efermi": 4.5,
        "is_gap_direct": false,
        "is_metal": false,
    }));
    let mock = Arc::new(
        MockBackend::with_records(Vec::new())
            .respond_next(UpstreamResponse::new(vec![summary]))
            .respond_next(UpstreamResponse::new(vec![electronic])),
    );
    let d = dispatcher(&mock);

    let search = d
        .handle(&call("search-materials-by-criteria", json!({"elements": ["Li"]})))
        .await;
    let es = d
        .handle(&call(
            "get-electronic-structure-for-id",
            json!({"material_id": "mp-22584"}),
        ))
        .await;

    let search = search.payload().unwrap();
    let es = es.payload().unwrap();
    assert_eq!(search["units"], es["units"]);
    assert_eq!(
        search["materials"][0]["band_gap_ev"],
        es["electronic_structure"]["band_gap_ev"]
    );
    assert_eq!(es["electronic_structure"]["cbm_ev"], 6.1);
    assert_eq!(mock.calls()[1].0, Endpoint::ElectronicStructure);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn missing_material_id_names_the_field() {
    let mock = Arc::new(MockBackend::with_records(Vec::new()));
    let d = dispatcher(&mock);

    let result = d.handle(&call("get-structure-by-id", json!({}))).await;

    assert_eq!(result.kind(), Some(ErrorKind::InvalidArgument));
    let body = result.to_json();
    assert_eq!(body["field"], "material_id");
    assert_eq!(body["retryable"], false);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn unknown_tool_is_rejected_without_upstream_call() {
    let mock = Arc::new(MockBackend::with_records(Vec::new()));
    let d = dispatcher(&mock);

    let result = d.handle(&call("predict-superconductors", json!({}))).await;

    assert_eq!(result.kind(), Some(ErrorKind::UnknownTool));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let mock = Arc::new(
        MockBackend::with_records(lithium_manganese_oxides())
            .fail_next(UpstreamError::unavailable("HTTP 503")),
    );
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("search-materials-by-criteria", json!({"elements": ["Mn"]})))
        .await;

    assert_eq!(result.status(), Status::Ok);
    assert_eq!(result.payload().unwrap()["returned_count"], 2);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn persistent_outage_is_reported_as_retryable() {
    let mock = Arc::new(MockBackend::failing(UpstreamError::unavailable("timed out")));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("get-electronic-structure-for-id", json!({"material_id": "mp-149"})))
        .await;

    assert_eq!(result.kind(), Some(ErrorKind::Unavailable));
    assert_eq!(result.to_json()["retryable"], true);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn unauthorised_is_not_retried() {
    let mock = Arc::new(MockBackend::failing(UpstreamError::unauthorized(
        "HTTP 401: invalid API key",
    )));
    let d = dispatcher(&mock);

    let result = d
        .handle(&call("get-structure-by-id", json!({"material_id": "mp-149"})))
        .await;

    assert_eq!(result.kind(), Some(ErrorKind::Unauthorized));
    assert_eq!(result.to_json()["retryable"], false);
    assert_eq!(mock.call_count(), 1);
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn identical_requests_yield_identical_payloads() {
    let mock = Arc::new(MockBackend::with_records(lithium_manganese_oxides()));
    let d = dispatcher(&mock);
    let request = call(
        "search-materials-by-criteria",
        json!({"elements": ["Li", "Mn", "O"], "is_stable": true}),
    );

    let first = d.handle(&request).await;
    let second = d.handle(&request).await;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.to_json()).unwrap(),
        serde_json::to_string(&second.to_json()).unwrap()
    );
}
