//! Request dispatcher: parse, validate, route, wrap.
//!
//! Nothing reaches the upstream adapter until the tool name has been
//! resolved and every argument has passed validation. Validation stops at
//! the first offending argument, in the order the tool declares them.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::registry::{ToolDescriptor, ToolName, ToolRegistry};
use super::result::ToolResult;
use crate::error::ToolError;
use crate::format::Formatter;
use crate::materials::{is_element, ChemicalSystem, MaterialId, SearchCriteria};
use crate::upstream::UpstreamAdapter;

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    /// Requested tool name.
    pub tool: String,
    /// Raw arguments.
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    /// Interprets `tools/call` params (`{"name": ..., "arguments": {...}}`).
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` if the value is not an object with a
    /// string `name` and an object (or absent) `arguments`.
    pub fn from_value(raw: &Value) -> Result<Self, ToolError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| malformed("tool call must be a JSON object"))?;

        let tool = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing or non-string tool name"))?;

        let arguments = match obj.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(args)) => args.clone(),
            Some(_) => return Err(malformed("arguments must be a JSON object")),
        };

        Ok(Self {
            tool: tool.to_string(),
            arguments,
        })
    }

    /// Parses a raw JSON tool invocation.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` if `raw` is not valid JSON or not a tool
    /// invocation.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| malformed(format!("request is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }
}

fn malformed(message: impl Into<String>) -> ToolError {
    ToolError::MalformedRequest {
        message: message.into(),
    }
}

/// Arguments that passed schema validation, with defaults filled in.
#[derive(Debug)]
struct Arguments(Map<String, Value>);

impl Arguments {
    fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Internal {
                message: format!("validated argument '{name}' is not available"),
            })
    }

    fn f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    fn strings(&self, name: &str) -> Vec<&str> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Checks presence and JSON type of each declared parameter.
fn validate(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<Arguments, ToolError> {
    let mut validated = Map::new();

    for param in &descriptor.params {
        match arguments.get(param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(ToolError::invalid_argument(
                    param.name,
                    "missing required argument",
                ));
            }
            None | Some(Value::Null) => {
                if let Some(ref default) = param.default {
                    validated.insert(param.name.to_string(), default.clone());
                }
            }
            Some(value) if !param.ty.matches(value) => {
                return Err(ToolError::invalid_argument(
                    param.name,
                    format!("expected {}", param.ty.describe()),
                ));
            }
            Some(value) => {
                validated.insert(param.name.to_string(), value.clone());
            }
        }
    }

    for key in arguments.keys() {
        if !descriptor.params.iter().any(|p| p.name == key) {
            debug!(tool = descriptor.name(), argument = %key, "Ignoring undeclared argument");
        }
    }

    Ok(Arguments(validated))
}

fn non_negative(args: &Arguments, name: &str) -> Result<Option<f64>, ToolError> {
    match args.f64(name) {
        Some(v) if v < 0.0 => Err(ToolError::invalid_argument(
            name,
            format!("must not be negative (got {v})"),
        )),
        other => Ok(other),
    }
}

fn search_criteria(args: &Arguments, max_results: usize) -> Result<SearchCriteria, ToolError> {
    let mut elements: Vec<String> = Vec::new();
    for symbol in args.strings("elements") {
        if !is_element(symbol) {
            return Err(ToolError::invalid_argument(
                "elements",
                format!("'{symbol}' is not a chemical element symbol"),
            ));
        }
        if !elements.iter().any(|e| e == symbol) {
            elements.push(symbol.to_string());
        }
    }

    let band_gap_min = non_negative(args, "band_gap_min")?;
    let band_gap_max = non_negative(args, "band_gap_max")?;
    if let (Some(lo), Some(hi)) = (band_gap_min, band_gap_max) {
        if lo > hi {
            return Err(ToolError::invalid_argument(
                "band_gap_min",
                format!("band_gap_min ({lo}) exceeds band_gap_max ({hi})"),
            ));
        }
    }

    let is_stable = args.bool("is_stable");
    let energy_above_hull_max = non_negative(args, "energy_above_hull_max")?;

    let limit = args
        .i64("limit")
        .and_then(|l| usize::try_from(l).ok())
        .filter(|l| (1..=max_results).contains(l))
        .ok_or_else(|| {
            ToolError::invalid_argument("limit", format!("must be between 1 and {max_results}"))
        })?;

    Ok(SearchCriteria {
        elements,
        band_gap_min,
        band_gap_max,
        is_stable,
        energy_above_hull_max,
        limit,
    })
}

fn material_id(args: &Arguments) -> Result<MaterialId, ToolError> {
    MaterialId::parse(args.str("material_id")?)
        .map_err(|message| ToolError::invalid_argument("material_id", message))
}

fn chemical_system(args: &Arguments) -> Result<ChemicalSystem, ToolError> {
    ChemicalSystem::parse(args.str("chemsys")?)
        .map_err(|message| ToolError::invalid_argument("chemsys", message))
}

/// Routes validated tool calls to the adapter and formatter.
pub struct Dispatcher {
    registry: ToolRegistry,
    adapter: UpstreamAdapter,
    formatter: Formatter,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(adapter: UpstreamAdapter, formatter: Formatter) -> Self {
        Self {
            registry: ToolRegistry::new(formatter.max_results()),
            adapter,
            formatter,
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handles `tools/call` params.
    pub async fn handle(&self, raw: &Value) -> ToolResult {
        match ToolRequest::from_value(raw) {
            Ok(request) => self.handle_request(&request).await,
            Err(e) => Self::reject(e),
        }
    }

    /// Handles a raw JSON tool invocation.
    pub async fn handle_raw(&self, raw: &str) -> ToolResult {
        match ToolRequest::parse(raw) {
            Ok(request) => self.handle_request(&request).await,
            Err(e) => Self::reject(e),
        }
    }

    /// Handles an already parsed request.
    pub async fn handle_request(&self, request: &ToolRequest) -> ToolResult {
        let started = Instant::now();
        info!(tool = %request.tool, "Tool call");

        let result = ToolResult::from(self.dispatch(request).await);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result.error() {
            None => debug!(tool = %request.tool, elapsed_ms, "Tool call succeeded"),
            Some(e) => warn!(
                tool = %request.tool,
                kind = %e.kind(),
                error = %e,
                elapsed_ms,
                "Tool call failed"
            ),
        }
        result
    }

    fn reject(error: ToolError) -> ToolResult {
        warn!(kind = %error.kind(), error = %error, "Rejected tool call");
        ToolResult::Error(error)
    }

    async fn dispatch(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        let descriptor = self
            .registry
            .lookup(&request.tool)
            .ok_or_else(|| ToolError::UnknownTool {
                name: request.tool.clone(),
            })?;
        let args = validate(descriptor, &request.arguments)?;

        match descriptor.tool {
            ToolName::SearchMaterials => {
                let criteria = search_criteria(&args, self.formatter.max_results())?;
                let response = self.adapter.search_materials(&criteria).await?;
                Ok(self.formatter.format_search(&response))
            }
            ToolName::GetStructure => {
                let id = material_id(&args)?;
                let response = self.adapter.get_structure(&id).await?;
                Ok(self.formatter.format_structure(&id, &response))
            }
            ToolName::GetPhaseDiagram => {
                let chemsys = chemical_system(&args)?;
                let stable_only = args.bool("stable_only").unwrap_or(false);
                let response = self.adapter.get_phase_diagram(&chemsys).await?;
                Ok(self
                    .formatter
                    .format_phase_diagram(&chemsys, &response, stable_only))
            }
            ToolName::GetElectronicStructure => {
                let id = material_id(&args)?;
                let response = self.adapter.get_electronic_structure(&id).await?;
                Ok(self.formatter.format_electronic_structure(&id, &response))
            }
        }
    }
}
