//! The fixed set of tools and their input schemas.

use std::fmt;

use serde_json::{json, Map, Value};

/// Every tool the server exposes.
///
/// Dispatch matches on this enum, so adding a tool without a handler is a
/// compile error rather than a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// Search material summaries by elements, band gap and stability.
    SearchMaterials,
    /// Fetch the crystal structure of one material.
    GetStructure,
    /// Fetch the phase diagram of a chemical system.
    GetPhaseDiagram,
    /// Fetch the electronic structure summary of one material.
    GetElectronicStructure,
}

impl ToolName {
    /// All tools, in registry order.
    pub const ALL: [Self; 4] = [
        Self::SearchMaterials,
        Self::GetStructure,
        Self::GetPhaseDiagram,
        Self::GetElectronicStructure,
    ];

    /// Returns the wire name of the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SearchMaterials => "search-materials-by-criteria",
            Self::GetStructure => "get-structure-by-id",
            Self::GetPhaseDiagram => "get-phase-diagram-for-chemical-system",
            Self::GetElectronicStructure => "get-electronic-structure-for-id",
        }
    }

    /// Looks up a tool by its exact wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON array of strings.
    StringArray,
}

impl ParamType {
    /// Returns `true` if `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    /// Human-readable type name used in validation messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::StringArray => "an array of strings",
        }
    }

    fn json_schema(self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Number => json!({"type": "number"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Expected JSON type.
    pub ty: ParamType,
    /// Whether the caller must supply it.
    pub required: bool,
    /// Value used when an optional parameter is absent.
    pub default: Option<Value>,
    /// Description shown to the assistant.
    pub description: &'static str,
}

impl ParamSpec {
    const fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            description,
        }
    }

    const fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            description,
        }
    }

    fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A tool as advertised to the assistant.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Which tool this describes.
    pub tool: ToolName,
    /// Human-readable description.
    pub description: &'static str,
    /// Parameters in validation order.
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Returns the wire name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.tool.as_str()
    }

    /// Renders the parameters as a JSON Schema object.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.ty.json_schema();
            if let Value::Object(ref mut obj) = schema {
                obj.insert("description".into(), json!(param.description));
                if let Some(ref default) = param.default {
                    obj.insert("default".into(), default.clone());
                }
            }
            properties.insert(param.name.into(), schema);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// The registry of tools, fixed at construction.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Builds the registry.
    ///
    /// `max_results` caps the default `limit` of the search tool.
    #[must_use]
    pub fn new(max_results: usize) -> Self {
        Self {
            tools: ToolName::ALL
                .into_iter()
                .map(|tool| describe(tool, max_results))
                .collect(),
        }
    }

    /// Returns every tool in registry order.
    #[must_use]
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Finds a tool by exact wire name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        let tool = ToolName::from_name(name)?;
        self.tools.iter().find(|d| d.tool == tool)
    }
}

#[allow(clippy::too_many_lines)]
fn describe(tool: ToolName, max_results: usize) -> ToolDescriptor {
    use ParamType as P;

    match tool {
        ToolName::SearchMaterials => ToolDescriptor {
            tool,
            description: "Search the Materials Project for materials matching the given \
                          criteria. All filters are optional and combined with AND. \
                          Energies are returned in eV (per atom where noted), compositions \
                          as Hill-ordered element counts. Results beyond the limit are \
                          reported via total_count and truncated.",
            params: vec![
                ParamSpec::optional(
                    "elements",
                    P::StringArray,
                    "Element symbols every material must contain, e.g. [\"Li\", \"Mn\", \"O\"]",
                ),
                ParamSpec::optional("band_gap_min", P::Number, "Minimum band gap in eV"),
                ParamSpec::optional("band_gap_max", P::Number, "Maximum band gap in eV"),
                ParamSpec::optional(
                    "is_stable",
                    P::Boolean,
                    "true: only materials on the convex hull; false: only metastable ones",
                ),
                ParamSpec::optional(
                    "energy_above_hull_max",
                    P::Number,
                    "Maximum energy above the convex hull in eV/atom",
                ),
                ParamSpec::optional(
                    "limit",
                    P::Integer,
                    "Maximum number of materials to return",
                )
                .with_default(json!(10.min(max_results))),
            ],
        },
        ToolName::GetStructure => ToolDescriptor {
            tool,
            description: "Get the crystal structure of a material by Materials Project ID: \
                          lattice parameters (angstrom, degrees), sites with fractional and \
                          Cartesian coordinates, space group and composition.",
            params: vec![ParamSpec::required(
                "material_id",
                P::String,
                "Materials Project ID, e.g. \"mp-149\"",
            )],
        },
        ToolName::GetPhaseDiagram => ToolDescriptor {
            tool,
            description: "Get the phase diagram entries of a chemical system and all of its \
                          sub-systems: formation energy and energy above hull (eV/atom) per \
                          entry, plus the list of stable phases.",
            params: vec![
                ParamSpec::required(
                    "chemsys",
                    P::String,
                    "Dash-separated chemical system, e.g. \"Li-Fe-O\" (at most 6 elements)",
                ),
                ParamSpec::optional("stable_only", P::Boolean, "Return only stable entries")
                    .with_default(json!(false)),
            ],
        },
        ToolName::GetElectronicStructure => ToolDescriptor {
            tool,
            description: "Get the electronic structure summary of a material by Materials \
                          Project ID: band gap, CBM, VBM and Fermi level (eV), gap type and \
                          magnetic ordering.",
            params: vec![ParamSpec::required(
                "material_id",
                P::String,
                "Materials Project ID, e.g. \"mp-149\"",
            )],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::from_name("get_structure_by_id"), None);
        assert_eq!(ToolName::from_name("Get-Structure-By-Id"), None);
    }

    #[test]
    fn registry_order_is_stable() {
        let registry = ToolRegistry::new(50);
        let names: Vec<_> = registry.list_tools().iter().map(ToolDescriptor::name).collect();
        assert_eq!(
            names,
            [
                "search-materials-by-criteria",
                "get-structure-by-id",
                "get-phase-diagram-for-chemical-system",
                "get-electronic-structure-for-id",
            ]
        );
    }

    #[test]
    fn schemas_are_objects_with_required_lists() {
        let registry = ToolRegistry::new(50);
        for descriptor in registry.list_tools() {
            let schema = descriptor.input_schema();
            assert_eq!(schema["type"], "object");
            assert!(schema["properties"].is_object());
            assert!(schema["required"].is_array());
            assert!(!descriptor.description.is_empty());
        }

        let structure = registry.lookup("get-structure-by-id").unwrap();
        assert_eq!(structure.input_schema()["required"], json!(["material_id"]));
    }

    #[test]
    fn defaults_appear_in_schema() {
        let registry = ToolRegistry::new(50);
        let search = registry.lookup("search-materials-by-criteria").unwrap();
        let schema = search.input_schema();
        assert_eq!(schema["properties"]["limit"]["default"], 10);
        assert_eq!(schema["properties"]["elements"]["type"], "array");
    }

    #[test]
    fn param_types_match_json() {
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3)));
        assert!(ParamType::StringArray.matches(&json!(["Li", "O"])));
        assert!(ParamType::StringArray.matches(&json!([])));
        assert!(!ParamType::StringArray.matches(&json!(["Li", 8])));
        assert!(!ParamType::String.matches(&Value::Null));
    }
}
