//! materials-project-mcp: MCP server for Materials Project database queries
//!
//! Lets AI assistants search materials, fetch crystal structures, phase
//! diagrams and electronic structure data from the Materials Project, with
//! validated arguments and normalised, unit-annotated results.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types and the error taxonomy reported to clients
//! - [`materials`]: Material IDs, chemical systems and search criteria
//! - [`tools`]: Tool registry and request dispatch
//! - [`upstream`]: Materials Project API client and retry policy
//! - [`format`]: Normalisation of upstream records into tool payloads
//! - [`mcp`]: MCP protocol implementation

pub mod config;
pub mod error;
pub mod format;
pub mod materials;
pub mod mcp;
pub mod tools;
pub mod upstream;
