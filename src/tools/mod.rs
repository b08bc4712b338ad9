//! Tool registry and request dispatch.
//!
//! The registry is fixed at start-up; the dispatcher validates each call
//! against it before anything is sent upstream.

mod dispatch;
pub mod registry;
mod result;

pub use dispatch::{Dispatcher, ToolRequest};
pub use registry::{ParamSpec, ParamType, ToolDescriptor, ToolName, ToolRegistry};
pub use result::{Status, ToolResult};
