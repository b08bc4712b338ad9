//! Model Context Protocol (MCP) server.
//!
//! Exposes the materials tools to AI assistants over newline-delimited
//! JSON-RPC 2.0, on stdio or a local Unix socket.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        MCP Server                         │
//! │                                                           │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐   │
//! │   │  Transport  │───▶│   Server    │───▶│ Dispatcher  │   │
//! │   │(stdio/unix) │    │ (lifecycle) │    │   (tools)   │   │
//! │   └─────────────┘    └─────────────┘    └─────────────┘   │
//! │                                                │          │
//! │                                                ▼          │
//! │                      ┌─────────────┐    ┌─────────────┐   │
//! │                      │  Formatter  │◀───│  Upstream   │   │
//! │                      │  (payloads) │    │  (adapter)  │   │
//! │                      └─────────────┘    └─────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::{Frame, StdioTransport, Transport};
