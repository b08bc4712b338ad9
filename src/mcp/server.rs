//! MCP server lifecycle and method routing.
//!
//! 1. **Initialisation**: `initialize`, then `notifications/initialized`
//! 2. **Operation**: `tools/list`, `tools/call` and `ping`
//! 3. **Shutdown**: end of input or a termination signal
//!
//! Requests on one connection are answered strictly in order.

use std::io;
#[cfg(unix)]
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId,
    MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::{Frame, StdioTransport, Transport};
use crate::tools::{Dispatcher, ToolResult};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize answered, waiting for the initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// The tool list never changes during a session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters of the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by the client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition in the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the arguments.
    pub input_schema: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call as sent over MCP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call failed.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Wraps a tool result as pretty-printed JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised.
    pub fn from_tool_result(result: &ToolResult) -> serde_json::Result<Self> {
        let text = serde_json::to_string_pretty(&result.to_json())?;
        Ok(Self {
            content: vec![ToolContent::Text { text }],
            is_error: result.error().is_some(),
        })
    }
}

/// The MCP server.
pub struct McpServer {
    state: ServerState,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    dispatcher: Dispatcher,
}

impl McpServer {
    /// Creates a server that routes tool calls to `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            protocol_version: None,
            dispatcher,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Serves stdio until end of input or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or signal handlers cannot be
    /// installed.
    pub async fn run_stdio(&mut self) -> io::Result<()> {
        let mut transport = StdioTransport::stdio();

        let signal = tokio::select! {
            signal = shutdown_signal() => Some(signal?),
            result = self.serve(&mut transport) => {
                result?;
                None
            }
        };

        if let Some(name) = signal {
            info!(signal = name, "Received signal, initiating graceful shutdown");
        }
        self.state = ServerState::ShuttingDown;
        Ok(())
    }

    /// Serves connections on a local Unix socket, one at a time, until a
    /// termination signal.
    ///
    /// Each connection is a fresh MCP session. A stale socket file left at
    /// `path` is replaced; any other existing file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or signal handlers
    /// cannot be installed.
    #[cfg(unix)]
    pub async fn run_socket(&mut self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::FileTypeExt;

        use tokio::io::BufReader;
        use tokio::net::UnixListener;

        if let Ok(meta) = std::fs::symlink_metadata(path) {
            if !meta.file_type().is_socket() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a socket", path.display()),
                ));
            }
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        info!(path = %path.display(), "Listening on Unix socket");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let outcome = loop {
            let accepted = tokio::select! {
                signal = &mut shutdown => break signal,
                accepted = listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            info!("Client connected");
            let (read, write) = stream.into_split();
            let mut transport = Transport::new(BufReader::new(read), write);

            let served = tokio::select! {
                signal = &mut shutdown => break signal,
                served = self.serve(&mut transport) => served,
            };
            if let Err(e) = served {
                warn!(error = %e, "Connection closed with error");
            }
            info!("Client disconnected");
            self.reset();
        };

        if let Err(e) = std::fs::remove_file(path) {
            debug!(error = %e, "Could not remove socket file");
        }
        self.state = ServerState::ShuttingDown;

        let name = outcome?;
        info!(signal = name, "Received signal, initiating graceful shutdown");
        Ok(())
    }

    /// Serves one connection until end of input.
    ///
    /// A line that is not UTF-8 is answered with a parse error. A peer that
    /// hangs up mid-session (broken pipe or connection reset) ends the
    /// session like end of input does.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails for any other reason.
    pub async fn serve<R, W>(&mut self, transport: &mut Transport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        match self.serve_frames(transport).await {
            Err(e) if is_disconnect(&e) => {
                info!(error = %e, "Client hung up");
                Ok(())
            }
            other => other,
        }
    }

    async fn serve_frames<R, W>(&mut self, transport: &mut Transport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(frame) = transport.read_line().await? {
            let reply = match frame {
                Frame::Line(line) if line.trim().is_empty() => continue,
                Frame::Line(line) => self.handle_line(&line).await,
                Frame::NotUtf8 => {
                    warn!("Rejected message: not valid UTF-8");
                    Some(JsonRpcError::parse_error().into())
                }
            };
            if let Some(message) = reply {
                transport.write_message(&message).await?;
            }
        }
        debug!("End of input");
        Ok(())
    }

    /// Handles one line of input, returning the message to send back.
    ///
    /// Notifications produce no output.
    pub async fn handle_line(&mut self, line: &str) -> Option<OutgoingMessage> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(&req).await),
            Ok(IncomingMessage::Notification(ref notif)) => {
                self.handle_notification(notif);
                None
            }
            Err(error) => {
                warn!(code = error.error.code, detail = %error.error.message, "Rejected message");
                Some(error.into())
            }
        }
    }

    fn reset(&mut self) {
        self.state = ServerState::AwaitingInit;
        self.protocol_version = None;
    }

    async fn handle_request(&mut self, req: &JsonRpcRequest) -> OutgoingMessage {
        debug!(id = %req.id, method = %req.method, "Request");

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req).await,
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => resp.into(),
            Err(error) => error.into(),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                info!("Client initialised");
                self.state = ServerState::Running;
            }
            method => debug!(method, "Ignoring notification"),
        }
    }

    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid initialize params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing initialize params")
            })?;

        if params.protocol_version != MCP_PROTOCOL_VERSION {
            info!(
                requested = %params.protocol_version,
                offered = MCP_PROTOCOL_VERSION,
                "Client requested a different protocol version"
            );
        }
        if let Some(ref client) = params.client_info {
            info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                "Client connected"
            );
        }

        self.protocol_version = Some(MCP_PROTOCOL_VERSION.to_string());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities {
                tools: ToolCapabilities::default(),
            },
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let tools: Vec<ToolDefinition> = self
            .dispatcher
            .registry()
            .list_tools()
            .iter()
            .map(|d| ToolDefinition {
                name: d.name().to_string(),
                description: d.description.to_string(),
                input_schema: d.input_schema(),
            })
            .collect();

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools }),
        ))
    }

    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params = req.params.as_ref().unwrap_or(&Value::Null);
        let result = self.dispatcher.handle(params).await;

        let result_value = ToolCallResult::from_tool_result(&result)
            .and_then(|r| serde_json::to_value(&r))
            .map_err(|e| {
                error!(error = %e, "Failed to serialise tool call result");
                JsonRpcError::internal_error(
                    req.id.clone(),
                    "Internal error: failed to serialise result",
                )
            })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

/// Resolves when the process is asked to terminate.
#[cfg(unix)]
async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

/// Resolves when the process is asked to terminate.
#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Returns `true` for errors meaning the peer closed its end.
fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}
