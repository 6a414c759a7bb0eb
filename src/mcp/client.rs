use serde::Serialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::protocol::{
    CallToolResult, Incoming, IncomingKind, InitializeResult, Notification, Request, Response,
    RpcErrorObject, ServerInfo, JSONRPC_VERSION, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use super::McpError;
use crate::config::ToolServerConfig;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A single-use connection to a tool server.
///
/// The child process is spawned with `kill_on_drop`, so dropping a session on
/// any path (error, panic, cancelled future) tears the server down. Call
/// [`ToolSession::shutdown`] for an orderly exit.
pub struct ToolSession {
    lines: Lines<BufReader<BoxedReader>>,
    writer: Option<BoxedWriter>,
    child: Option<Child>,
    next_id: u64,
    request_timeout: Duration,
    shutdown_grace: Duration,
    server_info: Option<ServerInfo>,
}

impl ToolSession {
    /// Spawns the tool server with `env` added to its environment and performs the handshake.
    pub async fn open(server: &ToolServerConfig, env: &[(&str, String)]) -> Result<Self, McpError> {
        info!("Starting tool server: {} {:?}", server.command, server.args);

        let mut cmd = Command::new(&server.command);
        cmd.args(&server.args)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &server.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::SpawnError(format!("'{}': {}", server.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::SpawnError("tool server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::SpawnError("tool server stdout unavailable".to_string()))?;

        // Forward the server's stderr into our logs
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "tool_server", "{}", line);
                }
            });
        }

        let mut session = Self::unconnected(
            stdout,
            stdin,
            Duration::from_secs(server.request_timeout_secs),
        );
        session.shutdown_grace = Duration::from_secs(server.shutdown_grace_secs);
        session.child = Some(child);
        session.initialize().await?;
        Ok(session)
    }

    /// Builds a session over arbitrary streams and performs the handshake.
    #[cfg(test)]
    pub async fn connect<R, W>(reader: R, writer: W, request_timeout: Duration) -> Result<Self, McpError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut session = Self::unconnected(reader, writer, request_timeout);
        session.initialize().await?;
        Ok(session)
    }

    fn unconnected<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            lines: BufReader::new(reader).lines(),
            writer: Some(Box::new(writer)),
            child: None,
            next_id: 1,
            request_timeout,
            shutdown_grace: Duration::from_secs(2),
            server_info: None,
        }
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self
            .request("initialize", Some(params))
            .await
            .map_err(|e| McpError::HandshakeError(e.to_string()))?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::HandshakeError(format!("bad initialize result: {}", e)))?;

        if init.protocol_version != PROTOCOL_VERSION {
            warn!(
                "Tool server negotiated protocol {} (requested {})",
                init.protocol_version, PROTOCOL_VERSION
            );
        }
        info!(
            "Connected to tool server {} {}",
            init.server_info.name, init.server_info.version
        );
        debug!("Tool server capabilities: {}", init.capabilities);
        self.server_info = Some(init.server_info);

        self.notify("notifications/initialized", None)
            .await
            .map_err(|e| McpError::HandshakeError(e.to_string()))
    }

    /// Sends a request and waits for the matching response.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        self.write_message(&Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })
        .await?;

        let timeout = self.request_timeout;
        match tokio::time::timeout(timeout, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(format!(
                "no response to '{}' within {}s",
                method,
                timeout.as_secs()
            ))),
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.write_message(&Notification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        })
        .await
    }

    async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), McpError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| McpError::TransportError("session already closed".to_string()))?;

        let mut line = serde_json::to_vec(message)
            .map_err(|e| McpError::ProtocolError(format!("failed to encode message: {}", e)))?;
        line.push(b'\n');

        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<Value, McpError> {
        let expected = json!(id);

        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => {
                    return Err(McpError::TransportError(
                        "tool server closed its output".to_string(),
                    ));
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: Incoming = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Ignoring non-JSON-RPC output from tool server ({}): {}", e, line);
                    continue;
                }
            };

            match message.kind() {
                IncomingKind::Notification => {
                    debug!("Tool server notification: {:?}", message.method);
                }
                IncomingKind::ServerRequest => self.answer_server_request(message).await?,
                IncomingKind::Response => {
                    if message.id.as_ref() != Some(&expected) {
                        warn!("Discarding response with unexpected id {:?}", message.id);
                        continue;
                    }
                    if let Some(err) = message.error {
                        return Err(McpError::RpcError {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return Ok(message.result.unwrap_or(Value::Null));
                }
            }
        }
    }

    async fn answer_server_request(&mut self, message: Incoming) -> Result<(), McpError> {
        let method = message.method.unwrap_or_default();
        let id = message.id.unwrap_or(Value::Null);

        let response = if method == "ping" {
            Response {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: Some(json!({})),
                error: None,
            }
        } else {
            debug!("Rejecting unsupported server request '{}'", method);
            Response {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: None,
                error: Some(RpcErrorObject {
                    code: METHOD_NOT_FOUND,
                    message: format!("Method not found: {}", method),
                    data: None,
                }),
            }
        };
        self.write_message(&response).await
    }

    /// Invokes a tool. A result flagged `isError` is turned into [`McpError::ToolError`].
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        debug!("Calling tool '{}' with {}", name, arguments);
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;

        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::ProtocolError(format!("bad tools/call result: {}", e)))?;

        if result.is_error {
            let message = result
                .first_text()
                .unwrap_or("tool reported an error without a message")
                .to_string();
            error!("Tool '{}' failed: {}", name, message);
            return Err(McpError::ToolError(message));
        }
        Ok(result)
    }

    /// Invokes a tool and returns the text of its first content element.
    pub async fn call_tool_text(&mut self, name: &str, arguments: Value) -> Result<String, McpError> {
        let result = self.call_tool(name, arguments).await?;
        result
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| McpError::InvalidPayload(format!("tool '{}' returned no text content", name)))
    }

    /// Closes stdin, gives the server a grace period to exit, then kills it.
    pub async fn shutdown(mut self) {
        // Dropping the writer closes the server's stdin
        self.writer = None;

        let Some(mut child) = self.child.take() else {
            return;
        };

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => debug!("Tool server exited with {}", status),
            Ok(Err(e)) => warn!("Failed waiting for tool server: {}", e),
            Err(_) => {
                debug!("Tool server still running after grace period, killing it");
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tool server: {}", e);
                }
            }
        }
    }
}
