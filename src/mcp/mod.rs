//! Minimal Model Context Protocol client for tool servers that speak
//! newline-delimited JSON-RPC 2.0 over stdio.

pub mod client;
pub mod protocol;
#[cfg(test)]
pub mod testing;

use std::error::Error;
use std::fmt;

pub use client::ToolSession;

#[derive(Debug)]
pub enum McpError {
    SpawnError(String),
    HandshakeError(String),
    TransportError(String),
    ProtocolError(String),
    RpcError { code: i64, message: String },
    ToolError(String),
    InvalidPayload(String),
    Timeout(String),
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpError::SpawnError(msg) => write!(f, "Tool server failed to start: {}", msg),
            McpError::HandshakeError(msg) => write!(f, "Tool server handshake failed: {}", msg),
            McpError::TransportError(msg) => write!(f, "Tool server transport error: {}", msg),
            McpError::ProtocolError(msg) => write!(f, "Tool server protocol error: {}", msg),
            McpError::RpcError { code, message } => {
                write!(f, "Tool server returned error {}: {}", code, message)
            }
            McpError::ToolError(msg) => write!(f, "{}", msg),
            McpError::InvalidPayload(msg) => write!(f, "Invalid tool payload: {}", msg),
            McpError::Timeout(msg) => write!(f, "Tool server timed out: {}", msg),
        }
    }
}

impl Error for McpError {}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::TransportError(err.to_string())
    }
}
