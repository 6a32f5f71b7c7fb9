/// Newline-delimited JSON-RPC transport over stdin/stdout.
///
/// Grounded on `protocol/transport.py`'s `StdioTransport` and the teacher's
/// `run_server_stdio` buffered-I/O loop: one JSON object per line, parse
/// errors are recovered rather than fatal, and every write is flushed
/// immediately so the host observes completion promptly (spec.md §4.B).
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines, Stdin, Stdout};
use tracing::{debug, warn};

use super::schemas::{RpcNotification, RpcRequest, RpcResponse};

/// The conventional sentinel used when a parse error leaves no recoverable id.
pub const UNKNOWN_ID: &str = "unknown";

/// One line's outcome after decode.
pub enum Incoming {
    /// A well-formed Request or Notification.
    Message(RpcRequest),
    /// The line didn't parse as JSON-RPC; carries the id extracted from the
    /// raw JSON if any, else the `"unknown"` sentinel, plus the decode error.
    ParseError {
        id: serde_json::Value,
        error: String,
    },
    /// Line contained no content; caller should keep reading.
    Blank,
}

pub struct StdioTransport {
    lines: Lines<BufReader<Stdin>>,
    writer: BufWriter<Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        Self {
            lines: BufReader::with_capacity(8192, stdin).lines(),
            writer: BufWriter::with_capacity(8192, stdout),
        }
    }

    /// Read the next line and decode it. Returns `Ok(None)` on clean EOF.
    pub async fn next_incoming(&mut self) -> std::io::Result<Option<Incoming>> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };

        if line.trim().is_empty() {
            return Ok(Some(Incoming::Blank));
        }

        match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => Ok(Some(Incoming::Message(request))),
            Err(err) => {
                warn!(error = %err, "failed to parse JSON-RPC line");
                let id = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").cloned())
                    .unwrap_or_else(|| serde_json::Value::String(UNKNOWN_ID.to_string()));
                Ok(Some(Incoming::ParseError {
                    id,
                    error: err.to_string(),
                }))
            }
        }
    }

    /// Write one response, terminated by a newline, flushed immediately.
    /// Writes are serialized through `&mut self` so two messages never
    /// interleave on the wire.
    pub async fn write_response(&mut self, response: &RpcResponse) -> std::io::Result<()> {
        let payload = serde_json::to_string(response)
            .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"serialization failure"}}"#.to_string());
        self.write_line(&payload).await
    }

    pub async fn write_notification(&mut self, notification: &RpcNotification) -> std::io::Result<()> {
        let payload = serde_json::to_string(notification).unwrap_or_default();
        if payload.is_empty() {
            return Ok(());
        }
        self.write_line(&payload).await
    }

    async fn write_line(&mut self, payload: &str) -> std::io::Result<()> {
        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        debug!(bytes = payload.len(), "wrote message to stdout");
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
