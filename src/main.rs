/// MCP Server Entry Point
///
/// Reads newline-delimited JSON-RPC 2.0 requests from stdin and writes
/// responses to stdout, per the Model Context Protocol.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "veris-mcp-server")
/// - SERVER_VERSION: Version string (default: the crate version)
/// - VERIS_MCP_CONFIG_PATH: Path to a JSON config file (optional)
/// - VERIS_MEMORY_API_KEY / VERIS_MEMORY_USER_ID: backend credentials
/// - VERIS_MCP_LOG_LEVEL: overrides the configured log level

mod cache;
mod client;
mod config;
mod core;
mod error;
mod health;
mod logging;
mod metrics;
mod protocol;
mod streaming;
mod tools;
mod webhooks;

use std::env;

use crate::core::server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let name = env::var("SERVER_NAME").unwrap_or_else(|_| "veris-mcp-server".to_string());
    let version = env::var("SERVER_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    server::run_server_stdio(name, version).await
}
