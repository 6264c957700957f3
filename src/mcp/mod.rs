//! Model Context Protocol over streamable HTTP.
//!
//! [`McpClient`] owns the HTTP connection, the session id handed out by the
//! server and the negotiated protocol version. The rest of the crate talks to
//! it through [`McpBackend`], which keeps the UI testable without a server.

use async_trait::async_trait;
use rust_mcp_schema::{Prompt, Resource, Tool};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::cache::MetadataKind;
use crate::core::records::McpRecord;

pub mod client;
pub mod protocol;
pub mod sse;

pub use client::McpClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSettings {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("{0}")]
    Protocol(String),
    #[error("Invalid JSON from MCP server: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations the UI and CLI need from the server.
#[async_trait]
pub trait McpBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<Tool>, McpError>;

    async fn list_resources(&self) -> Result<Vec<Resource>, McpError>;

    async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError>;

    /// Calls `name` and returns the raw `CallToolResult` as JSON.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>)
        -> Result<Value, McpError>;

    /// Reads `uri` and returns the raw `ReadResourceResult` as JSON.
    async fn read_resource(&self, uri: &str) -> Result<Value, McpError>;
}

/// Lists one metadata kind as cache records.
pub async fn list_records(
    backend: &dyn McpBackend,
    kind: MetadataKind,
) -> Result<Vec<McpRecord>, McpError> {
    let records = match kind {
        MetadataKind::Tools => backend
            .list_tools()
            .await?
            .into_iter()
            .map(McpRecord::Tool)
            .collect(),
        MetadataKind::Resources => backend
            .list_resources()
            .await?
            .into_iter()
            .map(McpRecord::Resource)
            .collect(),
        MetadataKind::Prompts => backend
            .list_prompts()
            .await?
            .into_iter()
            .map(McpRecord::Prompt)
            .collect(),
    };
    Ok(records)
}
