use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_mcp_schema::{Prompt, Resource, Tool};
use serde_json::{json, Map, Value};

use crate::mcp::{McpBackend, McpError};

/// In-memory server: one tool, failing resource listing, no prompts.
#[derive(Default)]
pub struct FakeBackend {
    tool_lists: AtomicUsize,
}

impl FakeBackend {
    pub fn tool_lists(&self) -> usize {
        self.tool_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpBackend for FakeBackend {
    async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        self.tool_lists.fetch_add(1, Ordering::SeqCst);
        let tool = serde_json::from_value(json!({
            "name": "list_ctf_events",
            "description": "List CTF events | all of them",
            "inputSchema": {"type": "object"}
        }))?;
        Ok(vec![tool])
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        Err(McpError::Protocol("resources unavailable".to_string()))
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError> {
        Ok(Vec::new())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, McpError> {
        let text = format!("called {name} with {}", Value::Object(arguments));
        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": name == "explode"
        }))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        if uri == "htb://missing" {
            return Err(McpError::Protocol(format!("no resource at {uri}")));
        }
        Ok(json!({"contents": [{"uri": uri, "text": "{\"status\": \"ok\"}"}]}))
    }
}
