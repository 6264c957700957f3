//! Typed views over what the HTB MCP server hands back.
//!
//! Listings arrive as `rust-mcp-schema` structures. Tool results are kept as
//! JSON values: their payload is a JSON document embedded in `text` content
//! blocks, and its shape differs per tool.

use rust_mcp_schema::{Prompt, Resource, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One JSON object from a tool payload (an event, a challenge, a team).
pub type Record = Map<String, Value>;

#[derive(Debug, Clone)]
pub enum McpRecord {
    Tool(Tool),
    Resource(Resource),
    Prompt(Prompt),
}

impl McpRecord {
    pub fn name(&self) -> &str {
        match self {
            McpRecord::Tool(tool) => &tool.name,
            McpRecord::Resource(resource) => &resource.name,
            McpRecord::Prompt(prompt) => &prompt.name,
        }
    }

    pub fn description(&self) -> &str {
        let description = match self {
            McpRecord::Tool(tool) => tool.description.as_deref(),
            McpRecord::Resource(resource) => resource.description.as_deref(),
            McpRecord::Prompt(prompt) => prompt.description.as_deref(),
        };
        description.unwrap_or("")
    }

    /// Secondary column shown in list tables: resource URI, prompt argument
    /// names, or the number of tool parameters.
    pub fn detail(&self) -> String {
        match self {
            McpRecord::Tool(tool) => {
                let count = input_schema(tool)
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.len())
                    .unwrap_or(0);
                match count {
                    0 => "no args".to_string(),
                    1 => "1 arg".to_string(),
                    n => format!("{n} args"),
                }
            }
            McpRecord::Resource(resource) => resource.uri.clone(),
            McpRecord::Prompt(prompt) => prompt
                .arguments
                .iter()
                .map(|arg| arg.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn as_tool(&self) -> Option<&Tool> {
        match self {
            McpRecord::Tool(tool) => Some(tool),
            _ => None,
        }
    }
}

/// The tool's input schema as plain JSON.
pub fn input_schema(tool: &Tool) -> Value {
    serde_json::to_value(&tool.input_schema).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Events,
    Challenges,
    Teams,
}

impl RecordKind {
    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Events => "Event",
            RecordKind::Challenges => "Challenge",
            RecordKind::Teams => "Team",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub ip: String,
    pub port: String,
}

impl ContainerStatus {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Concatenated text of every `text` content block in a tool result.
pub fn tool_text(result: &Value) -> String {
    let Some(blocks) = result.get("content").and_then(Value::as_array) else {
        return String::new();
    };

    let mut text = String::new();
    for block in blocks {
        match block {
            Value::String(raw) => text.push_str(raw),
            Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("text") => {
                if let Some(chunk) = obj.get("text").and_then(Value::as_str) {
                    text.push_str(chunk);
                }
            }
            _ => {}
        }
    }
    text
}

/// JSON document carried in the result's text blocks, if it parses.
pub fn tool_payload(result: &Value) -> Option<Value> {
    let text = tool_text(result);
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&text).ok()
}

pub fn is_error_result(result: &Value) -> bool {
    result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Pulls the records of `kind` out of a tool result. Accepts a JSON list or a
/// single object; challenges may also come wrapped as `{"challenges": [...]}`.
/// Non-object entries are dropped and unparsable text yields nothing.
pub fn extract(kind: RecordKind, result: &Value) -> Vec<Record> {
    let Some(payload) = tool_payload(result) else {
        return Vec::new();
    };

    let items = match (kind, payload) {
        (RecordKind::Challenges, Value::Object(mut obj)) => match obj.remove("challenges") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        (RecordKind::Challenges, Value::Array(items)) => items,
        (RecordKind::Challenges, _) => Vec::new(),
        (_, Value::Array(items)) => items,
        (_, other) => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect()
}

/// Address of a freshly started container, when the result names one.
pub fn container_status(result: &Value) -> Option<ContainerStatus> {
    let payload = tool_payload(result)?;
    let obj = payload.as_object()?;

    let candidates = [
        Some(obj),
        obj.get("container").and_then(Value::as_object),
        obj.get("data").and_then(Value::as_object),
    ];

    let status = candidates.into_iter().flatten().find_map(|obj| {
        let ip = obj
            .get("ip")
            .or_else(|| obj.get("host"))
            .and_then(scalar_text)?;
        let port = obj.get("port").and_then(scalar_text)?;
        Some(ContainerStatus { ip, port })
    });
    status
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Display form of a field: strings unquoted, other values as JSON, missing
/// or null fields as `fallback`.
pub fn field(record: &Record, key: &str, fallback: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => fallback.to_string(),
        Some(value) => value_text(value),
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn truthy(record: &Record, key: &str) -> bool {
    match record.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(obj)) => !obj.is_empty(),
        Some(Value::Null) | None => false,
    }
}

pub fn record_name(record: &Record) -> String {
    field(record, "name", "Unknown")
}
