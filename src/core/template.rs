//! Pre-filled JSON arguments for the tool argument editor.

use serde_json::{Map, Value};

use crate::core::records::{value_text, Record};
use crate::core::selection::SelectionState;

const EVENT_ID_KEYS: &[&str] = &["ctf_id", "id", "event_id"];
const CHALLENGE_ID_KEYS: &[&str] = &["challenge_id", "id"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRow {
    pub name: String,
    pub kind: String,
    pub required: bool,
    pub description: String,
}

fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .filter(|props| !props.is_empty())
}

fn required_names(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

pub fn has_arguments(schema: &Value) -> bool {
    properties(schema).is_some()
}

/// Name / type / required / description for each schema property.
pub fn argument_rows(schema: &Value) -> Vec<ArgumentRow> {
    let Some(props) = properties(schema) else {
        return Vec::new();
    };
    let required = required_names(schema);

    props
        .iter()
        .map(|(name, details)| ArgumentRow {
            name: name.clone(),
            kind: details
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            required: required.contains(&name.as_str()),
            description: details
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
        .collect()
}

/// One entry per schema property. Each value comes from, in order: the
/// explicit override, the selected event's id, the selected challenge's id,
/// the schema default, or a placeholder for the declared type. Overrides for
/// keys the schema does not declare are appended as is.
pub fn argument_template(
    schema: &Value,
    selection: &SelectionState,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut template = Map::new();

    if let Some(props) = properties(schema) {
        for (name, details) in props {
            let kind = details
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string");
            let value = overrides
                .get(name)
                .cloned()
                .or_else(|| {
                    selected_id(selection.selected_event.as_ref(), name, EVENT_ID_KEYS, kind)
                })
                .or_else(|| {
                    selected_id(
                        selection.selected_challenge.as_ref(),
                        name,
                        CHALLENGE_ID_KEYS,
                        kind,
                    )
                })
                .or_else(|| details.get("default").cloned())
                .unwrap_or_else(|| placeholder(kind));
            template.insert(name.clone(), value);
        }
    }

    for (name, value) in overrides {
        template
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    template
}

pub fn render_template(template: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(template).unwrap_or_else(|_| "{}".to_string())
}

fn selected_id(record: Option<&Record>, name: &str, keys: &[&str], kind: &str) -> Option<Value> {
    if !keys.contains(&name) {
        return None;
    }
    let id = record?.get("id")?;
    if kind == "integer" {
        Some(Value::from(coerce_integer(id)))
    } else {
        Some(Value::String(value_text(id)))
    }
}

fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n.trunc() as i64))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        Value::Bool(flag) => i64::from(*flag),
        _ => 0,
    }
}

fn placeholder(kind: &str) -> Value {
    match kind {
        "string" => Value::from("<string>"),
        "integer" => Value::from(0),
        "number" => Value::from(0.0),
        "boolean" => Value::Bool(false),
        "array" => Value::Array(Vec::new()),
        "object" => Value::Object(Map::new()),
        _ => Value::from("<value>"),
    }
}
