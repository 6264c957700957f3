//! Markdown rendering of tool results and CTF records.

use std::fmt::Write as _;

use serde_json::Value;

use crate::core::records::{field, record_name, tool_payload, tool_text, truthy, Record};

const CHALLENGE_SUMMARY_KEYS: &[&str] = &[
    "name",
    "id",
    "difficulty",
    "points",
    "solved",
    "description",
    "hasDocker",
    "docker_image",
    "docker_port",
    "filename",
];

const EVENT_REPORT_KEYS: &[&str] = &["name", "id", "status", "format", "starts_at", "ends_at"];

/// Nested bullet list of a JSON value, two spaces per level.
pub fn json_to_markdown(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, level: usize) {
    let indent = "  ".repeat(level);
    match value {
        Value::Object(obj) if obj.is_empty() => {
            let _ = writeln!(out, "{indent}_empty object_");
        }
        Value::Object(obj) => {
            for (key, child) in obj {
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{indent}- **{key}**:");
                        write_value(out, child, level + 1);
                    }
                    scalar => {
                        let _ = writeln!(out, "{indent}- **{key}**: `{}`", scalar_text(scalar));
                    }
                }
            }
        }
        Value::Array(items) if items.is_empty() => {
            let _ = writeln!(out, "{indent}_empty list_");
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{indent}-");
                        write_value(out, item, level + 1);
                    }
                    scalar => {
                        let _ = writeln!(out, "{indent}- `{}`", scalar_text(scalar));
                    }
                }
            }
        }
        scalar => {
            let _ = writeln!(out, "{indent}`{}`", scalar_text(scalar));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.replace('`', "'"),
        other => other.to_string(),
    }
}

/// Markdown for the result viewer. A JSON payload inside the text blocks is
/// expanded; plain text is shown as written; anything else falls back to the
/// raw result.
pub fn result_markdown(result: &Value) -> String {
    if let Some(payload) = tool_payload(result) {
        return json_to_markdown(&payload);
    }
    let text = tool_text(result);
    if !text.trim().is_empty() {
        return text;
    }
    json_to_markdown(result)
}

/// Markdown for a `resources/read` result. Text contents holding JSON are
/// expanded like tool payloads; binary contents are only named.
pub fn resource_markdown(result: &Value) -> String {
    let Some(contents) = result.get("contents").and_then(Value::as_array) else {
        return json_to_markdown(result);
    };
    if contents.is_empty() {
        return "_empty resource_\n".to_string();
    }

    let mut md = String::new();
    for content in contents {
        if !md.is_empty() {
            md.push_str("\n---\n\n");
        }
        if let Some(text) = content.get("text").and_then(Value::as_str) {
            match serde_json::from_str::<Value>(text) {
                Ok(parsed) if parsed.is_object() || parsed.is_array() => {
                    md.push_str(&json_to_markdown(&parsed))
                }
                _ => md.push_str(text),
            }
        } else {
            let mime = content
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream");
            let _ = writeln!(md, "_binary content ({mime})_");
        }
    }
    md
}

pub fn event_details(event: &Record) -> String {
    let mut md = format!("## {}\n\n", record_name(event));
    let _ = writeln!(md, "**ID**: {}  ", field(event, "id", "N/A"));
    let _ = writeln!(md, "**Status**: {}  ", field(event, "status", "N/A"));
    let _ = writeln!(md, "**Type**: {}\n", field(event, "type", "N/A"));

    let description = field(event, "description", "");
    if !description.is_empty() {
        let _ = writeln!(md, "### Description\n{description}");
    }
    md
}

pub fn challenge_details(challenge: &Record) -> String {
    let mut md = format!("## 🚩 {}\n\n", record_name(challenge));
    let _ = writeln!(md, "**ID**: {}\n", field(challenge, "id", "N/A"));
    let _ = writeln!(md, "**Difficulty**: {}\n", field(challenge, "difficulty", "N/A"));
    let _ = writeln!(md, "**Points**: {}\n", field(challenge, "points", "N/A"));
    let _ = writeln!(md, "**Solved**: {}\n", truthy(challenge, "solved"));

    let description = field(challenge, "description", "");
    if !description.is_empty() {
        let _ = writeln!(md, "### Description\n{description}\n");
    }

    if truthy(challenge, "hasDocker") {
        md.push_str("### 🐳 Docker Info\n");
        let _ = writeln!(
            md,
            "- **Image**: `{}`",
            field(challenge, "docker_image", "N/A")
        );
        let _ = writeln!(
            md,
            "- **Port**: `{}`\n",
            field(challenge, "docker_port", "N/A")
        );
    }

    let filename = field(challenge, "filename", "");
    if !filename.is_empty() {
        let _ = writeln!(md, "### 📁 Files\n- `{filename}`\n");
    }

    md.push_str("### Additional Details\n\n");
    for (key, value) in challenge {
        if CHALLENGE_SUMMARY_KEYS.contains(&key.as_str()) {
            continue;
        }
        let _ = writeln!(md, "- **{key}**: `{}`", scalar_text(value));
    }
    md
}

pub fn team_details(team: &Record) -> String {
    let mut md = format!("## 🛡️ {}\n\n", record_name(team));
    let _ = writeln!(md, "**ID**: {}  ", field(team, "id", "N/A"));
    let _ = writeln!(md, "**Captain ID**: {}\n", field(team, "captain_id", "N/A"));

    md.push_str("### Members\n");
    let members = team
        .get("members")
        .and_then(Value::as_array)
        .filter(|members| !members.is_empty());
    match members {
        Some(members) => {
            for member in members {
                match member.as_object() {
                    Some(member) => {
                        let _ = writeln!(
                            md,
                            "- {} (ID: {})",
                            record_name(member),
                            field(member, "id", "N/A")
                        );
                    }
                    None => {
                        let _ = writeln!(md, "- {}", scalar_text(member));
                    }
                }
            }
        }
        None => md.push_str("No members listed.\n"),
    }
    md
}

/// Summary of the selected challenge shown on the play page.
pub fn play_details(challenge: &Record) -> String {
    let mut md = format!("# 🚩 {}\n\n", record_name(challenge));
    let _ = writeln!(
        md,
        "**ID**: {} | **Diff**: {} | **Pts**: {}\n",
        field(challenge, "id", "N/A"),
        field(challenge, "difficulty", "N/A"),
        field(challenge, "points", "N/A")
    );

    let description = field(challenge, "description", "");
    if !description.is_empty() {
        let _ = writeln!(md, "### Description\n{description}\n");
    }

    if truthy(challenge, "hasDocker") {
        md.push_str("### 🐳 Docker Info\nContainer required for this challenge.\n\n");
    }

    let filename = field(challenge, "filename", "");
    if !filename.is_empty() {
        let _ = writeln!(md, "### 📁 Files\n- `{filename}`\n");
    }
    md
}

/// Full Markdown export of an event listing.
pub fn events_report(events: &[Record]) -> String {
    let mut md = String::from("# CTF Events\n\n");
    for event in events {
        let _ = writeln!(md, "## 🚩 {}", record_name(event));
        let _ = writeln!(md, "**ID**: {}  ", field(event, "id", "None"));
        let _ = writeln!(md, "**Status**: {}  ", field(event, "status", "None"));
        let _ = writeln!(md, "**Format**: {}  ", field(event, "format", "None"));
        let _ = writeln!(
            md,
            "**Dates**: {} to {}\n",
            field(event, "starts_at", "None"),
            field(event, "ends_at", "None")
        );
        for (key, value) in event {
            if EVENT_REPORT_KEYS.contains(&key.as_str()) {
                continue;
            }
            let _ = writeln!(md, "- **{key}**: `{}`", scalar_text(value));
        }
        md.push_str("\n---\n\n");
    }
    md
}
