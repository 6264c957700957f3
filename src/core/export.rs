use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_OUTPUT_DIR: &str = "htb_mcp_output";

#[derive(Debug, Clone)]
pub enum ExportPayload {
    Json(Value),
    Markdown(String),
}

impl ExportPayload {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportPayload::Json(_) => "json",
            ExportPayload::Markdown(_) => "md",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportPayload::Json(_) => "JSON",
            ExportPayload::Markdown(_) => "Markdown",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not encode JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes `payload` to `<output_dir>/<stem>-<YYYYmmdd_HHMMSS>.<ext>` and
/// returns the absolute path.
pub fn save(output_dir: &Path, stem: &str, payload: &ExportPayload) -> Result<PathBuf, ExportError> {
    save_at(output_dir, stem, payload, Local::now())
}

pub fn save_at(
    output_dir: &Path,
    stem: &str,
    payload: &ExportPayload,
    at: DateTime<Local>,
) -> Result<PathBuf, ExportError> {
    let path = output_dir.join(export_file_name(stem, payload, at));
    let io_err = |source| ExportError::Io {
        path: path.clone(),
        source,
    };

    let contents = match payload {
        ExportPayload::Json(value) => serde_json::to_string_pretty(value)?,
        ExportPayload::Markdown(text) => text.clone(),
    };

    fs::create_dir_all(output_dir).map_err(io_err)?;
    let mut temp_file = NamedTempFile::new_in(output_dir).map_err(io_err)?;
    temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
    temp_file.as_file_mut().sync_all().map_err(io_err)?;
    temp_file.persist(&path).map_err(|err| io_err(err.error))?;

    let absolute = fs::canonicalize(&path).map_err(io_err)?;
    info!(path = %absolute.display(), format = payload.label(), "exported result");
    Ok(absolute)
}

pub fn export_file_name(stem: &str, payload: &ExportPayload, at: DateTime<Local>) -> String {
    format!(
        "{}-{}.{}",
        sanitize_stem(stem),
        at.format("%Y%m%d_%H%M%S"),
        payload.extension()
    )
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "result".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn file_names_carry_stem_timestamp_and_extension() {
        let json = ExportPayload::Json(json!({}));
        let md = ExportPayload::Markdown(String::new());
        assert_eq!(
            export_file_name("list_ctf_events", &json, fixed_time()),
            "list_ctf_events-20260314_092653.json"
        );
        assert_eq!(
            export_file_name("retrieve_ctf", &md, fixed_time()),
            "retrieve_ctf-20260314_092653.md"
        );
        assert_eq!(
            export_file_name("../etc/passwd", &md, fixed_time()),
            "_etc_passwd-20260314_092653.md"
        );
        assert_eq!(export_file_name("", &md, fixed_time()), "result-20260314_092653.md");
    }

    #[test]
    fn save_writes_pretty_json_and_returns_absolute_path() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("htb_mcp_output");
        let payload = ExportPayload::Json(json!({"id": 1, "name": "event"}));

        let path = save_at(&out, "list_ctf_events", &payload, fixed_time()).expect("save");
        assert!(path.is_absolute());
        assert!(path.ends_with("list_ctf_events-20260314_092653.json"));

        let written = fs::read_to_string(&path).expect("read back");
        assert_eq!(written, "{\n  \"id\": 1,\n  \"name\": \"event\"\n}");
    }

    #[test]
    fn save_writes_markdown_verbatim() {
        let dir = TempDir::new().expect("tempdir");
        let payload = ExportPayload::Markdown("# CTF Events\n".to_string());

        let path = save_at(dir.path(), "list_ctf_events", &payload, fixed_time()).expect("save");
        assert_eq!(fs::read_to_string(path).expect("read back"), "# CTF Events\n");
    }
}
