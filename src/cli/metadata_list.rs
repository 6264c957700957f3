use std::error::Error;
use std::io::Write;

use crate::core::cache::MetadataKind;
use crate::core::records::McpRecord;
use crate::mcp::{list_records, McpBackend};

pub async fn print_metadata(
    backend: &dyn McpBackend,
    kind: MetadataKind,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let records = list_records(backend, kind).await?;
    write!(out, "{}", metadata_table(kind, &records))?;
    Ok(())
}

fn cell(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .replace('|', "\\|")
}

pub(crate) fn metadata_table(kind: MetadataKind, records: &[McpRecord]) -> String {
    if records.is_empty() {
        return format!("No {} available.\n", kind.label());
    }

    let detail = match kind {
        MetadataKind::Resources => "URI",
        MetadataKind::Tools | MetadataKind::Prompts => "Arguments",
    };
    let mut table = format!("| Name | {detail} | Description |\n|---|---|---|\n");
    for record in records {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            cell(record.name()),
            cell(&record.detail()),
            cell(record.description())
        ));
    }
    table
}
