use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::app::screens::record_details;
use crate::core::app::{NoticeKind, Screen};
use crate::core::export::{self, ExportPayload};
use crate::core::format::events_report;
use crate::core::records::RecordKind;

pub(super) fn handle_export_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Vec<AppCommand> {
    let as_json = matches!(action, AppAction::ExportJson);
    let Some((stem, payload)) = export_payload(app, as_json) else {
        return Vec::new();
    };

    match export::save(&app.settings.output_dir, &stem, &payload) {
        Ok(path) => app.notify(
            NoticeKind::Info,
            format!("Saved {} to {}", payload.label(), path.display()),
        ),
        Err(err) => app.notify(NoticeKind::Error, format!("Save failed: {err}")),
    }
    Vec::new()
}

/// What `j` / `m` write for the current screen. Event listings export the
/// whole list as Markdown; other record screens export the highlighted row.
fn export_payload(app: &App, as_json: bool) -> Option<(String, ExportPayload)> {
    match app.current()? {
        Screen::Records(screen) => {
            let payload = if as_json {
                ExportPayload::Json(screen.result.clone())
            } else if screen.kind == RecordKind::Events {
                ExportPayload::Markdown(events_report(&screen.records))
            } else {
                let record = screen.highlighted()?;
                ExportPayload::Markdown(record_details(screen.kind, record))
            };
            Some((screen.tool_name.clone(), payload))
        }
        Screen::Result(screen) => {
            let payload = if as_json {
                ExportPayload::Json(screen.result.clone())
            } else {
                ExportPayload::Markdown(screen.view.source().to_string())
            };
            Some((screen.stem.clone(), payload))
        }
        _ => None,
    }
}
