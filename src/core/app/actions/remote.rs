use serde_json::Value;
use tracing::info;

use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::app::{NoticeKind, Screen};
use crate::core::cache::MetadataKind;
use crate::core::records::{self, RecordKind};

pub(super) fn handle_remote_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Vec<AppCommand> {
    match action {
        AppAction::MetadataLoaded {
            kind,
            count,
            forced,
        } => {
            finish_loading(app, kind);
            if forced {
                app.notify(NoticeKind::Info, format!("Refreshed {kind}: {count} items"));
            }
            Vec::new()
        }
        AppAction::MetadataFailed { kind, error } => {
            finish_loading(app, kind);
            app.notify(NoticeKind::Error, format!("Error loading {kind}: {error}"));
            Vec::new()
        }
        AppAction::ToolCompleted { name, result } => {
            app.busy = None;
            for screen in app.screens.iter_mut() {
                if let Screen::Wizard(wizard) = screen {
                    wizard.executing = false;
                }
            }
            match result {
                Ok(result) => route_tool_result(app, &name, result),
                Err(error) => {
                    app.notify(NoticeKind::Error, format!("Execution failed: {error}"));
                    Vec::new()
                }
            }
        }
        AppAction::ResourceRead { uri, result } => {
            app.busy = None;
            for screen in app.screens.iter_mut() {
                if let Screen::ResourceInput(input) = screen {
                    input.loading = false;
                }
            }
            match result {
                Ok(result) => app.open_resource(&uri, result),
                Err(error) => {
                    app.notify(NoticeKind::Error, format!("Read failed: {error}"));
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

fn finish_loading(app: &mut App, kind: MetadataKind) {
    for screen in app.screens.iter_mut() {
        match screen {
            Screen::Metadata(list) if list.kind == kind => list.loading = false,
            Screen::ToolPicker(picker) if kind == MetadataKind::Tools => picker.loading = false,
            _ => {}
        }
    }
}

/// Sends a tool result to the screen that knows what to do with it.
fn route_tool_result(app: &mut App, name: &str, result: Value) -> Vec<AppCommand> {
    if records::is_error_result(&result) {
        app.notify(NoticeKind::Warning, format!("{name} reported an error"));
        return app.open_tool_result(name, result);
    }

    match name {
        "list_ctf_events" => app.open_records(RecordKind::Events, name, result),
        "retrieve_my_teams" => app.open_records(RecordKind::Teams, name, result),
        "retrieve_ctf" => {
            app.selection.challenges_cache = records::extract(RecordKind::Challenges, &result)
                .into_iter()
                .map(Value::Object)
                .collect();
            app.persist_selection();
            app.open_records(RecordKind::Challenges, name, result)
        }
        "start_container" => {
            match records::container_status(&result) {
                Some(status) => {
                    info!(address = %status.address(), "container started");
                    app.notify(
                        NoticeKind::Info,
                        format!("Container started at {}", status.address()),
                    );
                    app.selection.container_status = Some(status);
                    app.persist_selection();
                }
                None => app.notify(NoticeKind::Info, "Container started!"),
            }
            app.open_tool_result(name, result)
        }
        "stop_container" => {
            if app.selection.container_status.take().is_some() {
                app.persist_selection();
            }
            app.notify(NoticeKind::Info, "Container stopped");
            app.open_tool_result(name, result)
        }
        _ => app.open_tool_result(name, result),
    }
}
