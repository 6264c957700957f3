use serde_json::{Map, Value};
use tracing::debug;

use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::app::{MenuItem, NoticeKind, ResourceInputScreen, Screen};
use crate::core::cache::MetadataKind;
use crate::core::records::McpRecord;

#[derive(Debug, Clone, Copy)]
enum Movement {
    Up,
    Down,
    PageUp,
    PageDown,
}

pub(super) fn handle_navigation_action(
    app: &mut App,
    action: AppAction,
    ctx: AppActionContext,
) -> Vec<AppCommand> {
    match action {
        AppAction::Quit => {
            app.should_quit = true;
            Vec::new()
        }
        AppAction::Back => {
            app.pop();
            Vec::new()
        }
        AppAction::MoveUp => handle_movement(app, Movement::Up, ctx),
        AppAction::MoveDown => handle_movement(app, Movement::Down, ctx),
        AppAction::PageUp => handle_movement(app, Movement::PageUp, ctx),
        AppAction::PageDown => handle_movement(app, Movement::PageDown, ctx),
        AppAction::Activate => handle_activate(app),
        AppAction::Refresh => handle_refresh(app),
        AppAction::Execute => app.execute_wizard(),
        AppAction::EditorInput(input) => {
            handle_editor_input(app, input);
            Vec::new()
        }
        AppAction::FilterChar(ch) => {
            if let Some(Screen::ToolPicker(picker)) = app.current_mut() {
                picker.filter.push(ch);
                picker.selected = 0;
            }
            Vec::new()
        }
        AppAction::FilterBackspace => {
            if let Some(Screen::ToolPicker(picker)) = app.current_mut() {
                picker.filter.pop();
                picker.selected = 0;
            }
            Vec::new()
        }
        AppAction::PlayStartContainer => {
            play_tool(app, "start_container", "Start a container", true)
        }
        AppAction::PlayStopContainer => {
            play_tool(app, "stop_container", "Stop a container", false)
        }
        AppAction::PlayDownload => {
            play_tool(app, "download_challenge", "Download challenge files", true)
        }
        _ => Vec::new(),
    }
}

fn step(current: usize, len: usize, movement: Movement, page: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    match movement {
        Movement::Up => current.saturating_sub(1),
        Movement::Down => (current + 1).min(last),
        Movement::PageUp => current.saturating_sub(page),
        Movement::PageDown => (current + page).min(last),
    }
}

fn handle_movement(app: &mut App, movement: Movement, ctx: AppActionContext) -> Vec<AppCommand> {
    let page = usize::from(ctx.term_height.saturating_sub(10)).max(1);

    let tools = app.cache.get(MetadataKind::Tools);
    let mut highlight = None;
    match app.screens.last_mut() {
        None => {
            app.menu_selected = step(app.menu_selected, MenuItem::ALL.len(), movement, page);
        }
        Some(Screen::Metadata(screen)) => {
            let len = app.cache.get(screen.kind).items.len();
            screen.selected = step(screen.selected, len, movement, page);
        }
        Some(Screen::ToolPicker(picker)) => {
            let len = picker.matches(&tools.items).len();
            picker.selected = step(picker.selected, len, movement, page);
        }
        Some(Screen::Records(screen)) => {
            highlight = Some(step(screen.selected, screen.records.len(), movement, page));
        }
        Some(Screen::Result(screen)) => {
            let lines = u16::try_from(page).unwrap_or(u16::MAX);
            screen.scroll = match movement {
                Movement::Up => screen.scroll.saturating_sub(1),
                Movement::Down => screen.scroll.saturating_add(1),
                Movement::PageUp => screen.scroll.saturating_sub(lines),
                Movement::PageDown => screen.scroll.saturating_add(lines),
            };
        }
        Some(Screen::Wizard(_) | Screen::ResourceInput(_) | Screen::Play(_)) => {}
    }

    match highlight {
        Some(index) => app.highlight_record(index),
        None => Vec::new(),
    }
}

fn handle_activate(app: &mut App) -> Vec<AppCommand> {
    match app.current() {
        None => {
            let item = MenuItem::ALL
                .get(app.menu_selected)
                .copied()
                .unwrap_or(MenuItem::Exit);
            activate_menu_item(app, item)
        }
        Some(Screen::Metadata(screen)) => {
            let kind = screen.kind;
            let selected = screen.selected;
            let entry = app.cache.get(kind);
            match entry.items.get(selected) {
                Some(record) => activate_record(app, record),
                None => Vec::new(),
            }
        }
        Some(Screen::ToolPicker(picker)) => {
            let entry = app.cache.get(MetadataKind::Tools);
            let chosen = picker.matches(&entry.items).get(picker.selected).copied().cloned();
            match chosen {
                Some(record) => activate_record(app, &record),
                None => Vec::new(),
            }
        }
        Some(Screen::Records(screen)) => {
            let kind = screen.kind;
            let Some(record) = screen.highlighted().cloned() else {
                return Vec::new();
            };
            let name = crate::core::records::record_name(&record);
            app.selection.select(kind, record);
            app.persist_selection();
            app.notify(
                NoticeKind::Info,
                format!("Selected {}: {name}", kind.singular()),
            );
            app.return_to_menu();
            Vec::new()
        }
        Some(Screen::ResourceInput(screen)) => {
            let uri = screen.uri();
            if uri.is_empty() {
                app.notify(NoticeKind::Warning, "Please enter a URI");
                return Vec::new();
            }
            if app.busy.is_some() {
                app.notify(NoticeKind::Warning, "A request is already running");
                return Vec::new();
            }
            if let Some(Screen::ResourceInput(screen)) = app.current_mut() {
                screen.loading = true;
            }
            app.busy = Some(format!("Reading {uri}..."));
            vec![AppCommand::ReadResource { uri }]
        }
        Some(Screen::Wizard(_) | Screen::Result(_) | Screen::Play(_)) => Vec::new(),
    }
}

fn activate_menu_item(app: &mut App, item: MenuItem) -> Vec<AppCommand> {
    debug!(item = item.label(), "menu item");
    match item {
        MenuItem::Play => {
            if app.is_menu_item_enabled(MenuItem::Play) {
                app.open_play()
            } else {
                app.notify(
                    NoticeKind::Warning,
                    "Select an event, team and challenge first",
                );
                Vec::new()
            }
        }
        MenuItem::ListTools => app.open_metadata(MetadataKind::Tools),
        MenuItem::ListResources => app.open_metadata(MetadataKind::Resources),
        MenuItem::ListPrompts => app.open_metadata(MetadataKind::Prompts),
        MenuItem::CallTool => app.open_tool_picker(),
        MenuItem::ReadResource => {
            app.push(Screen::ResourceInput(ResourceInputScreen::default()));
            Vec::new()
        }
        MenuItem::RefreshMetadata => {
            app.notify(NoticeKind::Info, "Refreshing tools, resources and prompts");
            MetadataKind::ALL
                .into_iter()
                .map(|kind| AppCommand::RefreshMetadata { kind, force: true })
                .collect()
        }
        MenuItem::Exit => {
            app.should_quit = true;
            Vec::new()
        }
    }
}

/// Enter on a listed tool opens its wizard, on a resource reads it, and on a
/// prompt shows its definition.
fn activate_record(app: &mut App, record: &McpRecord) -> Vec<AppCommand> {
    match record {
        McpRecord::Tool(tool) => {
            let schema = crate::core::records::input_schema(tool);
            app.open_wizard(
                tool.name.clone(),
                tool.description.clone().unwrap_or_default(),
                schema,
                Map::new(),
            )
        }
        McpRecord::Resource(resource) => {
            if app.busy.is_some() {
                app.notify(NoticeKind::Warning, "A request is already running");
                return Vec::new();
            }
            app.busy = Some(format!("Reading {}...", resource.uri));
            vec![AppCommand::ReadResource {
                uri: resource.uri.clone(),
            }]
        }
        McpRecord::Prompt(prompt) => {
            let definition = serde_json::to_value(prompt).unwrap_or(Value::Null);
            let markdown = crate::core::format::json_to_markdown(&definition);
            app.open_result(
                format!("Prompt: {}", prompt.name),
                "prompt",
                definition,
                markdown,
            )
        }
    }
}

fn handle_refresh(app: &mut App) -> Vec<AppCommand> {
    let kind = match app.current_mut() {
        Some(Screen::Metadata(screen)) => {
            screen.loading = true;
            screen.kind
        }
        Some(Screen::ToolPicker(picker)) => {
            picker.loading = true;
            MetadataKind::Tools
        }
        _ => return Vec::new(),
    };
    vec![AppCommand::RefreshMetadata { kind, force: true }]
}

fn handle_editor_input(app: &mut App, input: tui_textarea::Input) {
    match app.current_mut() {
        Some(Screen::Wizard(wizard)) if !wizard.executing => {
            wizard.editor.input(input);
        }
        Some(Screen::ResourceInput(screen)) if !screen.loading => {
            screen.editor.input(input);
        }
        _ => {}
    }
}

fn play_tool(app: &mut App, tool: &str, description: &str, needs_challenge: bool) -> Vec<AppCommand> {
    if !matches!(app.current(), Some(Screen::Play(_))) {
        return Vec::new();
    }
    let mut overrides = Map::new();
    if needs_challenge {
        let Some(id) = app
            .selection
            .selected_challenge
            .as_ref()
            .and_then(|challenge| challenge.get("id"))
            .cloned()
        else {
            app.notify(NoticeKind::Warning, "The selected challenge has no id");
            return Vec::new();
        };
        overrides.insert("challenge_id".to_string(), id);
    }
    app.open_tool(tool, description, overrides)
}
