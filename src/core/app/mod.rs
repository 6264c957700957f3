//! Application state owned by the UI event loop.
//!
//! [`App`] is a plain struct: key presses and background task results reach
//! it as [`AppAction`]s, and anything that has to leave the loop (network
//! calls, reveal timers) comes back out as an [`AppCommand`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::cache::{MetadataCache, MetadataKind};
use crate::core::config::Settings;
use crate::core::format::{play_details, resource_markdown, result_markdown};
use crate::core::records::{self, McpRecord, Record, RecordKind};
use crate::core::reveal::PaceConfig;
use crate::core::selection::SelectionState;
use crate::core::template::{argument_rows, argument_template, render_template};

pub mod actions;
pub mod screens;

pub use actions::{
    apply_actions, AppAction, AppActionContext, AppActionDispatcher, AppActionEnvelope, AppCommand,
    RevealRequest,
};
pub use screens::{
    MenuItem, MetadataScreen, PlayScreen, RecordScreen, ResourceInputScreen, ResultScreen,
    RevealView, Screen, ToolPickerScreen, WizardScreen,
};

/// How long a notification stays in the status bar.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Tools whose wizard runs as soon as it opens.
const AUTO_EXECUTE_TOOLS: &[&str] = &["list_ctf_events"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: Instant,
}

/// The parts of [`Settings`] the UI needs after startup.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub server_url: String,
    pub pace: PaceConfig,
    pub animate: bool,
    pub state_file: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&Settings> for AppSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            server_url: settings.server.url.clone(),
            pace: settings.pace,
            animate: settings.animate,
            state_file: settings.state_file.clone(),
            output_dir: settings.output_dir.clone(),
        }
    }
}

pub struct App {
    pub settings: AppSettings,
    pub selection: SelectionState,
    pub cache: MetadataCache<McpRecord>,
    /// Selected row of the main menu, which sits below every stacked screen.
    pub menu_selected: usize,
    pub screens: Vec<Screen>,
    pub notifications: VecDeque<Notification>,
    /// Label of the tool call or resource read currently running.
    pub busy: Option<String>,
    pub should_quit: bool,
    next_reveal_id: u64,
}

impl App {
    pub fn new(
        settings: AppSettings,
        selection: SelectionState,
        cache: MetadataCache<McpRecord>,
    ) -> Self {
        Self {
            settings,
            selection,
            cache,
            menu_selected: 0,
            screens: Vec::new(),
            notifications: VecDeque::new(),
            busy: None,
            should_quit: false,
            next_reveal_id: 0,
        }
    }

    /// Top of the screen stack; `None` means the main menu is showing.
    pub fn current(&self) -> Option<&Screen> {
        self.screens.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Screen> {
        self.screens.last_mut()
    }

    pub fn push(&mut self, screen: Screen) {
        debug!(screen = screen.name(), "push screen");
        self.screens.push(screen);
    }

    pub fn pop(&mut self) {
        if let Some(screen) = self.screens.pop() {
            debug!(screen = screen.name(), "pop screen");
        }
    }

    pub fn return_to_menu(&mut self) {
        self.screens.clear();
    }

    pub fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            NoticeKind::Error => warn!(%message, "error notification"),
            _ => debug!(%message, "notification"),
        }
        self.notifications.push_back(Notification {
            kind,
            message,
            expires_at: Instant::now() + NOTIFICATION_TTL,
        });
        while self.notifications.len() > 3 {
            self.notifications.pop_front();
        }
    }

    /// Drops expired notifications. Returns whether anything changed.
    pub fn prune_notifications(&mut self, now: Instant) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|notice| notice.expires_at > now);
        before != self.notifications.len()
    }

    pub fn menu_items(&self) -> &'static [MenuItem] {
        &MenuItem::ALL
    }

    pub fn is_menu_item_enabled(&self, item: MenuItem) -> bool {
        match item {
            MenuItem::Play => self.selection.can_play(),
            _ => true,
        }
    }

    /// Saves the selection state, reporting a failure in the status bar.
    pub fn persist_selection(&mut self) {
        if let Err(err) = self.selection.save(&self.settings.state_file) {
            self.notify(NoticeKind::Error, err.to_string());
        }
    }

    /// Creates the view for `text` and, when animation is on, the command that
    /// drives it.
    pub fn new_reveal(&mut self, text: String) -> (RevealView, Option<AppCommand>) {
        self.next_reveal_id += 1;
        let id = self.next_reveal_id;
        if !self.settings.animate || text.is_empty() {
            return (RevealView::instant(id, text), None);
        }
        let view = RevealView::pending(id, text.clone());
        let command = AppCommand::Reveal(RevealRequest {
            id,
            text,
            pace: self.settings.pace,
            skip: view.skip_token(),
        });
        (view, Some(command))
    }

    pub fn reveal_view_mut(&mut self, id: u64) -> Option<&mut RevealView> {
        self.screens
            .iter_mut()
            .rev()
            .filter_map(Screen::reveal_view_mut)
            .find(|view| view.id() == id)
    }

    pub fn open_metadata(&mut self, kind: MetadataKind) -> Vec<AppCommand> {
        let stale = self.cache.is_stale(kind);
        self.push(Screen::Metadata(MetadataScreen {
            kind,
            selected: 0,
            loading: stale,
        }));
        if stale {
            vec![AppCommand::RefreshMetadata { kind, force: false }]
        } else {
            Vec::new()
        }
    }

    pub fn open_tool_picker(&mut self) -> Vec<AppCommand> {
        let stale = self.cache.is_stale(MetadataKind::Tools);
        self.push(Screen::ToolPicker(ToolPickerScreen {
            filter: String::new(),
            selected: 0,
            loading: stale,
        }));
        if stale {
            vec![AppCommand::RefreshMetadata {
                kind: MetadataKind::Tools,
                force: false,
            }]
        } else {
            Vec::new()
        }
    }

    /// Opens the argument editor for `name`, using the cached tool definition
    /// when there is one.
    pub fn open_tool(
        &mut self,
        name: &str,
        fallback_description: &str,
        overrides: Map<String, Value>,
    ) -> Vec<AppCommand> {
        let entry = self.cache.get(MetadataKind::Tools);
        let cached = entry
            .items
            .iter()
            .filter_map(McpRecord::as_tool)
            .find(|tool| tool.name == name);

        let (description, schema) = match cached {
            Some(tool) => (
                tool.description.clone().unwrap_or_default(),
                records::input_schema(tool),
            ),
            None => (
                fallback_description.to_string(),
                serde_json::json!({"type": "object"}),
            ),
        };
        self.open_wizard(name.to_string(), description, schema, overrides)
    }

    pub fn open_wizard(
        &mut self,
        tool_name: String,
        description: String,
        schema: Value,
        overrides: Map<String, Value>,
    ) -> Vec<AppCommand> {
        let template = argument_template(&schema, &self.selection, &overrides);
        let wizard = WizardScreen::new(
            tool_name.clone(),
            description,
            argument_rows(&schema),
            &render_template(&template),
        );
        self.push(Screen::Wizard(wizard));

        if AUTO_EXECUTE_TOOLS.contains(&tool_name.as_str()) {
            self.execute_wizard()
        } else {
            Vec::new()
        }
    }

    /// Parses the editor of the top wizard and starts the call.
    pub fn execute_wizard(&mut self) -> Vec<AppCommand> {
        if self.busy.is_some() {
            self.notify(NoticeKind::Warning, "A request is already running");
            return Vec::new();
        }
        let Some(Screen::Wizard(wizard)) = self.current_mut() else {
            return Vec::new();
        };

        let arguments = match serde_json::from_str::<Value>(&wizard.editor_text()) {
            Ok(Value::Object(arguments)) => arguments,
            Ok(_) => {
                self.notify(NoticeKind::Error, "Arguments must be a JSON object");
                return Vec::new();
            }
            Err(_) => {
                self.notify(NoticeKind::Error, "Invalid JSON arguments");
                return Vec::new();
            }
        };

        wizard.executing = true;
        let name = wizard.tool_name.clone();
        self.busy = Some(format!("Executing {name}..."));
        vec![AppCommand::CallTool { name, arguments }]
    }

    pub fn open_records(&mut self, kind: RecordKind, tool_name: &str, result: Value) -> Vec<AppCommand> {
        let records = records::extract(kind, &result);
        let details = match records.first() {
            Some(record) => screens::record_details(kind, record),
            None => format!("_No {} records in this result._\n", kind.singular().to_lowercase()),
        };
        let (view, command) = self.new_reveal(details);
        self.push(Screen::Records(RecordScreen {
            kind,
            title: format!("Tool Result: {tool_name}"),
            tool_name: tool_name.to_string(),
            result,
            records,
            selected: 0,
            details: view,
        }));
        command.into_iter().collect()
    }

    pub fn open_tool_result(&mut self, tool_name: &str, result: Value) -> Vec<AppCommand> {
        let markdown = result_markdown(&result);
        self.open_result(format!("Tool Result: {tool_name}"), tool_name, result, markdown)
    }

    pub fn open_resource(&mut self, uri: &str, result: Value) -> Vec<AppCommand> {
        let markdown = resource_markdown(&result);
        self.open_result(format!("Resource: {uri}"), "resource", result, markdown)
    }

    pub fn open_result(
        &mut self,
        title: String,
        stem: &str,
        result: Value,
        markdown: String,
    ) -> Vec<AppCommand> {
        let (view, command) = self.new_reveal(markdown);
        self.push(Screen::Result(ResultScreen {
            title,
            stem: stem.to_string(),
            result,
            view,
            scroll: 0,
        }));
        command.into_iter().collect()
    }

    pub fn open_play(&mut self) -> Vec<AppCommand> {
        let Some(challenge) = self.selection.selected_challenge.clone() else {
            self.notify(NoticeKind::Warning, "Select an event, team and challenge first");
            return Vec::new();
        };
        let (view, command) = self.new_reveal(play_details(&challenge));
        self.push(Screen::Play(PlayScreen { view }));
        command.into_iter().collect()
    }

    /// Moves the highlight of the top record screen and restarts the details
    /// reveal for the new row.
    pub fn highlight_record(&mut self, index: usize) -> Vec<AppCommand> {
        let details = match self.current() {
            Some(Screen::Records(screen)) if index != screen.selected => screen
                .records
                .get(index)
                .map(|record: &Record| screens::record_details(screen.kind, record)),
            _ => None,
        };
        let Some(details) = details else {
            return Vec::new();
        };

        let (view, command) = self.new_reveal(details);
        if let Some(Screen::Records(screen)) = self.current_mut() {
            screen.selected = index;
            screen.details = view;
        }
        command.into_iter().collect()
    }
}

/// "cached 2m ago" style hint for list titles.
pub fn freshness_hint(age: Option<Duration>, stale: bool, refreshing: bool) -> String {
    if refreshing {
        return "refreshing...".to_string();
    }
    let Some(age) = age else {
        return "not loaded".to_string();
    };
    let secs = age.as_secs();
    let when = match secs {
        0..=4 => "just now".to_string(),
        5..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    };
    if stale {
        format!("cached {when}, stale")
    } else {
        format!("cached {when}")
    }
}

#[cfg(test)]
mod tests;
