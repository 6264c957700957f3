use ratatui::style::{Modifier, Style};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tui_textarea::TextArea;

use crate::core::cache::MetadataKind;
use crate::core::format::{challenge_details, event_details, team_details};
use crate::core::records::{McpRecord, Record, RecordKind};
use crate::core::template::ArgumentRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Play,
    ListTools,
    ListResources,
    ListPrompts,
    CallTool,
    ReadResource,
    RefreshMetadata,
    Exit,
}

impl MenuItem {
    pub const ALL: [MenuItem; 8] = [
        MenuItem::Play,
        MenuItem::ListTools,
        MenuItem::ListResources,
        MenuItem::ListPrompts,
        MenuItem::CallTool,
        MenuItem::ReadResource,
        MenuItem::RefreshMetadata,
        MenuItem::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuItem::Play => "Play",
            MenuItem::ListTools => "List Tools",
            MenuItem::ListResources => "List Resources",
            MenuItem::ListPrompts => "List Prompts",
            MenuItem::CallTool => "Call Tool",
            MenuItem::ReadResource => "Read Resource",
            MenuItem::RefreshMetadata => "Refresh Metadata",
            MenuItem::Exit => "Exit",
        }
    }
}

/// Revealed Markdown shown by a screen. Dropping the view stops the task
/// that feeds it.
#[derive(Debug)]
pub struct RevealView {
    id: u64,
    source: String,
    visible: String,
    finished: bool,
    skip: CancellationToken,
}

impl RevealView {
    pub(crate) fn instant(id: u64, source: String) -> Self {
        Self {
            id,
            visible: source.clone(),
            source,
            finished: true,
            skip: CancellationToken::new(),
        }
    }

    pub(crate) fn pending(id: u64, source: String) -> Self {
        Self {
            id,
            source,
            visible: String::new(),
            finished: false,
            skip: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn visible(&self) -> &str {
        &self.visible
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn skip_token(&self) -> CancellationToken {
        self.skip.clone()
    }

    /// Asks the driving task to reveal everything at its next wake-up.
    pub fn skip(&self) {
        self.skip.cancel();
    }

    pub(crate) fn apply_frame(&mut self, visible: String) {
        if !self.finished {
            self.visible = visible;
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }

    /// Shows the whole source regardless of what the task delivered.
    pub(crate) fn finish_with_source(&mut self) {
        self.visible = self.source.clone();
        self.finished = true;
    }
}

impl Drop for RevealView {
    fn drop(&mut self) {
        self.skip.cancel();
    }
}

pub struct MetadataScreen {
    pub kind: MetadataKind,
    pub selected: usize,
    pub loading: bool,
}

/// Tool chooser with type-to-filter.
pub struct ToolPickerScreen {
    pub filter: String,
    pub selected: usize,
    pub loading: bool,
}

impl ToolPickerScreen {
    pub fn matches<'a>(&self, tools: &'a [McpRecord]) -> Vec<&'a McpRecord> {
        let needle = self.filter.to_lowercase();
        tools
            .iter()
            .filter(|record| record.as_tool().is_some())
            .filter(|record| needle.is_empty() || record.name().to_lowercase().contains(&needle))
            .collect()
    }
}

pub struct WizardScreen {
    pub tool_name: String,
    pub description: String,
    pub rows: Vec<ArgumentRow>,
    pub editor: TextArea<'static>,
    pub executing: bool,
}

impl WizardScreen {
    pub fn new(tool_name: String, description: String, rows: Vec<ArgumentRow>, template: &str) -> Self {
        Self {
            tool_name,
            description,
            rows,
            editor: editor_with_text(template),
            executing: false,
        }
    }

    pub fn editor_text(&self) -> String {
        self.editor.lines().join("\n")
    }
}

/// Events, challenges or teams pulled out of a tool result.
pub struct RecordScreen {
    pub kind: RecordKind,
    pub title: String,
    pub tool_name: String,
    pub result: Value,
    pub records: Vec<Record>,
    pub selected: usize,
    pub details: RevealView,
}

impl RecordScreen {
    pub fn highlighted(&self) -> Option<&Record> {
        self.records.get(self.selected)
    }
}

pub struct ResultScreen {
    pub title: String,
    /// File name stem for exports.
    pub stem: String,
    pub result: Value,
    pub view: RevealView,
    pub scroll: u16,
}

pub struct ResourceInputScreen {
    pub editor: TextArea<'static>,
    pub loading: bool,
}

impl Default for ResourceInputScreen {
    fn default() -> Self {
        Self {
            editor: editor_with_text(""),
            loading: false,
        }
    }
}

impl ResourceInputScreen {
    pub fn uri(&self) -> String {
        self.editor.lines().concat().trim().to_string()
    }
}

pub struct PlayScreen {
    pub view: RevealView,
}

pub enum Screen {
    Metadata(MetadataScreen),
    ToolPicker(ToolPickerScreen),
    Wizard(WizardScreen),
    Records(RecordScreen),
    Result(ResultScreen),
    ResourceInput(ResourceInputScreen),
    Play(PlayScreen),
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Metadata(_) => "metadata",
            Screen::ToolPicker(_) => "tool_picker",
            Screen::Wizard(_) => "wizard",
            Screen::Records(_) => "records",
            Screen::Result(_) => "result",
            Screen::ResourceInput(_) => "resource_input",
            Screen::Play(_) => "play",
        }
    }

    pub fn reveal_view(&self) -> Option<&RevealView> {
        match self {
            Screen::Records(screen) => Some(&screen.details),
            Screen::Result(screen) => Some(&screen.view),
            Screen::Play(screen) => Some(&screen.view),
            _ => None,
        }
    }

    pub fn reveal_view_mut(&mut self) -> Option<&mut RevealView> {
        match self {
            Screen::Records(screen) => Some(&mut screen.details),
            Screen::Result(screen) => Some(&mut screen.view),
            Screen::Play(screen) => Some(&mut screen.view),
            _ => None,
        }
    }

    /// Whether keys go to a text editor rather than to shortcuts.
    pub fn captures_text(&self) -> bool {
        matches!(
            self,
            Screen::Wizard(_) | Screen::ResourceInput(_) | Screen::ToolPicker(_)
        )
    }
}

pub fn record_details(kind: RecordKind, record: &Record) -> String {
    match kind {
        RecordKind::Events => event_details(record),
        RecordKind::Challenges => challenge_details(record),
        RecordKind::Teams => team_details(record),
    }
}

fn editor_with_text(text: &str) -> TextArea<'static> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut editor = if lines.is_empty() {
        TextArea::default()
    } else {
        TextArea::new(lines)
    };
    editor.set_cursor_line_style(Style::default());
    editor.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
    editor
}
