use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use crate::core::app::{
    freshness_hint, App, MenuItem, MetadataScreen, PlayScreen, RecordScreen, ResourceInputScreen,
    ResultScreen, RevealView, Screen, ToolPickerScreen, WizardScreen,
};
use crate::core::cache::MetadataKind;
use crate::core::records::{field, record_name, truthy, McpRecord, Record, RecordKind};
use crate::ui::markdown::render_markdown;
use crate::ui::theme::Theme;

const BANNER: [&str; 3] = [
    "┓┏┏┳┓┳┓  ┳┳┓┏┓┏┓  ┏┓┓ ┳┏┓┳┓┏┳┓",
    "┣┫ ┃ ┣┫━━┃┃┃┃ ┃┃  ┃ ┃ ┃┣ ┃┃ ┃ ",
    "┛┗ ┻ ┻┛  ┛ ┗┗┛┣┛  ┗┛┗┛┻┗┛┛┗ ┻ ",
];

const REVEAL_CARET: &str = "▌";

pub fn ui(f: &mut Frame, app: &App, theme: &Theme) {
    let area = f.area();
    f.render_widget(Block::default().style(theme.text_style), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, app, theme, chunks[0]);
    match app.current() {
        None => draw_main_menu(f, app, theme, chunks[1]),
        Some(Screen::Metadata(screen)) => draw_metadata(f, app, screen, theme, chunks[1]),
        Some(Screen::ToolPicker(screen)) => draw_tool_picker(f, app, screen, theme, chunks[1]),
        Some(Screen::Wizard(screen)) => draw_wizard(f, screen, theme, chunks[1]),
        Some(Screen::Records(screen)) => draw_records(f, screen, theme, chunks[1]),
        Some(Screen::Result(screen)) => draw_result(f, screen, theme, chunks[1]),
        Some(Screen::ResourceInput(screen)) => draw_resource_input(f, screen, theme, chunks[1]),
        Some(Screen::Play(screen)) => draw_play(f, app, screen, theme, chunks[1]),
    }
    draw_status(f, app, theme, chunks[2]);
    draw_help(f, app, theme, chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" HTB MCP Client v{} ", env!("CARGO_PKG_VERSION")),
            theme.title_style,
        ),
        Span::styled(format!(" {}", app.settings.server_url), theme.status_bar_style),
    ];
    if let Some(busy) = &app.busy {
        spans.push(Span::styled(format!("  ● {busy}"), theme.status_bar_style));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).style(theme.status_bar_style),
        area,
    );
}

fn panel<'a>(title: impl Into<Line<'a>>, theme: &Theme, focused: bool) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(if focused {
            theme.focus_border_style
        } else {
            theme.border_style
        })
        .title(title)
        .title_style(theme.accent_style)
        .style(theme.text_style)
}

fn centered(area: Rect, width: u16) -> Rect {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(width.min(area.width)),
            Constraint::Fill(1),
        ])
        .split(area)[1]
}

fn draw_main_menu(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(BANNER.len() as u16),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    let banner: Vec<Line> = BANNER
        .iter()
        .map(|line| Line::styled(*line, theme.accent_style))
        .collect();
    f.render_widget(
        Paragraph::new(banner).alignment(Alignment::Center),
        rows[1],
    );
    f.render_widget(
        Paragraph::new(app.selection.summary())
            .style(theme.text_style.fg(crate::ui::theme::HTB_BLUE))
            .alignment(Alignment::Center),
        rows[3],
    );
    let container_style = if app.selection.container_status.is_some() {
        theme.accent_style
    } else {
        theme.text_style
    };
    f.render_widget(
        Paragraph::new(app.selection.container_line())
            .style(container_style)
            .alignment(Alignment::Center),
        rows[4],
    );

    let items: Vec<ListItem> = app
        .menu_items()
        .iter()
        .map(|item| {
            let style = if app.is_menu_item_enabled(*item) {
                theme.text_style
            } else {
                theme.disabled_style
            };
            let label = match item {
                MenuItem::Play => format!("  {}", item.label().to_uppercase()),
                _ => format!("  {}", item.label()),
            };
            ListItem::new(Line::styled(label, style))
        })
        .collect();
    let list_height = (items.len() as u16).saturating_add(2);
    let label_width = app
        .menu_items()
        .iter()
        .map(|item| item.label().width())
        .max()
        .unwrap_or(0);
    let menu_area = centered(rows[6], (label_width as u16).saturating_add(16));
    let menu_area = Rect {
        height: menu_area.height.min(list_height),
        ..menu_area
    };
    let list = List::new(items)
        .block(panel(" Main Menu ", theme, true))
        .highlight_style(theme.selected_row_style)
        .highlight_symbol("▶");
    let mut state = ListState::default().with_selected(Some(app.menu_selected));
    f.render_stateful_widget(list, menu_area, &mut state);
}

fn metadata_title(app: &App, kind: MetadataKind, loading: bool) -> String {
    let hint = freshness_hint(
        app.cache.age(kind),
        app.cache.is_stale(kind),
        loading || app.cache.is_refreshing(kind),
    );
    format!(" Available {kind} ({hint}) ")
}

fn draw_metadata(f: &mut Frame, app: &App, screen: &MetadataScreen, theme: &Theme, area: Rect) {
    let entry = app.cache.get(screen.kind);
    let block = panel(metadata_title(app, screen.kind, screen.loading), theme, true);

    if entry.items.is_empty() {
        let message = if screen.loading {
            "Loading...".to_string()
        } else {
            format!("No {} available.", screen.kind.label().to_lowercase())
        };
        f.render_widget(Paragraph::new(message).block(block), area);
        return;
    }

    let second = match screen.kind {
        MetadataKind::Tools => "Arguments",
        MetadataKind::Resources => "URI",
        MetadataKind::Prompts => "Arguments",
    };
    let header = Row::new(["Name", second, "Description"]).style(theme.header_row_style);
    let rows = entry.items.iter().map(|record| {
        Row::new([
            Cell::from(record.name().to_string()),
            Cell::from(record.detail()),
            Cell::from(first_line(record.description()).to_string()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Percentage(50),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(theme.selected_row_style);
    let mut state = TableState::default().with_selected(Some(screen.selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn draw_tool_picker(f: &mut Frame, app: &App, screen: &ToolPickerScreen, theme: &Theme, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    f.render_widget(
        Paragraph::new(format!("{}▏", screen.filter))
            .block(panel(" Filter ", theme, false)),
        rows[0],
    );

    let entry = app.cache.get(MetadataKind::Tools);
    let matches = screen.matches(&entry.items);
    let title = metadata_title(app, MetadataKind::Tools, screen.loading);
    if matches.is_empty() {
        let message = if screen.loading {
            "Loading..."
        } else {
            "No matching tools."
        };
        f.render_widget(Paragraph::new(message).block(panel(title, theme, true)), columns[0]);
    } else {
        let items: Vec<ListItem> = matches
            .iter()
            .map(|record| ListItem::new(format!(" {}", record.name())))
            .collect();
        let list = List::new(items)
            .block(panel(title, theme, true))
            .highlight_style(theme.selected_row_style);
        let mut state = ListState::default().with_selected(Some(screen.selected));
        f.render_stateful_widget(list, columns[0], &mut state);
    }

    let description = matches
        .get(screen.selected)
        .map(|record| tool_summary(record))
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(render_markdown(&description, theme))
            .wrap(Wrap { trim: false })
            .block(panel(" Description ", theme, false)),
        columns[1],
    );
}

fn tool_summary(record: &McpRecord) -> String {
    let description = record.description();
    let description = if description.is_empty() {
        "_No description._"
    } else {
        description
    };
    format!("### {}\n\n{description}\n\n`{}`", record.name(), record.detail())
}

fn draw_wizard(f: &mut Frame, screen: &WizardScreen, theme: &Theme, area: Rect) {
    let description_height = screen.description.lines().count().clamp(1, 4) as u16 + 2;
    let table_height = (screen.rows.len() as u16 + 3).min(10);
    let mut constraints = vec![Constraint::Length(description_height)];
    if !screen.rows.is_empty() {
        constraints.push(Constraint::Length(table_height));
    }
    constraints.push(Constraint::Min(5));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let description = if screen.description.is_empty() {
        "No description."
    } else {
        screen.description.as_str()
    };
    f.render_widget(
        Paragraph::new(description)
            .wrap(Wrap { trim: true })
            .style(theme.text_style.fg(crate::ui::theme::HTB_BLUE))
            .block(panel(format!(" Tool: {} ", screen.tool_name), theme, false)),
        rows[0],
    );

    if !screen.rows.is_empty() {
        let header =
            Row::new(["Name", "Type", "Required", "Description"]).style(theme.header_row_style);
        let body = screen.rows.iter().map(|row| {
            Row::new([
                Cell::from(row.name.clone()),
                Cell::from(row.kind.clone()),
                Cell::from(if row.required { "Yes" } else { "No" }),
                Cell::from(row.description.clone()),
            ])
        });
        let table = Table::new(
            body,
            [
                Constraint::Percentage(20),
                Constraint::Percentage(12),
                Constraint::Percentage(10),
                Constraint::Percentage(58),
            ],
        )
        .header(header)
        .block(panel(" Arguments ", theme, false));
        f.render_widget(table, rows[1]);
    }

    let editor_area = rows[rows.len() - 1];
    let title = if screen.executing {
        " Arguments (JSON) · executing... ".to_string()
    } else {
        " Arguments (JSON) · Ctrl+E execute ".to_string()
    };
    let block = panel(title, theme, !screen.executing);
    let inner = block.inner(editor_area);
    f.render_widget(block, editor_area);
    f.render_widget(&screen.editor, inner);
}

pub(crate) fn record_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Events => &["ID", "Name", "Status"],
        RecordKind::Challenges => &["ID", "Name", "Category", "Diff", "Pts", "Solved"],
        RecordKind::Teams => &["ID", "Name", "Captain"],
    }
}

pub(crate) fn record_row(kind: RecordKind, record: &Record) -> Vec<String> {
    let id = field(record, "id", "");
    match kind {
        RecordKind::Events => vec![id, record_name(record), field(record, "status", "Unknown")],
        RecordKind::Challenges => vec![
            id,
            record_name(record),
            field(record, "challenge_category_id", ""),
            field(record, "difficulty", ""),
            field(record, "points", ""),
            if truthy(record, "solved") { "Yes" } else { "No" }.to_string(),
        ],
        RecordKind::Teams => vec![
            id,
            record_name(record),
            field(record, "captain_id", "Unknown"),
        ],
    }
}

fn record_widths(kind: RecordKind) -> Vec<Constraint> {
    match kind {
        RecordKind::Events | RecordKind::Teams => vec![
            Constraint::Length(8),
            Constraint::Fill(3),
            Constraint::Fill(1),
        ],
        RecordKind::Challenges => vec![
            Constraint::Length(6),
            Constraint::Fill(3),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(6),
        ],
    }
}

/// Revealed Markdown, with a caret while the reveal is still running.
fn reveal_lines(view: &RevealView, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = render_markdown(view.visible(), theme);
    if !view.is_finished() {
        match lines.last_mut() {
            Some(line) => line.spans.push(Span::styled(REVEAL_CARET, theme.accent_style)),
            None => lines.push(Line::styled(REVEAL_CARET, theme.accent_style)),
        }
    }
    lines
}

fn draw_records(f: &mut Frame, screen: &RecordScreen, theme: &Theme, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let title = format!(" {} ", screen.title);
    if screen.records.is_empty() {
        f.render_widget(
            Paragraph::new("Nothing to select.").block(panel(title, theme, true)),
            columns[0],
        );
    } else {
        let header = Row::new(record_columns(screen.kind).iter().copied())
            .style(theme.header_row_style);
        let rows = screen
            .records
            .iter()
            .map(|record| Row::new(record_row(screen.kind, record)));
        let table = Table::new(rows, record_widths(screen.kind))
            .header(header)
            .block(panel(title, theme, true))
            .row_highlight_style(theme.selected_row_style);
        let mut state = TableState::default().with_selected(Some(screen.selected));
        f.render_stateful_widget(table, columns[0], &mut state);
    }

    f.render_widget(
        Paragraph::new(reveal_lines(&screen.details, theme))
            .wrap(Wrap { trim: false })
            .block(panel(
                format!(" {} Details ", screen.kind.singular()),
                theme,
                true,
            )),
        columns[1],
    );
}

fn draw_result(f: &mut Frame, screen: &ResultScreen, theme: &Theme, area: Rect) {
    f.render_widget(
        Paragraph::new(reveal_lines(&screen.view, theme))
            .wrap(Wrap { trim: false })
            .scroll((screen.scroll, 0))
            .block(panel(format!(" {} ", screen.title), theme, true)),
        area,
    );
}

fn draw_resource_input(f: &mut Frame, screen: &ResourceInputScreen, theme: &Theme, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(centered(area, 80));

    f.render_widget(
        Paragraph::new("Enter the URI of the resource to read.")
            .style(theme.text_style.fg(crate::ui::theme::HTB_BLUE))
            .alignment(Alignment::Center),
        rows[0],
    );
    let title = if screen.loading {
        " Resource URI · reading... "
    } else {
        " Resource URI · Enter read "
    };
    let block = panel(title, theme, !screen.loading);
    let inner = block.inner(rows[1]);
    f.render_widget(block, rows[1]);
    f.render_widget(&screen.editor, inner);
}

fn draw_play(f: &mut Frame, app: &App, screen: &PlayScreen, theme: &Theme, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let rows: Vec<Row> = app
        .selection
        .selected_challenge
        .iter()
        .map(|challenge| Row::new([field(challenge, "id", ""), record_name(challenge)]))
        .collect();
    let table = Table::new(rows, [Constraint::Length(8), Constraint::Fill(1)])
        .header(Row::new(["ID", "Name"]).style(theme.header_row_style))
        .block(panel(" Challenges ", theme, false))
        .row_highlight_style(theme.selected_row_style);
    let mut state = TableState::default().with_selected(Some(0));
    f.render_stateful_widget(table, columns[0], &mut state);

    let detail_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(columns[1]);
    f.render_widget(
        Paragraph::new(reveal_lines(&screen.view, theme))
            .wrap(Wrap { trim: false })
            .block(panel(
                format!(" Play Mode · {} ", app.selection.container_line()),
                theme,
                true,
            )),
        detail_rows[0],
    );
    let actions = Line::from(vec![
        Span::styled(" s ", theme.selected_row_style),
        Span::raw(" Start Container   "),
        Span::styled(" x ", theme.notice_style(crate::core::app::NoticeKind::Error)),
        Span::raw(" Stop Container   "),
        Span::styled(" d ", theme.title_style),
        Span::raw(" Download Files"),
    ]);
    f.render_widget(
        Paragraph::new(actions)
            .alignment(Alignment::Center)
            .block(panel("", theme, false)),
        detail_rows[1],
    );
}

fn draw_status(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let line = match app.notifications.back() {
        Some(notice) => Line::styled(format!(" {}", notice.message), theme.notice_style(notice.kind)),
        None => Line::styled(
            format!(" {} · {}", app.selection.summary(), app.selection.container_line()),
            theme.status_bar_style,
        ),
    };
    f.render_widget(Paragraph::new(line).style(theme.status_bar_style), area);
}

fn help_text(app: &App) -> &'static str {
    match app.current() {
        None => "↑/↓ move · Enter select · q quit",
        Some(Screen::Metadata(_)) => "↑/↓ move · Enter open · r refresh · Esc back",
        Some(Screen::ToolPicker(_)) => "type to filter · ↑/↓ move · Enter choose · Ctrl+R refresh · Esc back",
        Some(Screen::Wizard(_)) => "edit JSON · Ctrl+E execute · Esc back · Ctrl+C quit",
        Some(Screen::Records(_)) => "↑/↓ move · Enter select · Space skip · j save .json · m save .md · Esc back",
        Some(Screen::Result(_)) => "↑/↓ PgUp/PgDn scroll · Space/s skip · j save .json · m save .md · Esc back",
        Some(Screen::ResourceInput(_)) => "type URI · Enter read · Esc back",
        Some(Screen::Play(_)) => "s start · x stop · d download · Space skip · Esc back",
    }
}

fn draw_help(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    f.render_widget(
        Paragraph::new(Line::styled(format!(" {}", help_text(app)), theme.muted_style.fg(crate::ui::theme::HTB_TEXT)))
            .style(Style::default().bg(theme.background_color)),
        area,
    );
}
