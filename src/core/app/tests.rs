use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tui_textarea::{Input, Key, TextArea};

use super::*;
use crate::core::reveal::RevealOutcome;

fn test_app(dir: &TempDir, animate: bool) -> App {
    let settings = AppSettings {
        server_url: "http://127.0.0.1:1/mcp".to_string(),
        pace: PaceConfig::default(),
        animate,
        state_file: dir.path().join("state.json"),
        output_dir: dir.path().join("out"),
    };
    App::new(
        settings,
        SelectionState::default(),
        MetadataCache::new(Duration::from_secs(300)),
    )
}

fn apply(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    actions::apply_action(app, action, AppActionContext::default())
}

fn text_result(payload: Value) -> Value {
    json!({"content": [{"type": "text", "text": payload.to_string()}], "isError": false})
}

fn tool(value: Value) -> McpRecord {
    McpRecord::Tool(serde_json::from_value(value).expect("tool"))
}

async fn seed_tools(app: &App, tools: Vec<McpRecord>) {
    app.cache
        .refresh(MetadataKind::Tools, move || async move { Ok(tools) })
        .await
        .expect("seed tools");
}

#[test]
fn play_is_disabled_until_everything_is_selected() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    assert!(!app.is_menu_item_enabled(MenuItem::Play));

    let commands = apply(&mut app, AppAction::Activate);
    assert!(commands.is_empty());
    assert!(app.current().is_none());
    assert_eq!(app.notifications.back().map(|n| n.kind), Some(NoticeKind::Warning));
}

#[test]
fn opening_a_stale_list_requests_a_refresh() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.menu_selected = 1;

    let commands = apply(&mut app, AppAction::Activate);
    assert!(matches!(
        commands.as_slice(),
        [AppCommand::RefreshMetadata {
            kind: MetadataKind::Tools,
            force: false
        }]
    ));
    assert!(matches!(app.current(), Some(Screen::Metadata(list)) if list.loading));

    apply(
        &mut app,
        AppAction::MetadataLoaded {
            kind: MetadataKind::Tools,
            count: 0,
            forced: false,
        },
    );
    assert!(matches!(app.current(), Some(Screen::Metadata(list)) if !list.loading));

    let commands = apply(&mut app, AppAction::Refresh);
    assert!(matches!(
        commands.as_slice(),
        [AppCommand::RefreshMetadata { force: true, .. }]
    ));
}

#[tokio::test]
async fn fresh_lists_open_without_fetching() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    seed_tools(&app, vec![tool(json!({"name": "list_ctf_events", "inputSchema": {"type": "object"}}))]).await;

    let commands = app.open_metadata(MetadataKind::Tools);
    assert!(commands.is_empty());
    assert!(matches!(app.current(), Some(Screen::Metadata(list)) if !list.loading));
}

#[test]
fn refresh_metadata_menu_item_forces_every_kind() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.menu_selected = 6;

    let commands = apply(&mut app, AppAction::Activate);
    let kinds: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            AppCommand::RefreshMetadata { kind, force: true } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, MetadataKind::ALL.to_vec());
}

#[test]
fn event_results_become_a_selectable_list() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    let result = text_result(json!([
        {"id": 1, "name": "Cyber Apocalypse", "status": "live"},
        {"id": 2, "name": "University CTF", "status": "ended"}
    ]));

    apply(
        &mut app,
        AppAction::ToolCompleted {
            name: "list_ctf_events".to_string(),
            result: Ok(result),
        },
    );
    let Some(Screen::Records(screen)) = app.current() else {
        panic!("expected record screen");
    };
    assert_eq!(screen.records.len(), 2);
    assert!(screen.details.visible().contains("Cyber Apocalypse"));

    apply(&mut app, AppAction::MoveDown);
    let Some(Screen::Records(screen)) = app.current() else {
        panic!("expected record screen");
    };
    assert_eq!(screen.selected, 1);
    assert!(screen.details.visible().contains("University CTF"));

    apply(&mut app, AppAction::Activate);
    assert!(app.current().is_none());
    let selected = app.selection.selected_event.as_ref().expect("event selected");
    assert_eq!(selected.get("id"), Some(&json!(2)));

    let saved = SelectionState::load(&app.settings.state_file).expect("saved state");
    assert_eq!(saved.selected_event, app.selection.selected_event);
}

#[test]
fn retrieve_ctf_caches_challenges() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    let result = text_result(json!({"challenges": [{"id": 7, "name": "Flag Casino"}]}));

    apply(
        &mut app,
        AppAction::ToolCompleted {
            name: "retrieve_ctf".to_string(),
            result: Ok(result),
        },
    );
    assert_eq!(app.selection.challenges_cache, vec![json!({"id": 7, "name": "Flag Casino"})]);
    assert!(matches!(
        app.current(),
        Some(Screen::Records(screen)) if screen.kind == RecordKind::Challenges
    ));
}

#[test]
fn container_start_and_stop_update_status() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);

    apply(
        &mut app,
        AppAction::ToolCompleted {
            name: "start_container".to_string(),
            result: Ok(text_result(json!({"ip": "10.10.10.5", "port": 31337}))),
        },
    );
    assert_eq!(app.selection.container_line(), "ACTIVE CONTAINER: 10.10.10.5:31337");
    assert!(matches!(app.current(), Some(Screen::Result(_))));

    apply(
        &mut app,
        AppAction::ToolCompleted {
            name: "stop_container".to_string(),
            result: Ok(text_result(json!({"message": "stopped"}))),
        },
    );
    assert!(app.selection.container_status.is_none());
}

#[test]
fn failed_calls_notify_and_release_the_wizard() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    let commands = app.open_wizard(
        "retrieve_my_teams".to_string(),
        String::new(),
        json!({"type": "object"}),
        Map::new(),
    );
    assert!(commands.is_empty());

    let commands = apply(&mut app, AppAction::Execute);
    assert!(matches!(commands.as_slice(), [AppCommand::CallTool { name, .. }] if name == "retrieve_my_teams"));
    assert!(app.busy.is_some());

    apply(
        &mut app,
        AppAction::ToolCompleted {
            name: "retrieve_my_teams".to_string(),
            result: Err("HTTP error: 401 Unauthorized".to_string()),
        },
    );
    assert!(app.busy.is_none());
    assert!(matches!(app.current(), Some(Screen::Wizard(wizard)) if !wizard.executing));
    let notice = app.notifications.back().expect("notice");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(notice.message.contains("401"));
}

#[test]
fn wizard_rejects_invalid_json() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.open_wizard(
        "start_container".to_string(),
        String::new(),
        json!({"type": "object"}),
        Map::new(),
    );
    if let Some(Screen::Wizard(wizard)) = app.current_mut() {
        wizard.editor = TextArea::new(vec!["{ \"challenge_id\": ".to_string()]);
    }

    assert!(apply(&mut app, AppAction::Execute).is_empty());
    assert_eq!(
        app.notifications.back().map(|n| n.message.as_str()),
        Some("Invalid JSON arguments")
    );

    if let Some(Screen::Wizard(wizard)) = app.current_mut() {
        wizard.editor = TextArea::new(vec!["[1, 2]".to_string()]);
    }
    assert!(apply(&mut app, AppAction::Execute).is_empty());
    assert!(app.busy.is_none());
}

#[test]
fn wizard_prefills_from_selection_and_auto_executes_event_listing() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.selection.selected_event =
        serde_json::from_value(json!({"id": "42", "name": "Cyber Apocalypse"})).ok();

    let schema = json!({
        "type": "object",
        "properties": {"ctf_id": {"type": "integer"}},
        "required": ["ctf_id"]
    });
    app.open_wizard("retrieve_ctf".to_string(), String::new(), schema, Map::new());
    let Some(Screen::Wizard(wizard)) = app.current() else {
        panic!("expected wizard");
    };
    let args: Value = serde_json::from_str(&wizard.editor_text()).expect("template json");
    assert_eq!(args, json!({"ctf_id": 42}));
    assert_eq!(wizard.rows.len(), 1);

    let commands = app.open_wizard(
        "list_ctf_events".to_string(),
        String::new(),
        json!({"type": "object"}),
        Map::new(),
    );
    assert!(matches!(commands.as_slice(), [AppCommand::CallTool { name, .. }] if name == "list_ctf_events"));
}

#[tokio::test]
async fn play_actions_prefill_the_challenge_id() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    seed_tools(
        &app,
        vec![tool(json!({
            "name": "start_container",
            "description": "Start the challenge container",
            "inputSchema": {"type": "object", "properties": {"challenge_id": {"type": "integer"}}}
        }))],
    )
    .await;
    app.selection.selected_event = serde_json::from_value(json!({"id": 1, "name": "E"})).ok();
    app.selection.selected_team = serde_json::from_value(json!({"id": 2, "name": "T"})).ok();
    app.selection.selected_challenge = serde_json::from_value(json!({"id": 99, "name": "C"})).ok();

    assert!(app.open_play().is_empty());
    apply(&mut app, AppAction::PlayStartContainer);
    let Some(Screen::Wizard(wizard)) = app.current() else {
        panic!("expected wizard");
    };
    assert_eq!(wizard.description, "Start the challenge container");
    let args: Value = serde_json::from_str(&wizard.editor_text()).expect("json");
    assert_eq!(args, json!({"challenge_id": 99}));

    app.pop();
    apply(&mut app, AppAction::PlayStopContainer);
    let Some(Screen::Wizard(wizard)) = app.current() else {
        panic!("expected wizard");
    };
    assert_eq!(wizard.tool_name, "stop_container");
    assert_eq!(wizard.editor_text(), "{}");
}

#[test]
fn reveal_frames_reach_only_their_view() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, true);

    let commands = app.open_result(
        "Tool Result: demo".to_string(),
        "demo",
        Value::Null,
        "Hello, **world**.".to_string(),
    );
    let [AppCommand::Reveal(request)] = commands.as_slice() else {
        panic!("expected reveal command");
    };
    let id = request.id;
    let skip = request.skip.clone();

    apply(
        &mut app,
        AppAction::RevealFrame {
            id,
            visible: "Hello,".to_string(),
        },
    );
    apply(
        &mut app,
        AppAction::RevealFrame {
            id: id + 100,
            visible: "stray".to_string(),
        },
    );
    let view = app.current().and_then(Screen::reveal_view).expect("view");
    assert_eq!(view.visible(), "Hello,");
    assert!(!view.is_finished());

    apply(&mut app, AppAction::SkipReveal);
    assert!(skip.is_cancelled());

    apply(
        &mut app,
        AppAction::RevealFrame {
            id,
            visible: "Hello, **world**.".to_string(),
        },
    );
    apply(
        &mut app,
        AppAction::RevealFinished {
            id,
            result: Ok(RevealOutcome::Skipped),
        },
    );
    let view = app.current().and_then(Screen::reveal_view).expect("view");
    assert!(view.is_finished());
    assert_eq!(view.visible(), "Hello, **world**.");
}

#[test]
fn leaving_a_screen_stops_its_reveal() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, true);
    let commands = app.open_tool_result("demo", text_result(json!({"a": 1})));
    let [AppCommand::Reveal(request)] = commands.as_slice() else {
        panic!("expected reveal command");
    };
    assert!(!request.skip.is_cancelled());

    apply(&mut app, AppAction::Back);
    assert!(request.skip.is_cancelled());
}

#[test]
fn failed_reveal_shows_the_whole_text() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, true);
    let commands = app.open_tool_result("demo", text_result(json!({"a": 1})));
    let [AppCommand::Reveal(request)] = commands.as_slice() else {
        panic!("expected reveal command");
    };
    let id = request.id;

    apply(
        &mut app,
        AppAction::RevealFinished {
            id,
            result: Err("renderer rejected update: closed".to_string()),
        },
    );
    let view = app.current().and_then(Screen::reveal_view).expect("view");
    assert_eq!(view.visible(), view.source());
    assert_eq!(app.notifications.back().map(|n| n.kind), Some(NoticeKind::Error));
}

#[test]
fn exports_write_into_the_output_directory() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.open_tool_result("retrieve_my_teams", text_result(json!({"name": "0xFF"})));

    apply(&mut app, AppAction::ExportJson);
    apply(&mut app, AppAction::ExportMarkdown);

    let mut names: Vec<String> = std::fs::read_dir(dir.path().join("out"))
        .expect("output dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("retrieve_my_teams-") && names[0].ends_with(".json"));
    assert!(names[1].ends_with(".md"));
}

#[test]
fn resource_input_requires_a_uri() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.menu_selected = 5;
    apply(&mut app, AppAction::Activate);
    assert!(matches!(app.current(), Some(Screen::ResourceInput(_))));

    assert!(apply(&mut app, AppAction::Activate).is_empty());
    assert_eq!(app.notifications.back().map(|n| n.kind), Some(NoticeKind::Warning));

    for ch in "htb://events".chars() {
        apply(
            &mut app,
            AppAction::EditorInput(Input {
                key: Key::Char(ch),
                ..Input::default()
            }),
        );
    }
    let commands = apply(&mut app, AppAction::Activate);
    assert!(matches!(commands.as_slice(), [AppCommand::ReadResource { uri }] if uri == "htb://events"));

    apply(
        &mut app,
        AppAction::ResourceRead {
            uri: "htb://events".to_string(),
            result: Ok(json!({"contents": [{"uri": "htb://events", "text": "ok"}]})),
        },
    );
    assert!(matches!(app.current(), Some(Screen::Result(screen)) if screen.title == "Resource: htb://events"));
}

#[tokio::test]
async fn tool_picker_filters_by_name() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    seed_tools(
        &app,
        vec![
            tool(json!({"name": "list_ctf_events", "inputSchema": {"type": "object"}})),
            tool(json!({"name": "start_container", "inputSchema": {"type": "object"}})),
        ],
    )
    .await;

    assert!(app.open_tool_picker().is_empty());
    for ch in "cont".chars() {
        apply(&mut app, AppAction::FilterChar(ch));
    }
    apply(&mut app, AppAction::Activate);
    assert!(matches!(app.current(), Some(Screen::Wizard(wizard)) if wizard.tool_name == "start_container"));
}

#[test]
fn notifications_expire() {
    let dir = TempDir::new().expect("tempdir");
    let mut app = test_app(&dir, false);
    app.notify(NoticeKind::Info, "hello");
    assert!(!app.prune_notifications(Instant::now()));
    assert!(app.prune_notifications(Instant::now() + NOTIFICATION_TTL + Duration::from_millis(1)));
    assert!(app.notifications.is_empty());
}

#[test]
fn freshness_hint_reads_naturally() {
    assert_eq!(freshness_hint(None, true, false), "not loaded");
    assert_eq!(freshness_hint(Some(Duration::from_secs(2)), false, false), "cached just now");
    assert_eq!(freshness_hint(Some(Duration::from_secs(130)), false, false), "cached 2m ago");
    assert_eq!(
        freshness_hint(Some(Duration::from_secs(400)), true, false),
        "cached 6m ago, stale"
    );
    assert_eq!(freshness_hint(None, true, true), "refreshing...");
}
