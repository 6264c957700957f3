//! Key to action mapping. The result depends on the screen on top of the
//! stack, so text-capturing screens see plain characters as input rather
//! than as shortcuts.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::{Input, Key};

use crate::core::app::{App, AppAction, Screen};

pub fn actions_for_key(app: &App, key: KeyEvent) -> Vec<AppAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return vec![AppAction::Quit];
    }
    if key.code == KeyCode::Esc {
        return vec![AppAction::Back];
    }
    if let Some(action) = movement(key.code) {
        return vec![action];
    }

    let action = match app.current() {
        None => match key.code {
            KeyCode::Enter => Some(AppAction::Activate),
            KeyCode::Char('q') => Some(AppAction::Quit),
            KeyCode::Char('k') => Some(AppAction::MoveUp),
            KeyCode::Char('j') => Some(AppAction::MoveDown),
            _ => None,
        },
        Some(Screen::Metadata(_)) => match key.code {
            KeyCode::Enter => Some(AppAction::Activate),
            KeyCode::Char('r') => Some(AppAction::Refresh),
            KeyCode::Char('q') => Some(AppAction::Back),
            KeyCode::Char('k') => Some(AppAction::MoveUp),
            KeyCode::Char('j') => Some(AppAction::MoveDown),
            _ => None,
        },
        Some(Screen::ToolPicker(_)) => match key.code {
            KeyCode::Enter => Some(AppAction::Activate),
            KeyCode::Char('r') if ctrl => Some(AppAction::Refresh),
            KeyCode::Backspace => Some(AppAction::FilterBackspace),
            KeyCode::Char(ch) if !ctrl => Some(AppAction::FilterChar(ch)),
            _ => None,
        },
        Some(Screen::Wizard(_)) => {
            if ctrl && key.code == KeyCode::Char('e') {
                Some(AppAction::Execute)
            } else {
                Some(AppAction::EditorInput(Input::from(key)))
            }
        }
        Some(Screen::ResourceInput(_)) => match key.code {
            KeyCode::Enter => Some(AppAction::Activate),
            _ => Some(AppAction::EditorInput(Input::from(key))),
        },
        Some(Screen::Records(_)) => match key.code {
            KeyCode::Enter => Some(AppAction::Activate),
            KeyCode::Char(' ') => Some(AppAction::SkipReveal),
            KeyCode::Char('j') => Some(AppAction::ExportJson),
            KeyCode::Char('m') => Some(AppAction::ExportMarkdown),
            KeyCode::Char('q') => Some(AppAction::Back),
            _ => None,
        },
        Some(Screen::Result(_)) => match key.code {
            KeyCode::Char(' ') | KeyCode::Char('s') => Some(AppAction::SkipReveal),
            KeyCode::Char('j') => Some(AppAction::ExportJson),
            KeyCode::Char('m') => Some(AppAction::ExportMarkdown),
            KeyCode::Char('q') => Some(AppAction::Back),
            _ => None,
        },
        Some(Screen::Play(_)) => match key.code {
            KeyCode::Char(' ') => Some(AppAction::SkipReveal),
            KeyCode::Char('s') => Some(AppAction::PlayStartContainer),
            KeyCode::Char('x') => Some(AppAction::PlayStopContainer),
            KeyCode::Char('d') => Some(AppAction::PlayDownload),
            KeyCode::Char('q') => Some(AppAction::Back),
            _ => None,
        },
    };
    action.into_iter().collect()
}

/// Bracketed paste, replayed as typed input on screens that take text.
pub fn paste_actions(app: &App, text: &str) -> Vec<AppAction> {
    let typed = |ch: char| {
        let key = if ch == '\n' { Key::Enter } else { Key::Char(ch) };
        AppAction::EditorInput(Input {
            key,
            ..Input::default()
        })
    };
    let text = text.replace("\r\n", "\n");
    match app.current() {
        Some(Screen::Wizard(_)) => text.chars().map(typed).collect(),
        Some(Screen::ResourceInput(_)) => text
            .chars()
            .filter(|ch| !ch.is_control())
            .map(typed)
            .collect(),
        Some(Screen::ToolPicker(_)) => text
            .chars()
            .filter(|ch| !ch.is_control())
            .map(AppAction::FilterChar)
            .collect(),
        _ => Vec::new(),
    }
}

fn movement(code: KeyCode) -> Option<AppAction> {
    match code {
        KeyCode::Up => Some(AppAction::MoveUp),
        KeyCode::Down => Some(AppAction::MoveDown),
        KeyCode::PageUp => Some(AppAction::PageUp),
        KeyCode::PageDown => Some(AppAction::PageDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{AppSettings, PlayScreen, ResourceInputScreen, RevealView};
    use crate::core::cache::MetadataCache;
    use crate::core::reveal::PaceConfig;
    use crate::core::selection::SelectionState;
    use std::path::PathBuf;
    use std::time::Duration;

    fn app() -> App {
        App::new(
            AppSettings {
                server_url: "https://mcp.example".to_string(),
                pace: PaceConfig::default(),
                animate: false,
                state_file: PathBuf::from("unused.json"),
                output_dir: PathBuf::from("unused"),
            },
            SelectionState::default(),
            MetadataCache::new(Duration::from_secs(60)),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let mut app = app();
        assert!(matches!(actions_for_key(&app, ctrl('c'))[..], [AppAction::Quit]));
        app.push(Screen::ResourceInput(ResourceInputScreen::default()));
        assert!(matches!(actions_for_key(&app, ctrl('c'))[..], [AppAction::Quit]));
    }

    #[test]
    fn q_quits_the_menu_but_types_into_editors() {
        let mut app = app();
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('q')))[..],
            [AppAction::Quit]
        ));
        app.push(Screen::ResourceInput(ResourceInputScreen::default()));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('q')))[..],
            [AppAction::EditorInput(_)]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Enter))[..],
            [AppAction::Activate]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Esc))[..],
            [AppAction::Back]
        ));
    }

    #[test]
    fn tool_picker_filters_on_characters() {
        let mut app = app();
        app.open_tool_picker();
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('r')))[..],
            [AppAction::FilterChar('r')]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Backspace))[..],
            [AppAction::FilterBackspace]
        ));
        assert!(matches!(actions_for_key(&app, ctrl('r'))[..], [AppAction::Refresh]));
    }

    #[test]
    fn wizard_executes_on_ctrl_e() {
        let mut app = app();
        app.open_wizard(
            "retrieve_ctf".to_string(),
            "Fetch a CTF".to_string(),
            serde_json::json!({"type": "object"}),
            serde_json::Map::new(),
        );
        assert!(matches!(actions_for_key(&app, ctrl('e'))[..], [AppAction::Execute]));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Enter))[..],
            [AppAction::EditorInput(_)]
        ));
    }

    #[test]
    fn paste_drops_newlines_from_single_line_input() {
        let mut app = app();
        assert!(paste_actions(&app, "htb://x").is_empty());
        app.push(Screen::ResourceInput(ResourceInputScreen::default()));
        let actions = paste_actions(&app, "ab\r\n");
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            &actions[0],
            AppAction::EditorInput(Input { key: Key::Char('a'), .. })
        ));
    }

    #[test]
    fn play_keys_map_to_container_actions() {
        let mut app = app();
        app.push(Screen::Play(PlayScreen {
            view: RevealView::instant(1, "Play".to_string()),
        }));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('s')))[..],
            [AppAction::PlayStartContainer]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('x')))[..],
            [AppAction::PlayStopContainer]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char('d')))[..],
            [AppAction::PlayDownload]
        ));
        assert!(matches!(
            actions_for_key(&app, key(KeyCode::Char(' ')))[..],
            [AppAction::SkipReveal]
        ));
    }
}
