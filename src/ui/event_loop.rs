//! Event polling, dispatching, and UI rendering loop.
//!
//! The loop owns the [`App`] outright. Terminal input is read on a separate
//! task, mapped to actions, and applied together with the results that
//! background tasks send back through the [`AppActionDispatcher`]. Commands
//! produced by those actions are turned into new tasks here.

use std::{
    error::Error,
    sync::Arc,
    time::{Duration, Instant},
};

use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::app::{
    apply_actions, App, AppAction, AppActionContext, AppActionDispatcher, AppActionEnvelope,
    AppCommand, AppSettings, RevealRequest,
};
use crate::core::cache::{MetadataCache, MetadataKind, RemoteError};
use crate::core::config::Settings;
use crate::core::records::McpRecord;
use crate::core::reveal::{drive, RenderError, RevealSession};
use crate::core::selection::SelectionState;
use crate::mcp::{list_records, McpBackend};
use crate::ui::keybindings::{actions_for_key, paste_actions};
use crate::ui::lifecycle::{restore_terminal, setup_terminal, AppTerminal};
use crate::ui::renderer::ui;
use crate::ui::theme::Theme;

const MAX_FPS: u64 = 60;

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

fn spawn_metadata_refresh(
    cache: MetadataCache<McpRecord>,
    backend: Arc<dyn McpBackend>,
    dispatcher: AppActionDispatcher,
    kind: MetadataKind,
    force: bool,
    ctx: AppActionContext,
) {
    tokio::spawn(async move {
        let fetch = move || async move {
            list_records(backend.as_ref(), kind)
                .await
                .map_err(RemoteError::new)
        };
        let result = if force {
            cache.refresh(kind, fetch).await
        } else {
            cache.get_or_refresh(kind, fetch).await
        };

        let action = match result {
            Ok(entry) => AppAction::MetadataLoaded {
                kind,
                count: entry.items.len(),
                forced: force,
            },
            Err(err) => AppAction::MetadataFailed {
                kind,
                error: err.to_string(),
            },
        };
        dispatcher.dispatch_many([action], ctx);
    });
}

fn spawn_tool_call(
    backend: Arc<dyn McpBackend>,
    dispatcher: AppActionDispatcher,
    name: String,
    arguments: serde_json::Map<String, serde_json::Value>,
    ctx: AppActionContext,
) {
    tokio::spawn(async move {
        info!(tool = %name, "calling tool");
        let result = backend
            .call_tool(&name, arguments)
            .await
            .map_err(|err| err.to_string());
        dispatcher.dispatch_many([AppAction::ToolCompleted { name, result }], ctx);
    });
}

fn spawn_resource_read(
    backend: Arc<dyn McpBackend>,
    dispatcher: AppActionDispatcher,
    uri: String,
    ctx: AppActionContext,
) {
    tokio::spawn(async move {
        info!(%uri, "reading resource");
        let result = backend
            .read_resource(&uri)
            .await
            .map_err(|err| err.to_string());
        dispatcher.dispatch_many([AppAction::ResourceRead { uri, result }], ctx);
    });
}

fn spawn_reveal(dispatcher: AppActionDispatcher, request: RevealRequest, ctx: AppActionContext) {
    tokio::spawn(async move {
        let RevealRequest {
            id,
            text,
            pace,
            skip,
        } = request;

        let result = match RevealSession::start(text, pace) {
            Ok(mut session) => {
                let frames = dispatcher.clone();
                let mut sink = move |visible: &str| {
                    let delivered = frames.dispatch(
                        AppAction::RevealFrame {
                            id,
                            visible: visible.to_string(),
                        },
                        ctx,
                    );
                    if delivered {
                        Ok(())
                    } else {
                        Err(RenderError("event loop closed".to_string()))
                    }
                };
                drive(&mut session, &mut sink, &skip).await
            }
            Err(err) => Err(err),
        };

        debug!(id, ok = result.is_ok(), "reveal task done");
        dispatcher.dispatch_many(
            [AppAction::RevealFinished {
                id,
                result: result.map_err(|err| err.to_string()),
            }],
            ctx,
        );
    });
}

fn run_commands(
    app: &App,
    backend: &Arc<dyn McpBackend>,
    dispatcher: &AppActionDispatcher,
    commands: Vec<AppCommand>,
    ctx: AppActionContext,
) {
    for cmd in commands {
        match cmd {
            AppCommand::RefreshMetadata { kind, force } => spawn_metadata_refresh(
                app.cache.clone(),
                Arc::clone(backend),
                dispatcher.clone(),
                kind,
                force,
                ctx,
            ),
            AppCommand::CallTool { name, arguments } => {
                spawn_tool_call(Arc::clone(backend), dispatcher.clone(), name, arguments, ctx)
            }
            AppCommand::ReadResource { uri } => {
                spawn_resource_read(Arc::clone(backend), dispatcher.clone(), uri, ctx)
            }
            AppCommand::Reveal(request) => spawn_reveal(dispatcher.clone(), request, ctx),
        }
    }
}

/// Keys are applied one at a time so each maps against the screen the
/// previous key left behind.
fn process_ui_events(
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    backend: &Arc<dyn McpBackend>,
    dispatcher: &AppActionDispatcher,
    ctx: AppActionContext,
) -> bool {
    let mut events_processed = false;
    while let Ok(ev) = event_rx.try_recv() {
        events_processed = true;
        let actions = match ev {
            UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                actions_for_key(app, key)
            }
            UiEvent::Crossterm(Event::Paste(text)) => paste_actions(app, &text),
            UiEvent::Crossterm(_) => Vec::new(),
        };
        let envelopes = actions.into_iter().map(|action| AppActionEnvelope {
            action,
            context: ctx,
        });
        let commands = apply_actions(app, envelopes);
        run_commands(app, backend, dispatcher, commands, ctx);
        if app.should_quit {
            break;
        }
    }
    events_processed
}

fn drain_action_queue(
    app: &mut App,
    backend: &Arc<dyn McpBackend>,
    dispatcher: &AppActionDispatcher,
    action_rx: &mut mpsc::UnboundedReceiver<AppActionEnvelope>,
    ctx: AppActionContext,
) -> bool {
    let mut pending = Vec::new();
    while let Ok(envelope) = action_rx.try_recv() {
        pending.push(envelope);
    }

    if pending.is_empty() {
        return false;
    }

    let commands = apply_actions(app, pending);
    run_commands(app, backend, dispatcher, commands, ctx);
    true
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        continue;
                    }
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

fn current_context(terminal: &AppTerminal) -> AppActionContext {
    let size = terminal.size().unwrap_or_default();
    AppActionContext {
        term_width: size.width,
        term_height: size.height,
    }
}

pub async fn run_tui(
    settings: Settings,
    backend: Arc<dyn McpBackend>,
) -> Result<(), Box<dyn Error>> {
    let selection = SelectionState::load_or_default(&settings.state_file);
    let cache = MetadataCache::new(settings.cache_ttl);
    let mut app = App::new(AppSettings::from(&settings), selection, cache);
    let theme = Theme::htb();

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppActionEnvelope>();
    let dispatcher = AppActionDispatcher::new(action_tx);

    // Tool schemas feed the wizard and the play page.
    spawn_metadata_refresh(
        app.cache.clone(),
        Arc::clone(&backend),
        dispatcher.clone(),
        MetadataKind::Tools,
        false,
        AppActionContext::default(),
    );

    let mut terminal = setup_terminal()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let event_reader_handle = spawn_event_reader(event_tx);

    let frame_duration = Duration::from_millis(1000 / MAX_FPS);
    let mut last_draw = Instant::now() - frame_duration;
    let mut request_redraw = true;

    let result: Result<(), Box<dyn Error>> = loop {
        if app.should_quit {
            break Ok(());
        }

        if request_redraw && last_draw.elapsed() >= frame_duration {
            if let Err(err) = terminal.draw(|f| ui(f, &app, &theme)) {
                break Err(err.into());
            }
            last_draw = Instant::now();
            request_redraw = false;
        }

        let ctx = current_context(&terminal);
        let events_processed =
            process_ui_events(&mut app, &mut event_rx, &backend, &dispatcher, ctx);
        let actions_applied =
            drain_action_queue(&mut app, &backend, &dispatcher, &mut action_rx, ctx);
        let notices_expired = app.prune_notifications(Instant::now());

        if events_processed || actions_applied || notices_expired {
            request_redraw = true;
        }

        if !events_processed && !actions_applied {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    };

    event_reader_handle.abort();
    restore_terminal(&mut terminal)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reveal::{PaceConfig, RevealOutcome};
    use crate::utils::test_utils::FakeBackend;
    use serde_json::Map;
    use tokio_util::sync::CancellationToken;

    fn channel() -> (AppActionDispatcher, mpsc::UnboundedReceiver<AppActionEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AppActionDispatcher::new(tx), rx)
    }

    #[tokio::test]
    async fn metadata_refresh_reports_counts_and_failures() {
        let backend = Arc::new(FakeBackend::default());
        let cache = MetadataCache::new(Duration::from_secs(60));
        let (dispatcher, mut rx) = channel();

        spawn_metadata_refresh(
            cache.clone(),
            backend.clone(),
            dispatcher.clone(),
            MetadataKind::Tools,
            false,
            AppActionContext::default(),
        );
        let envelope = rx.recv().await.expect("loaded");
        assert!(matches!(
            envelope.action,
            AppAction::MetadataLoaded {
                kind: MetadataKind::Tools,
                count: 1,
                forced: false
            }
        ));
        assert_eq!(cache.get(MetadataKind::Tools).items.len(), 1);

        // A fresh entry is served without another fetch.
        spawn_metadata_refresh(
            cache.clone(),
            backend.clone(),
            dispatcher.clone(),
            MetadataKind::Tools,
            false,
            AppActionContext::default(),
        );
        rx.recv().await.expect("cached");
        assert_eq!(backend.tool_lists(), 1);

        spawn_metadata_refresh(
            cache,
            backend,
            dispatcher,
            MetadataKind::Resources,
            true,
            AppActionContext::default(),
        );
        match rx.recv().await.expect("failed").action {
            AppAction::MetadataFailed { kind, error } => {
                assert_eq!(kind, MetadataKind::Resources);
                assert!(error.contains("resources unavailable"));
            }
            _ => panic!("expected a failure"),
        }
    }

    #[tokio::test]
    async fn tool_calls_and_resource_reads_come_back_as_actions() {
        let backend: Arc<dyn McpBackend> = Arc::new(FakeBackend::default());
        let (dispatcher, mut rx) = channel();

        spawn_tool_call(
            backend.clone(),
            dispatcher.clone(),
            "retrieve_ctf".to_string(),
            Map::new(),
            AppActionContext::default(),
        );
        match rx.recv().await.expect("tool").action {
            AppAction::ToolCompleted { name, result } => {
                assert_eq!(name, "retrieve_ctf");
                let value = result.expect("ok");
                assert_eq!(value["content"][0]["text"], "called retrieve_ctf with {}");
            }
            _ => panic!("expected a tool result"),
        }

        spawn_resource_read(
            backend,
            dispatcher,
            "htb://missing".to_string(),
            AppActionContext::default(),
        );
        match rx.recv().await.expect("resource").action {
            AppAction::ResourceRead { uri, result } => {
                assert_eq!(uri, "htb://missing");
                assert!(result.is_err());
            }
            _ => panic!("expected a resource result"),
        }
    }

    #[tokio::test]
    async fn skipped_reveal_sends_full_text_then_finishes() {
        let (dispatcher, mut rx) = channel();
        let skip = CancellationToken::new();
        skip.cancel();

        spawn_reveal(
            dispatcher,
            RevealRequest {
                id: 9,
                text: "Flag captured.".to_string(),
                pace: PaceConfig::default(),
                skip,
            },
            AppActionContext::default(),
        );

        let mut last_frame = None;
        loop {
            match rx.recv().await.expect("action").action {
                AppAction::RevealFrame { id, visible } => {
                    assert_eq!(id, 9);
                    last_frame = Some(visible);
                }
                AppAction::RevealFinished { id, result } => {
                    assert_eq!(id, 9);
                    assert_eq!(result, Ok(RevealOutcome::Skipped));
                    break;
                }
                _ => panic!("unexpected action"),
            }
        }
        assert_eq!(last_frame.as_deref(), Some("Flag captured."));
    }
}
