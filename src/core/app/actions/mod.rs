mod navigation;
mod records;
mod remote;
mod reveal;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::App;
use crate::core::cache::MetadataKind;
use crate::core::reveal::{PaceConfig, RevealOutcome};

pub enum AppAction {
    Quit,
    Back,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Activate,
    Refresh,
    SkipReveal,
    ExportJson,
    ExportMarkdown,
    Execute,
    EditorInput(tui_textarea::Input),
    FilterChar(char),
    FilterBackspace,
    PlayStartContainer,
    PlayStopContainer,
    PlayDownload,
    MetadataLoaded {
        kind: MetadataKind,
        count: usize,
        forced: bool,
    },
    MetadataFailed {
        kind: MetadataKind,
        error: String,
    },
    ToolCompleted {
        name: String,
        result: Result<Value, String>,
    },
    ResourceRead {
        uri: String,
        result: Result<Value, String>,
    },
    RevealFrame {
        id: u64,
        visible: String,
    },
    RevealFinished {
        id: u64,
        result: Result<RevealOutcome, String>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppActionContext {
    pub term_width: u16,
    pub term_height: u16,
}

pub struct AppActionEnvelope {
    pub action: AppAction,
    pub context: AppActionContext,
}

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppActionEnvelope>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppActionEnvelope>) -> Self {
        Self { tx }
    }

    /// Sends one action. Returns `false` once the event loop is gone.
    pub fn dispatch(&self, action: AppAction, ctx: AppActionContext) -> bool {
        self.tx
            .send(AppActionEnvelope {
                action,
                context: ctx,
            })
            .is_ok()
    }

    pub fn dispatch_many<I>(&self, actions: I, ctx: AppActionContext)
    where
        I: IntoIterator<Item = AppAction>,
    {
        for action in actions.into_iter() {
            let _ = self.dispatch(action, ctx);
        }
    }
}

/// Everything a reveal task needs to drive one view.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub id: u64,
    pub text: String,
    pub pace: PaceConfig,
    pub skip: CancellationToken,
}

pub enum AppCommand {
    RefreshMetadata { kind: MetadataKind, force: bool },
    CallTool { name: String, arguments: Map<String, Value> },
    ReadResource { uri: String },
    Reveal(RevealRequest),
}

pub fn apply_actions(
    app: &mut App,
    envelopes: impl IntoIterator<Item = AppActionEnvelope>,
) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for envelope in envelopes {
        commands.extend(apply_action(app, envelope.action, envelope.context));
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction, ctx: AppActionContext) -> Vec<AppCommand> {
    match action {
        AppAction::Quit
        | AppAction::Back
        | AppAction::MoveUp
        | AppAction::MoveDown
        | AppAction::PageUp
        | AppAction::PageDown
        | AppAction::Activate
        | AppAction::Refresh
        | AppAction::Execute
        | AppAction::EditorInput(_)
        | AppAction::FilterChar(_)
        | AppAction::FilterBackspace
        | AppAction::PlayStartContainer
        | AppAction::PlayStopContainer
        | AppAction::PlayDownload => navigation::handle_navigation_action(app, action, ctx),

        AppAction::ExportJson | AppAction::ExportMarkdown => {
            records::handle_export_action(app, action, ctx)
        }

        AppAction::MetadataLoaded { .. }
        | AppAction::MetadataFailed { .. }
        | AppAction::ToolCompleted { .. }
        | AppAction::ResourceRead { .. } => remote::handle_remote_action(app, action, ctx),

        AppAction::SkipReveal | AppAction::RevealFrame { .. } | AppAction::RevealFinished { .. } => {
            reveal::handle_reveal_action(app, action, ctx)
        }
    }
}
