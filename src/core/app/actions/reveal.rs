use tracing::{debug, warn};

use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::app::NoticeKind;

pub(super) fn handle_reveal_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Vec<AppCommand> {
    match action {
        AppAction::SkipReveal => {
            if let Some(view) = app.current().and_then(|screen| screen.reveal_view()) {
                view.skip();
            }
        }
        AppAction::RevealFrame { id, visible } => {
            // Frames from replaced views have no target and are dropped.
            if let Some(view) = app.reveal_view_mut(id) {
                view.apply_frame(visible);
            }
        }
        AppAction::RevealFinished { id, result } => match result {
            Ok(outcome) => {
                debug!(id, ?outcome, "reveal finished");
                if let Some(view) = app.reveal_view_mut(id) {
                    view.finish();
                }
            }
            Err(error) => {
                warn!(id, %error, "reveal failed");
                if let Some(view) = app.reveal_view_mut(id) {
                    view.finish_with_source();
                    app.notify(NoticeKind::Error, format!("Reveal failed: {error}"));
                }
            }
        },
        _ => {}
    }
    Vec::new()
}
