//! Full-screen terminal UI.
//!
//! - [`event_loop`]: input polling, action dispatch, background tasks.
//! - [`keybindings`]: per-screen key mapping.
//! - [`renderer`], [`markdown`] and [`theme`]: frame composition and styling.
//!
//! This layer presents and captures interaction state, while
//! [`crate::core`] owns the domain logic.

pub mod event_loop;
pub mod keybindings;
pub mod lifecycle;
pub mod markdown;
pub mod renderer;
pub mod theme;

pub use event_loop::run_tui;
