pub mod app;
pub mod cache;
pub mod config;
pub mod export;
pub mod format;
pub mod records;
pub mod reveal;
pub mod selection;
pub mod template;
