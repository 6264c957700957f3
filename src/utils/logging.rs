//! Process-wide `tracing` subscriber.
//!
//! The TUI owns stdout and stderr while it runs, so it only logs when a file
//! is given. Plain subcommands log to stderr.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "HTBMCP_LOG";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
    Disabled,
}

impl LogTarget {
    pub fn resolve(log_file: Option<&Path>, interactive: bool) -> Self {
        match log_file {
            Some(path) => LogTarget::File(path.to_path_buf()),
            None if interactive => LogTarget::Disabled,
            None => LogTarget::Stderr,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_logging(target: &LogTarget) -> Result<(), Box<dyn Error>> {
    match target {
        LogTarget::Disabled => Ok(()),
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| err as Box<dyn Error>),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|err| err as Box<dyn Error>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tui_logs_only_to_an_explicit_file() {
        assert_eq!(LogTarget::resolve(None, true), LogTarget::Disabled);
        assert_eq!(LogTarget::resolve(None, false), LogTarget::Stderr);
        assert_eq!(
            LogTarget::resolve(Some(Path::new("htb.log")), true),
            LogTarget::File(PathBuf::from("htb.log"))
        );
    }

    #[test]
    fn disabled_target_installs_nothing() {
        assert!(init_logging(&LogTarget::Disabled).is_ok());
    }
}
