//! The chosen event, team and challenge, persisted between runs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::records::{record_name, ContainerStatus, Record, RecordKind};

pub const STATE_FILE_NAME: &str = "htb_mcp_state.json";

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Failed to read selection state at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse selection state at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write selection state at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionState {
    pub selected_event: Option<Record>,
    pub selected_team: Option<Record>,
    pub selected_challenge: Option<Record>,
    pub challenges_cache: Vec<Value>,
    pub container_status: Option<ContainerStatus>,
}

impl SelectionState {
    pub fn load(path: &Path) -> Result<Self, SelectionError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| SelectionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SelectionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`SelectionState::load`], but an unreadable file means starting
    /// with nothing selected.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "ignoring saved selection state");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SelectionError> {
        let write_err = |source| SelectionError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(|source| SelectionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .map_err(write_err)?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file
            .persist(path)
            .map_err(|err| write_err(err.error))?;
        debug!(path = %path.display(), "selection state saved");
        Ok(())
    }

    pub fn get(&self, kind: RecordKind) -> Option<&Record> {
        match kind {
            RecordKind::Events => self.selected_event.as_ref(),
            RecordKind::Challenges => self.selected_challenge.as_ref(),
            RecordKind::Teams => self.selected_team.as_ref(),
        }
    }

    pub fn select(&mut self, kind: RecordKind, record: Record) {
        let slot = match kind {
            RecordKind::Events => &mut self.selected_event,
            RecordKind::Challenges => &mut self.selected_challenge,
            RecordKind::Teams => &mut self.selected_team,
        };
        *slot = Some(record);
    }

    pub fn can_play(&self) -> bool {
        self.selected_event.is_some()
            && self.selected_team.is_some()
            && self.selected_challenge.is_some()
    }

    /// `Event: … | Team: … | Challenge: …` line for the main menu.
    pub fn summary(&self) -> String {
        let name = |record: Option<&Record>| {
            record
                .map(record_name)
                .unwrap_or_else(|| "None".to_string())
        };
        format!(
            "Event: {} | Team: {} | Challenge: {}",
            name(self.selected_event.as_ref()),
            name(self.selected_team.as_ref()),
            name(self.selected_challenge.as_ref())
        )
    }

    pub fn container_line(&self) -> String {
        match &self.container_status {
            Some(status) => format!("ACTIVE CONTAINER: {}", status.address()),
            None => "No Active Container".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).expect("record")
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = TempDir::new().expect("tempdir");
        let state = SelectionState::load(&dir.path().join(STATE_FILE_NAME)).expect("load");
        assert_eq!(state, SelectionState::default());
        assert!(!state.can_play());
        assert_eq!(state.summary(), "Event: None | Team: None | Challenge: None");
        assert_eq!(state.container_line(), "No Active Container");
    }

    #[test]
    fn state_round_trips_through_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join(STATE_FILE_NAME);

        let mut state = SelectionState::default();
        state.select(RecordKind::Events, record(json!({"id": 1, "name": "Cyber Apocalypse"})));
        state.select(RecordKind::Teams, record(json!({"id": 2, "name": "h4x"})));
        state.select(RecordKind::Challenges, record(json!({"id": 3, "name": "Void"})));
        state.container_status = Some(ContainerStatus {
            ip: "10.10.10.10".into(),
            port: "1337".into(),
        });
        state.save(&path).expect("save");

        let loaded = SelectionState::load(&path).expect("load");
        assert_eq!(loaded, state);
        assert!(loaded.can_play());
        assert_eq!(
            loaded.summary(),
            "Event: Cyber Apocalypse | Team: h4x | Challenge: Void"
        );
        assert_eq!(loaded.container_line(), "ACTIVE CONTAINER: 10.10.10.10:1337");
    }

    #[test]
    fn partial_files_fill_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join(STATE_FILE_NAME);
        fs::write(&path, r#"{"selected_event": {"id": 5}, "container_status": null}"#)
            .expect("write");

        let state = SelectionState::load(&path).expect("load");
        assert_eq!(
            state.get(RecordKind::Events).and_then(|e| e.get("id")),
            Some(&json!(5))
        );
        assert!(state.selected_team.is_none());
        assert!(state.challenges_cache.is_empty());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join(STATE_FILE_NAME);
        fs::write(&path, "{not json").expect("write");

        assert!(matches!(
            SelectionState::load(&path),
            Err(SelectionError::Parse { .. })
        ));
        assert_eq!(
            SelectionState::load_or_default(&path),
            SelectionState::default()
        );
    }

    #[test]
    fn save_into_unwritable_location_reports_error() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file").expect("write");

        let err = SelectionState::default()
            .save(&blocker.join(STATE_FILE_NAME))
            .expect_err("parent is a file");
        assert!(matches!(err, SelectionError::Write { .. }));
    }
}
