use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::checklist::Checklist;
use crate::model::id::TaskId;

const STATE_FILE: &str = "state.json";

/// Persisted view state (written to state.json): which task has focus and
/// which tasks are collapsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UiState {
    /// Task to focus; usually the leaf of the last ingested path
    #[serde(default)]
    pub focused: Option<TaskId>,
    /// Tasks whose subtasks are hidden
    #[serde(default)]
    pub collapsed: BTreeSet<TaskId>,
    /// Last search pattern
    #[serde(default)]
    pub last_search: Option<String>,
}

impl UiState {
    pub fn is_collapsed(&self, id: TaskId) -> bool {
        self.collapsed.contains(&id)
    }

    /// Collapse or expand a task
    pub fn set_collapsed(&mut self, id: TaskId, collapsed: bool) {
        if collapsed {
            self.collapsed.insert(id);
        } else {
            self.collapsed.remove(&id);
        }
    }

    /// Expand every ancestor of `id` so it is visible, and focus it
    pub fn reveal(&mut self, list: &Checklist, id: TaskId) {
        for ancestor in list.ancestors(id) {
            self.collapsed.remove(&ancestor);
        }
        self.focused = Some(id);
    }

    /// Forget tasks that no longer exist
    pub fn prune(&mut self, list: &Checklist) {
        self.collapsed.retain(|id| list.contains(*id));
        if self.focused.is_some_and(|id| !list.contains(id)) {
            self.focused = None;
        }
    }
}

/// Read state.json from the data directory
pub fn read_ui_state(data_dir: &Path) -> Option<UiState> {
    let path = data_dir.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable state.json");
            None
        }
    }
}

/// Write state.json to the data directory
pub fn write_ui_state(data_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let path = data_dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::resolve::ingest;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let id = TaskId::new();
        let mut state = UiState {
            focused: Some(id),
            last_search: Some("pattern".into()),
            ..Default::default()
        };
        state.set_collapsed(id, true);

        write_ui_state(dir.path(), &state).unwrap();
        let loaded = read_ui_state(dir.path()).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_collapsed(id));
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn serde_defaults_on_empty_object() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert!(state.focused.is_none());
        assert!(state.collapsed.is_empty());
    }

    #[test]
    fn reveal_expands_ancestors_and_prune_drops_missing() {
        let mut list = Checklist::new();
        let leaf = ingest(&mut list, None, "/a/b/c").unwrap().leaf;
        let a = list.roots()[0];
        let mut state = UiState::default();
        state.set_collapsed(a, true);
        state.set_collapsed(TaskId::new(), true);

        state.reveal(&list, leaf);
        assert!(!state.is_collapsed(a));
        assert_eq!(state.focused, Some(leaf));

        state.prune(&list);
        assert!(state.collapsed.is_empty());
    }
}
