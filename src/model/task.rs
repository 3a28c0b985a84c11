use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{TagId, TaskId};

/// A single checklist entry.
///
/// `parent` and `subtasks` are only changed by the arena in
/// [`Checklist`](super::checklist::Checklist), which keeps the two in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    /// Display text
    pub name: String,
    pub is_completed: bool,
    /// Set once at creation
    pub creation_date: DateTime<Utc>,
    /// Sibling-scoped sort key
    pub display_order: i64,
    /// True for nodes that belong to a template's content forest
    pub is_template_component: bool,
    /// Protects this node and its subtree from bulk clear
    pub is_locked: bool,
    /// Associated tags (non-owning)
    pub tags: Vec<TagId>,
    pub(crate) parent: Option<TaskId>,
    pub(crate) subtasks: Vec<TaskId>,
}

impl TaskNode {
    /// Create a detached node with a fresh id and the current time
    pub fn new(name: impl Into<String>, is_template_component: bool) -> Self {
        TaskNode {
            id: TaskId::new(),
            name: name.into(),
            is_completed: false,
            creation_date: Utc::now(),
            display_order: 0,
            is_template_component,
            is_locked: false,
            tags: Vec::new(),
            parent: None,
            subtasks: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    /// Children in display order
    pub fn subtasks(&self) -> &[TaskId] {
        &self.subtasks
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

/// Flat persisted form of a task node. The child list is not stored; it is
/// rebuilt from `parent` links when a checklist is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    pub is_completed: bool,
    pub creation_date: DateTime<Utc>,
    pub display_order: i64,
    pub is_template_component: bool,
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
}

impl From<&TaskNode> for TaskRecord {
    fn from(node: &TaskNode) -> Self {
        TaskRecord {
            id: node.id,
            name: node.name.clone(),
            is_completed: node.is_completed,
            creation_date: node.creation_date,
            display_order: node.display_order,
            is_template_component: node.is_template_component,
            is_locked: node.is_locked,
            tags: node.tags.clone(),
            parent: node.parent,
        }
    }
}

impl From<TaskRecord> for TaskNode {
    fn from(record: TaskRecord) -> Self {
        TaskNode {
            id: record.id,
            name: record.name,
            is_completed: record.is_completed,
            creation_date: record.creation_date,
            display_order: record.display_order,
            is_template_component: record.is_template_component,
            is_locked: record.is_locked,
            tags: record.tags,
            parent: record.parent,
            subtasks: Vec::new(),
        }
    }
}
