use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::checklist::Checklist;
use crate::model::id::{TagId, TaskId, TemplateId};
use crate::model::tag::ColorKey;
use crate::ops::tag_ops::task_tag_phrases;

// ---------------------------------------------------------------------------
// External format
// ---------------------------------------------------------------------------

/// A task and its subtasks as written to an export file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
    /// Tag phrases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<ExportedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TemplateId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub roots: Vec<ExportedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TagId>,
    pub phrase: String,
    #[serde(default)]
    pub color: ColorKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
}

/// Combined backup file: live tasks, templates and tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub tasks: Vec<ExportedTask>,
    #[serde(default)]
    pub templates: Vec<ExportedTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ExportedTag>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Serialize one node and its subtree
pub fn export_task(list: &Checklist, id: TaskId) -> Option<ExportedTask> {
    let node = list.get(id)?;
    Some(ExportedTask {
        id: Some(node.id),
        name: node.name.clone(),
        is_completed: node.is_completed,
        creation_date: node.creation_date,
        display_order: Some(node.display_order),
        is_locked: Some(node.is_locked),
        tags: task_tag_phrases(list, id),
        subtasks: node
            .subtasks()
            .iter()
            .filter_map(|child| export_task(list, *child))
            .collect(),
    })
}

/// Live tasks in display order: the whole list, or just the subtree at
/// `scope`
pub fn export_tasks(list: &Checklist, scope: Option<TaskId>) -> Vec<ExportedTask> {
    match scope {
        None => list
            .roots()
            .iter()
            .filter_map(|id| export_task(list, *id))
            .collect(),
        Some(id) => export_task(list, id).into_iter().collect(),
    }
}

pub fn export_templates(list: &Checklist) -> Vec<ExportedTemplate> {
    list.templates()
        .iter()
        .map(|t| ExportedTemplate {
            id: Some(t.id),
            name: t.name.clone(),
            display_order: Some(t.display_order),
            roots: list
                .children_of(Some(t.root))
                .iter()
                .filter_map(|id| export_task(list, *id))
                .collect(),
        })
        .collect()
}

pub fn export_tags(list: &Checklist) -> Vec<ExportedTag> {
    list.tags()
        .iter()
        .map(|t| ExportedTag {
            id: Some(t.id),
            phrase: t.phrase.clone(),
            color: t.color,
            creation_date: Some(t.creation_date),
            display_order: Some(t.display_order),
        })
        .collect()
}

pub fn export_backup(list: &Checklist) -> Backup {
    Backup {
        tasks: export_tasks(list, None),
        templates: export_templates(list),
        tags: export_tags(list),
    }
}

/// Pretty JSON with object keys in sorted order
pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    // serde_json's default map is ordered by key
    let tree = serde_json::to_value(value)?;
    serde_json::to_string_pretty(&tree)
}
