use serde::Serialize;

use crate::io::state::UiState;
use crate::model::checklist::Checklist;
use crate::model::id::TaskId;
use crate::model::tag::Tag;
use crate::ops::complete::Completion;
use crate::ops::search::{MatchField, SearchHit};
use crate::ops::session::TaskView;
use crate::ops::tag_ops::task_tag_phrases;
use crate::ops::tree_ops::ClearResult;
use crate::parse::path::join_path;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: TaskId,
    pub name: String,
    pub path: String,
    pub completed: bool,
    pub locked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct CompletionJson {
    pub id: TaskId,
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub id: TaskId,
    pub path: String,
    pub field: &'static str,
    pub text: String,
}

#[derive(Serialize)]
pub struct TagJson {
    pub phrase: String,
    pub color: String,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct TemplateJson {
    pub name: String,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct ClearJson {
    pub removed: usize,
    pub skipped_locked: Vec<String>,
    pub kept_for_lock: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(list: &Checklist, id: TaskId) -> Option<TaskJson> {
    let node = list.get(id)?;
    Some(TaskJson {
        id,
        name: node.name.clone(),
        path: join_path(&list.path_of(id)),
        completed: node.is_completed,
        locked: node.is_locked,
        tags: task_tag_phrases(list, id),
        subtasks: node
            .subtasks()
            .iter()
            .filter_map(|child| task_to_json(list, *child))
            .collect(),
    })
}

pub fn completion_to_json(c: &Completion) -> CompletionJson {
    CompletionJson {
        id: c.id,
        name: c.name.clone(),
        path: c.path.clone(),
    }
}

pub fn hit_to_json(hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        id: hit.task,
        path: join_path(&hit.path),
        field: field_name(hit.field),
        text: hit.text.clone(),
    }
}

pub fn tag_to_json(list: &Checklist, tag: &Tag) -> TagJson {
    TagJson {
        phrase: tag.phrase.clone(),
        color: tag.color.to_string(),
        tasks: list.nodes().filter(|n| n.tags.contains(&tag.id)).count(),
    }
}

pub fn clear_to_json(list_before: &Checklist, result: &ClearResult) -> ClearJson {
    let paths = |ids: &[TaskId]| -> Vec<String> {
        ids.iter()
            .map(|id| join_path(&list_before.path_of(*id)))
            .collect()
    };
    ClearJson {
        removed: result.removed.len(),
        skipped_locked: paths(&result.skipped_locked),
        kept_for_lock: paths(&result.kept_for_lock),
    }
}

pub fn field_name(field: MatchField) -> &'static str {
    match field {
        MatchField::Name => "name",
        MatchField::Tag => "tag",
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn check_char(completed: bool) -> char {
    if completed { 'x' } else { ' ' }
}

fn tags_suffix(phrases: &[String]) -> String {
    if phrases.is_empty() {
        return String::new();
    }
    format!(
        " {}",
        phrases
            .iter()
            .map(|t| format!("#{}", t.replace(' ', "_")))
            .collect::<Vec<_>>()
            .join(" ")
    )
}

/// Format a single task as a one-line summary
pub fn format_task_line(list: &Checklist, id: TaskId) -> String {
    let Some(node) = list.get(id) else {
        return String::new();
    };
    let lock = if node.is_locked { " [locked]" } else { "" };
    format!(
        "[{}] {}{}{}",
        check_char(node.is_completed),
        node.name,
        lock,
        tags_suffix(&task_tag_phrases(list, id))
    )
}

/// Format the children of `parent` as an indented tree. Collapsed tasks show
/// a count of hidden descendants instead of their subtasks, unless `all`.
pub fn format_tree(list: &Checklist, parent: Option<TaskId>, state: &UiState, all: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for &child in list.children_of(parent) {
        push_tree(list, child, 0, state, all, &mut lines);
    }
    lines
}

fn push_tree(list: &Checklist, id: TaskId, depth: usize, state: &UiState, all: bool, lines: &mut Vec<String>) {
    let Some(node) = list.get(id) else {
        return;
    };
    let mut line = format!("{}{}", "  ".repeat(depth), format_task_line(list, id));
    let collapsed = !all && node.has_subtasks() && state.is_collapsed(id);
    if collapsed {
        let hidden = list.subtree(id).len() - 1;
        line.push_str(&format!(" (+{} hidden)", hidden));
    }
    if state.focused == Some(id) {
        line.push_str("  <");
    }
    lines.push(line);
    if !collapsed {
        for &child in node.subtasks() {
            push_tree(list, child, depth + 1, state, all, lines);
        }
    }
}

/// Format detailed task view
pub fn format_task_detail(view: &TaskView) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", check_char(view.is_completed), view.name)];
    lines.push(format!("path: {}", join_path(&view.path)));
    lines.push(format!("id: {}", view.id));
    lines.push(format!(
        "created: {}",
        view.creation_date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ));
    if view.is_locked {
        lines.push("locked: yes".to_string());
    }
    if view.is_template_component {
        lines.push("template content: yes".to_string());
    }
    if !view.tags.is_empty() {
        lines.push(format!("tags:{}", tags_suffix(&view.tags)));
    }
    if !view.subtasks.is_empty() {
        lines.push(format!("subtasks: {}", view.subtasks.len()));
    }
    lines
}

pub fn format_search_hit(hit: &SearchHit) -> String {
    match hit.field {
        MatchField::Name => join_path(&hit.path),
        MatchField::Tag => format!("{} (tag #{})", join_path(&hit.path), hit.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tag::ColorKey;
    use crate::ops::resolve::ingest;
    use crate::ops::tag_ops::{create_tag, tag_task};
    use crate::ops::tree_ops::{set_completed, set_locked};
    use insta::assert_snapshot;

    fn sample() -> (Checklist, UiState) {
        let mut list = Checklist::new();
        let report = ingest(&mut list, None, "/Work/Report").unwrap().leaf;
        ingest(&mut list, None, "/Work/Email").unwrap();
        let milk = ingest(&mut list, None, "/Home/Groceries/Milk").unwrap().leaf;
        ingest(&mut list, None, "/Home/Groceries/Bread").unwrap();
        set_completed(&mut list, report, true).unwrap();
        set_locked(&mut list, report, true).unwrap();
        let tag = create_tag(&mut list, "next week", ColorKey::Green).unwrap();
        tag_task(&mut list, milk, tag).unwrap();

        let mut state = UiState::default();
        state.focused = Some(milk);
        (list, state)
    }

    #[test]
    fn tree_rendering() {
        let (list, state) = sample();
        let output = format_tree(&list, None, &state, false).join("\n");
        assert_snapshot!(output, @r"
        [ ] Work
          [x] Report [locked]
          [ ] Email
        [ ] Home
          [ ] Groceries
            [ ] Milk #next_week  <
            [ ] Bread
        ");
    }

    #[test]
    fn collapsed_tree_hides_descendants() {
        let (list, mut state) = sample();
        let home = list.roots()[1];
        state.set_collapsed(home, true);
        let output = format_tree(&list, None, &state, false).join("\n");
        assert_snapshot!(output, @r"
        [ ] Work
          [x] Report [locked]
          [ ] Email
        [ ] Home (+3 hidden)
        ");
        assert_eq!(format_tree(&list, None, &state, true).len(), 7);
    }

    #[test]
    fn task_json_nests_subtasks() {
        let (list, _) = sample();
        let json = task_to_json(&list, list.roots()[1]).unwrap();
        assert_eq!(json.path, "/Home");
        assert_eq!(json.subtasks[0].subtasks[0].path, "/Home/Groceries/Milk");
        assert_eq!(json.subtasks[0].subtasks[0].tags, vec!["next week"]);
    }
}
