use crate::model::checklist::Checklist;
use crate::model::config::CompleteConfig;
use crate::model::id::TaskId;
use crate::ops::tree_ops;
use crate::parse::path::{self, PathError};

/// One suggestion for partially typed path input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: TaskId,
    pub name: String,
    /// Full replacement text for the input, relative to the anchor
    pub path: String,
}

/// Suggest children of the node reached by the fully typed segments whose
/// names start with the trailing partial text. Nothing is created; if the
/// typed segments do not all exist there are no suggestions.
pub fn complete(
    list: &Checklist,
    anchor: Option<TaskId>,
    input: &str,
    config: &CompleteConfig,
) -> Result<Vec<Completion>, PathError> {
    let typed = path::split_partial(input)?;
    let found = tree_ops::find_by_path(list, anchor, &typed.complete);
    if !found.is_complete() {
        return Ok(Vec::new());
    }

    let wanted = fold(&typed.partial, config.case_sensitive);
    let mut out = Vec::new();
    for &child in list.children_of(found.node) {
        if out.len() >= config.limit {
            break;
        }
        let Some(node) = list.get(child) else {
            continue;
        };
        if !fold(&node.name, config.case_sensitive).starts_with(&wanted) {
            continue;
        }
        let mut segments = typed.complete.clone();
        segments.push(node.name.clone());
        out.push(Completion {
            id: child,
            name: node.name.clone(),
            path: path::join_path(&segments),
        });
    }
    Ok(out)
}

fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}
