use crate::model::checklist::Checklist;
use crate::model::id::{TaskId, TemplateId};
use crate::model::task::TaskNode;
use crate::model::template::Template;
use crate::ops::tree_ops::{self, CopyOptions, TreeError};

/// Error type for template operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),
    #[error("template already exists: {0}")]
    AlreadyExists(String),
    #[error("template name cannot be empty")]
    EmptyName,
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result of applying a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Every live node created by the merge, top-down per copied subtree
    pub created: Vec<TaskId>,
    /// Template nodes that matched an existing live task by name
    pub matched: usize,
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

pub fn find_template<'a>(list: &'a Checklist, name: &str) -> Option<&'a Template> {
    list.templates().iter().find(|t| t.name == name)
}

fn template(list: &Checklist, id: TemplateId) -> Result<&Template, TemplateError> {
    list.template(id)
        .ok_or_else(|| TemplateError::NotFound(id.to_string()))
}

/// The content root a template's tasks hang from; use it as a resolver anchor
/// to edit template content.
pub fn content_root(list: &Checklist, id: TemplateId) -> Result<TaskId, TemplateError> {
    Ok(template(list, id)?.root)
}

/// Visible top-level tasks of a template, in display order
pub fn template_tasks(list: &Checklist, id: TemplateId) -> &[TaskId] {
    match list.template(id) {
        Some(t) => list.children_of(Some(t.root)),
        None => &[],
    }
}

// ---------------------------------------------------------------------------
// Template CRUD
// ---------------------------------------------------------------------------

/// Create an empty template
pub fn create_template(list: &mut Checklist, name: &str) -> Result<TemplateId, TemplateError> {
    if name.trim().is_empty() {
        return Err(TemplateError::EmptyName);
    }
    if find_template(list, name).is_some() {
        return Err(TemplateError::AlreadyExists(name.to_string()));
    }

    let container = TaskNode::new("", true);
    let root = container.id;
    list.attach_content_root(container);

    let display_order = list
        .templates()
        .iter()
        .map(|t| t.display_order)
        .max()
        .map_or(0, |max| max + 1);
    let id = TemplateId::new();
    list.templates_mut().push(Template {
        id,
        name: name.to_string(),
        display_order,
        root,
    });
    tracing::debug!(template = name, "created template");
    Ok(id)
}

/// Create a template whose content is a copy of the given live subtrees.
/// Copies start uncompleted and unlocked.
pub fn create_template_from(list: &mut Checklist, name: &str, sources: &[TaskId]) -> Result<TemplateId, TemplateError> {
    for &source in sources {
        let task = list.get(source).ok_or(TreeError::NotFound(source))?;
        if task.is_template_component {
            return Err(TreeError::NotLive(source).into());
        }
    }
    let id = create_template(list, name)?;
    let root = content_root(list, id)?;
    let options = CopyOptions {
        template_component: true,
        keep_completed: false,
        keep_locked: false,
        with_subtree: true,
    };
    for &source in sources {
        let order = list.next_display_order(Some(root));
        let len = list.children_of(Some(root)).len();
        tree_ops::copy_subtree(list, source, Some(root), len, order, options);
    }
    Ok(id)
}

pub fn rename_template(list: &mut Checklist, id: TemplateId, name: &str) -> Result<(), TemplateError> {
    if name.trim().is_empty() {
        return Err(TemplateError::EmptyName);
    }
    if find_template(list, name).is_some_and(|t| t.id != id) {
        return Err(TemplateError::AlreadyExists(name.to_string()));
    }
    let entry = list
        .templates_mut()
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
    entry.name = name.to_string();
    Ok(())
}

/// Delete a template and all of its content. Returns the removed task ids.
pub fn delete_template(list: &mut Checklist, id: TemplateId) -> Result<Vec<TaskId>, TemplateError> {
    let root = content_root(list, id)?;
    list.templates_mut().retain(|t| t.id != id);
    Ok(list.remove_subtree(root))
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Overlay a template onto the live children of `target` (`None` = the live
/// top level).
///
/// Each template task is matched by exact name against the first same-named
/// live child; matches recurse, misses are deep-copied (fresh ids,
/// uncompleted, unlocked) and appended. Existing tasks are never removed or
/// reordered, so applying the same template twice adds nothing the second
/// time.
pub fn apply_template(list: &mut Checklist, id: TemplateId, target: Option<TaskId>) -> Result<MergeResult, TemplateError> {
    let root = content_root(list, id)?;
    if let Some(target_id) = target {
        let task = list.get(target_id).ok_or(TreeError::NotFound(target_id))?;
        if task.is_template_component {
            return Err(TreeError::NotLive(target_id).into());
        }
    }

    let mut result = MergeResult::default();
    merge_children(list, root, target, &mut result);
    tracing::info!(
        created = result.created.len(),
        matched = result.matched,
        "template applied"
    );
    Ok(result)
}

fn merge_children(list: &mut Checklist, from: TaskId, into: Option<TaskId>, result: &mut MergeResult) {
    let options = CopyOptions {
        template_component: false,
        keep_completed: false,
        keep_locked: false,
        with_subtree: true,
    };
    let template_children = list.children_of(Some(from)).to_vec();
    for template_child in template_children {
        let Some(name) = list.get(template_child).map(|n| n.name.clone()) else {
            continue;
        };
        match tree_ops::child_named(list, into, &name) {
            Some(existing) => {
                result.matched += 1;
                merge_children(list, template_child, Some(existing), result);
            }
            None => {
                let order = list.next_display_order(into);
                let len = list.children_of(into).len();
                let copy = tree_ops::copy_subtree(list, template_child, into, len, order, options);
                result.created.extend(list.subtree(copy));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::resolve::ingest;
    use crate::ops::tree_ops::set_completed;
    use pretty_assertions::assert_eq;

    fn names(list: &Checklist, parent: Option<TaskId>) -> Vec<String> {
        list.children_of(parent)
            .iter()
            .map(|id| list.get(*id).unwrap().name.clone())
            .collect()
    }

    fn packing_template(list: &mut Checklist) -> TemplateId {
        let id = create_template(list, "Packing").unwrap();
        let root = content_root(list, id).unwrap();
        ingest(list, Some(root), "Clothes/Socks").unwrap();
        ingest(list, Some(root), "Clothes/Shirts").unwrap();
        ingest(list, Some(root), "Documents/Passport").unwrap();
        id
    }

    #[test]
    fn template_content_is_flagged_and_hidden() {
        let mut list = Checklist::new();
        let id = packing_template(&mut list);
        assert!(list.roots().is_empty());
        assert_eq!(template_tasks(&list, id).len(), 2);
        assert!(list.nodes().all(|n| n.is_template_component));
        assert!(list.invariant_violations().is_empty());
    }

    #[test]
    fn apply_copies_into_empty_list() {
        let mut list = Checklist::new();
        let id = packing_template(&mut list);
        let result = apply_template(&mut list, id, None).unwrap();

        assert_eq!(result.created.len(), 5);
        assert_eq!(result.matched, 0);
        assert_eq!(names(&list, None), vec!["Clothes", "Documents"]);
        let clothes = list.roots()[0];
        assert_eq!(names(&list, Some(clothes)), vec!["Socks", "Shirts"]);
        for created in &result.created {
            let node = list.get(*created).unwrap();
            assert!(!node.is_template_component);
            assert!(!node.is_completed);
        }
        assert!(list.invariant_violations().is_empty());
    }

    #[test]
    fn apply_merges_by_name_without_disturbing_existing() {
        let mut list = Checklist::new();
        let mine = ingest(&mut list, None, "/Clothes/Hat").unwrap().leaf;
        set_completed(&mut list, mine, true).unwrap();
        let id = packing_template(&mut list);

        let result = apply_template(&mut list, id, None).unwrap();
        assert_eq!(result.matched, 1);
        let clothes = list.roots()[0];
        assert_eq!(names(&list, Some(clothes)), vec!["Hat", "Socks", "Shirts"]);
        assert!(list.get(mine).unwrap().is_completed);
        assert_eq!(names(&list, None), vec!["Clothes", "Documents"]);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut list = Checklist::new();
        let id = packing_template(&mut list);
        apply_template(&mut list, id, None).unwrap();
        let once = list.clone();

        let again = apply_template(&mut list, id, None).unwrap();
        assert!(again.created.is_empty());
        assert_eq!(list, once);
    }

    #[test]
    fn template_completion_is_not_copied() {
        let mut list = Checklist::new();
        let id = create_template(&mut list, "t").unwrap();
        let root = content_root(&list, id).unwrap();
        let inner = ingest(&mut list, Some(root), "done already").unwrap().leaf;
        set_completed(&mut list, inner, true).unwrap();

        let result = apply_template(&mut list, id, None).unwrap();
        assert!(!list.get(result.created[0]).unwrap().is_completed);
    }

    #[test]
    fn duplicate_template_siblings_merge_into_first_match() {
        let mut list = Checklist::new();
        let id = create_template(&mut list, "t").unwrap();
        let root = content_root(&list, id).unwrap();
        let first = ingest(&mut list, Some(root), "Same/a").unwrap().leaf;
        let first_parent = list.get(first).unwrap().parent().unwrap();
        tree_ops::duplicate(&mut list, first_parent, false).unwrap();
        let second_parent = list.children_of(Some(root))[1];
        ingest(&mut list, Some(second_parent), "b").unwrap();

        apply_template(&mut list, id, None).unwrap();
        assert_eq!(names(&list, None), vec!["Same"]);
        let same = list.roots()[0];
        assert_eq!(names(&list, Some(same)), vec!["a", "b"]);
    }

    #[test]
    fn apply_under_a_live_target() {
        let mut list = Checklist::new();
        let trip = ingest(&mut list, None, "/Trip").unwrap().leaf;
        let id = packing_template(&mut list);
        apply_template(&mut list, id, Some(trip)).unwrap();
        assert_eq!(names(&list, Some(trip)), vec!["Clothes", "Documents"]);
    }

    #[test]
    fn apply_into_template_content_is_rejected() {
        let mut list = Checklist::new();
        let id = packing_template(&mut list);
        let inner = template_tasks(&list, id)[0];
        assert_eq!(
            apply_template(&mut list, id, Some(inner)),
            Err(TemplateError::Tree(TreeError::NotLive(inner)))
        );
    }

    #[test]
    fn create_from_live_tasks_copies_subtrees() {
        let mut list = Checklist::new();
        let leaf = ingest(&mut list, None, "/Morning/Coffee").unwrap().leaf;
        set_completed(&mut list, leaf, true).unwrap();
        let morning = list.roots()[0];

        let id = create_template_from(&mut list, "Routine", &[morning]).unwrap();
        let top = template_tasks(&list, id);
        assert_eq!(top.len(), 1);
        let copy = top[0];
        assert_ne!(copy, morning);
        let coffee = list.children_of(Some(copy))[0];
        assert!(list.get(coffee).unwrap().is_template_component);
        assert!(!list.get(coffee).unwrap().is_completed);
        assert_eq!(list.roots(), &[morning]);
    }

    #[test]
    fn names_are_unique_and_non_empty() {
        let mut list = Checklist::new();
        let a = create_template(&mut list, "a").unwrap();
        create_template(&mut list, "b").unwrap();
        assert_eq!(
            create_template(&mut list, "a"),
            Err(TemplateError::AlreadyExists("a".into()))
        );
        assert_eq!(create_template(&mut list, " "), Err(TemplateError::EmptyName));
        assert_eq!(
            rename_template(&mut list, a, "b"),
            Err(TemplateError::AlreadyExists("b".into()))
        );
        rename_template(&mut list, a, "c").unwrap();
        assert!(find_template(&list, "c").is_some());
    }

    #[test]
    fn delete_removes_content() {
        let mut list = Checklist::new();
        let id = packing_template(&mut list);
        let removed = delete_template(&mut list, id).unwrap();
        assert_eq!(removed.len(), 6);
        assert!(list.is_empty());
        assert!(list.templates().is_empty());
    }
}
