use chrono::Utc;

use crate::model::checklist::Checklist;
use crate::model::config::LockPolicy;
use crate::model::id::TaskId;
use crate::model::task::TaskNode;

/// Error type for tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("cannot move {node} into itself or one of its descendants")]
    Cycle { node: TaskId, target: TaskId },
    #[error("cannot mix live tasks and template content")]
    CrossForest,
    #[error("task is locked: {0}")]
    Locked(TaskId),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("task name cannot be empty")]
    EmptyName,
    #[error("a template's content root cannot be edited directly")]
    ContentRoot,
    #[error("not a live task: {0}")]
    NotLive(TaskId),
}

/// Where to insert a new task among its siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    /// Append after the last sibling
    Bottom,
    /// Prepend before the first sibling
    Top,
    /// Insert right after this sibling
    After(TaskId),
}

/// Result of a bulk clear
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Every removed id, descendants included
    pub removed: Vec<TaskId>,
    /// Locked nodes whose whole subtree was left alone
    pub skipped_locked: Vec<TaskId>,
    /// Completed nodes kept because a locked node sits below them
    pub kept_for_lock: Vec<TaskId>,
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn node(list: &Checklist, id: TaskId) -> Result<&TaskNode, TreeError> {
    list.get(id).ok_or(TreeError::NotFound(id))
}

/// Fails for ids that do not exist or name a template's content root
fn editable(list: &Checklist, id: TaskId) -> Result<&TaskNode, TreeError> {
    let n = node(list, id)?;
    if list.is_content_root(id) {
        return Err(TreeError::ContentRoot);
    }
    Ok(n)
}

fn check_parent(list: &Checklist, parent: Option<TaskId>) -> Result<bool, TreeError> {
    match parent {
        None => Ok(false),
        Some(pid) => Ok(node(list, pid)?.is_template_component),
    }
}

/// First child of `parent` named exactly `name`, by display order
pub fn child_named(list: &Checklist, parent: Option<TaskId>, name: &str) -> Option<TaskId> {
    list.children_of(parent)
        .iter()
        .copied()
        .find(|&id| list.get(id).is_some_and(|n| n.name == name))
}

/// Outcome of [`find_by_path`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch<'a> {
    /// Deepest matched node, or the starting root when nothing matched
    pub node: Option<TaskId>,
    /// Segments left after the first mismatch
    pub remaining: &'a [String],
}

impl PathMatch<'_> {
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Descend from `root` by exact, case-sensitive child names, stopping at the
/// first segment that has no match.
pub fn find_by_path<'a>(list: &Checklist, root: Option<TaskId>, segments: &'a [String]) -> PathMatch<'a> {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        match child_named(list, current, segment) {
            Some(child) => current = Some(child),
            None => {
                return PathMatch {
                    node: current,
                    remaining: &segments[i..],
                };
            }
        }
    }
    PathMatch {
        node: current,
        remaining: &[],
    }
}

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

/// Create a task under `parent` (`None` = live top level). The new node
/// inherits the parent's template flag.
pub fn insert_child(
    list: &mut Checklist,
    parent: Option<TaskId>,
    name: &str,
    position: InsertPosition,
) -> Result<TaskId, TreeError> {
    if name.is_empty() {
        return Err(TreeError::EmptyName);
    }
    let is_template = check_parent(list, parent)?;
    let mut task = TaskNode::new(name, is_template);
    let id = task.id;

    match position {
        InsertPosition::Bottom => {
            task.display_order = list.next_display_order(parent);
            let len = list.children_of(parent).len();
            list.attach(task, parent, len);
        }
        InsertPosition::Top => {
            list.attach(task, parent, 0);
            list.renumber(parent);
        }
        InsertPosition::After(sibling) => {
            let index = list
                .children_of(parent)
                .iter()
                .position(|&s| s == sibling)
                .ok_or_else(|| TreeError::InvalidPosition(format!("{} is not a sibling", sibling)))?;
            list.attach(task, parent, index + 1);
            list.renumber(parent);
        }
    }
    tracing::trace!(task = %id, "inserted task");
    Ok(id)
}

// ---------------------------------------------------------------------------
// Move / reorder
// ---------------------------------------------------------------------------

/// Move `id` under `new_parent`, before `before` (or last when `None`).
///
/// The target sibling group is renumbered densely. Nothing changes on error.
pub fn move_node(
    list: &mut Checklist,
    id: TaskId,
    new_parent: Option<TaskId>,
    before: Option<TaskId>,
) -> Result<(), TreeError> {
    let moving = editable(list, id)?;
    let moving_flag = moving.is_template_component;

    if let Some(target) = new_parent {
        node(list, target)?;
        if target == id || list.is_descendant_of(target, id) {
            return Err(TreeError::Cycle { node: id, target });
        }
    }
    if check_parent(list, new_parent)? != moving_flag {
        return Err(TreeError::CrossForest);
    }
    if let Some(b) = before
        && (b == id || !list.children_of(new_parent).contains(&b))
    {
        return Err(TreeError::InvalidPosition(format!(
            "{} is not a sibling in the target group",
            b
        )));
    }

    list.detach(id);
    let index = match before {
        Some(b) => list
            .children_of(new_parent)
            .iter()
            .position(|&s| s == b)
            .unwrap_or(usize::MAX),
        None => usize::MAX,
    };
    list.relink(id, new_parent, index);
    list.renumber(new_parent);
    Ok(())
}

/// Shift `id` by `offset` places within its sibling group (clamped)
pub fn reorder(list: &mut Checklist, id: TaskId, offset: isize) -> Result<(), TreeError> {
    let parent = editable(list, id)?.parent();
    let Some(index) = list.detach(id) else {
        return Err(TreeError::NotFound(id));
    };
    let len = list.children_of(parent).len() as isize;
    let target = (index as isize + offset).clamp(0, len) as usize;
    list.relink(id, parent, target);
    list.renumber(parent);
    Ok(())
}

// ---------------------------------------------------------------------------
// Duplicate
// ---------------------------------------------------------------------------

/// How a subtree copy treats the copied fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CopyOptions {
    pub template_component: bool,
    pub keep_completed: bool,
    pub keep_locked: bool,
    pub with_subtree: bool,
}

/// Deep-copy `source` under `parent` at `index` with fresh ids and creation
/// dates. The copy's top node gets `display_order`; descendants keep their
/// source order values. Returns the id of the copy.
pub(crate) fn copy_subtree(
    list: &mut Checklist,
    source: TaskId,
    parent: Option<TaskId>,
    index: usize,
    display_order: i64,
    options: CopyOptions,
) -> TaskId {
    let Some(src) = list.get(source).cloned() else {
        return source;
    };
    let mut copy = TaskNode::new(src.name.clone(), options.template_component);
    copy.is_completed = options.keep_completed && src.is_completed;
    copy.is_locked = options.keep_locked && src.is_locked;
    copy.tags = src.tags.clone();
    copy.display_order = display_order;
    copy.creation_date = Utc::now();
    let copy_id = copy.id;
    list.attach(copy, parent, index);

    if options.with_subtree {
        for (i, child) in src.subtasks().iter().enumerate() {
            let order = list.get(*child).map_or(i as i64, |c| c.display_order);
            copy_subtree(list, *child, Some(copy_id), i, order, options);
        }
    }
    copy_id
}

/// Copy a task (and optionally its subtree) right after the original
pub fn duplicate(list: &mut Checklist, id: TaskId, with_subtree: bool) -> Result<TaskId, TreeError> {
    let src = editable(list, id)?;
    let parent = src.parent();
    let options = CopyOptions {
        template_component: src.is_template_component,
        keep_completed: true,
        keep_locked: true,
        with_subtree,
    };
    let index = list
        .children_of(parent)
        .iter()
        .position(|&s| s == id)
        .ok_or(TreeError::NotFound(id))?;
    let copy = copy_subtree(list, id, parent, index + 1, 0, options);
    list.renumber(parent);
    Ok(copy)
}

// ---------------------------------------------------------------------------
// Delete / clear
// ---------------------------------------------------------------------------

/// First locked node among `id`, its ancestors and its descendants
fn locked_in_lineage(list: &Checklist, id: TaskId) -> Option<TaskId> {
    std::iter::once(id)
        .chain(list.ancestors(id))
        .chain(list.subtree(id).into_iter().skip(1))
        .find(|n| list.get(*n).is_some_and(|t| t.is_locked))
}

/// Delete `id` and its whole subtree. Returns the removed ids.
pub fn delete(list: &mut Checklist, id: TaskId, policy: LockPolicy) -> Result<Vec<TaskId>, TreeError> {
    editable(list, id)?;
    if policy == LockPolicy::Protect
        && let Some(locked) = locked_in_lineage(list, id)
    {
        return Err(TreeError::Locked(locked));
    }
    Ok(list.remove_subtree(id))
}

/// Remove completed, unlocked live tasks below `scope` (`None` = the whole
/// live list). A locked node is skipped together with its subtree; this is
/// reported in the result rather than as an error.
pub fn clear_completed(list: &mut Checklist, scope: Option<TaskId>) -> Result<ClearResult, TreeError> {
    let mut result = ClearResult::default();
    if let Some(scope_id) = scope {
        let scope_node = node(list, scope_id)?;
        if scope_node.is_template_component {
            return Err(TreeError::NotLive(scope_id));
        }
        let guarded = std::iter::once(scope_id)
            .chain(list.ancestors(scope_id))
            .find(|n| list.get(*n).is_some_and(|t| t.is_locked));
        if let Some(locked) = guarded {
            tracing::warn!(task = %locked, "clear skipped: scope is under a locked task");
            result.skipped_locked.push(locked);
            return Ok(result);
        }
    }
    let children = list.children_of(scope).to_vec();
    clear_group(list, children, &mut result);
    Ok(result)
}

fn clear_group(list: &mut Checklist, children: Vec<TaskId>, result: &mut ClearResult) {
    for id in children {
        let Some(task) = list.get(id) else { continue };
        if task.is_locked {
            tracing::debug!(task = %id, "clear skipped locked subtree");
            result.skipped_locked.push(id);
            continue;
        }
        if task.is_completed {
            let shelters_lock = list
                .subtree(id)
                .into_iter()
                .skip(1)
                .any(|n| list.get(n).is_some_and(|t| t.is_locked));
            if !shelters_lock {
                result.removed.extend(list.remove_subtree(id));
                continue;
            }
            result.kept_for_lock.push(id);
        }
        let grandchildren = list.children_of(Some(id)).to_vec();
        clear_group(list, grandchildren, result);
    }
}

// ---------------------------------------------------------------------------
// Field mutators
// ---------------------------------------------------------------------------

/// Flip completion. Returns the new state.
pub fn toggle_completed(list: &mut Checklist, id: TaskId) -> Result<bool, TreeError> {
    editable(list, id)?;
    let task = list.get_mut(id).ok_or(TreeError::NotFound(id))?;
    task.is_completed = !task.is_completed;
    Ok(task.is_completed)
}

pub fn set_completed(list: &mut Checklist, id: TaskId, completed: bool) -> Result<(), TreeError> {
    editable(list, id)?;
    let task = list.get_mut(id).ok_or(TreeError::NotFound(id))?;
    task.is_completed = completed;
    Ok(())
}

pub fn set_locked(list: &mut Checklist, id: TaskId, locked: bool) -> Result<(), TreeError> {
    editable(list, id)?;
    let task = list.get_mut(id).ok_or(TreeError::NotFound(id))?;
    task.is_locked = locked;
    Ok(())
}

pub fn rename(list: &mut Checklist, id: TaskId, name: &str) -> Result<(), TreeError> {
    if name.is_empty() {
        return Err(TreeError::EmptyName);
    }
    editable(list, id)?;
    let task = list.get_mut(id).ok_or(TreeError::NotFound(id))?;
    task.name = name.to_string();
    Ok(())
}
