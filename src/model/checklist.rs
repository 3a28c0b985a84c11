use std::collections::{HashMap, HashSet};

use super::id::{TagId, TaskId, TemplateId};
use super::tag::Tag;
use super::task::{TaskNode, TaskRecord};
use super::template::Template;

/// The whole in-memory task store: an arena of nodes keyed by id, the ordered
/// live roots, tags, and templates.
///
/// Child lists are the source of truth for structure. Each node's `parent`
/// field is a back-reference that only the arena helpers below write, always
/// together with the matching child list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    nodes: HashMap<TaskId, TaskNode>,
    roots: Vec<TaskId>,
    tags: Vec<Tag>,
    templates: Vec<Template>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes, live and template content, in no particular order
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Live forest roots in display order
    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    /// Children of `parent` in display order; `None` means the live roots
    pub fn children_of(&self, parent: Option<TaskId>) -> &[TaskId] {
        match parent {
            None => &self.roots,
            Some(id) => self.nodes.get(&id).map(|n| n.subtasks.as_slice()).unwrap_or(&[]),
        }
    }

    /// Tags in display order
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Templates in display order
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Whether `id` is the synthetic container owned by a template
    pub fn is_content_root(&self, id: TaskId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.is_template_component && n.parent.is_none())
    }

    /// Ancestors of `id`, nearest first (content roots included)
    pub fn ancestors(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = current {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(pid);
            current = self.nodes.get(&pid).and_then(|n| n.parent);
        }
        out
    }

    /// True if `ancestor` appears on the parent chain of `id`
    pub fn is_descendant_of(&self, id: TaskId, ancestor: TaskId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// `id` followed by all of its descendants, depth-first in display order
    pub fn subtree(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        if self.nodes.contains_key(&id) {
            self.collect_subtree(id, &mut out);
        }
        out
    }

    fn collect_subtree(&self, id: TaskId, out: &mut Vec<TaskId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(&id) {
            for &child in &node.subtasks {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Depth-first walk over the live forest: `(depth, id)` pairs
    pub fn walk_live(&self) -> Vec<(usize, TaskId)> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.walk_from(root, 0, &mut out);
        }
        out
    }

    /// Depth-first walk below `parent` (exclusive)
    pub fn walk_below(&self, parent: TaskId) -> Vec<(usize, TaskId)> {
        let mut out = Vec::new();
        for &child in self.children_of(Some(parent)) {
            self.walk_from(child, 0, &mut out);
        }
        out
    }

    fn walk_from(&self, id: TaskId, depth: usize, out: &mut Vec<(usize, TaskId)>) {
        out.push((depth, id));
        if let Some(node) = self.nodes.get(&id) {
            for &child in &node.subtasks {
                self.walk_from(child, depth + 1, out);
            }
        }
    }

    /// Names from the top of the node's forest down to the node itself.
    /// A template's content root is not part of any path.
    pub fn path_of(&self, id: TaskId) -> Vec<String> {
        let mut names = Vec::new();
        let Some(node) = self.nodes.get(&id) else {
            return names;
        };
        if self.is_content_root(id) {
            return names;
        }
        names.push(node.name.clone());
        for ancestor in self.ancestors(id) {
            if self.is_content_root(ancestor) {
                break;
            }
            if let Some(n) = self.nodes.get(&ancestor) {
                names.push(n.name.clone());
            }
        }
        names.reverse();
        names
    }

    /// Largest display order among the children of `parent` plus one, or 0
    pub fn next_display_order(&self, parent: Option<TaskId>) -> i64 {
        self.children_of(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.display_order)
            .max()
            .map_or(0, |max| max + 1)
    }

    // -----------------------------------------------------------------------
    // Arena primitives (crate-internal; ops enforce the invariants)
    // -----------------------------------------------------------------------

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn tags_mut(&mut self) -> &mut Vec<Tag> {
        &mut self.tags
    }

    pub(crate) fn templates_mut(&mut self) -> &mut Vec<Template> {
        &mut self.templates
    }

    fn siblings_mut(&mut self, parent: Option<TaskId>) -> Option<&mut Vec<TaskId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(pid) => self.nodes.get_mut(&pid).map(|n| &mut n.subtasks),
        }
    }

    /// Insert `node` into the arena under `parent` at `index` of the sibling
    /// list (clamped). Display order is left to the caller.
    pub(crate) fn attach(&mut self, mut node: TaskNode, parent: Option<TaskId>, index: usize) {
        let id = node.id;
        node.parent = parent;
        self.nodes.insert(id, node);
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, id);
        }
    }

    /// Insert a template's synthetic container. It is not part of any sibling
    /// list.
    pub(crate) fn attach_content_root(&mut self, mut node: TaskNode) {
        node.parent = None;
        node.is_template_component = true;
        self.nodes.insert(node.id, node);
    }

    /// Unlink `id` from its sibling list, keeping it in the arena.
    /// Returns the index it occupied.
    pub(crate) fn detach(&mut self, id: TaskId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        let parent = node.parent;
        let is_content_root = node.is_template_component && parent.is_none();
        if is_content_root {
            return None;
        }
        let siblings = self.siblings_mut(parent)?;
        let index = siblings.iter().position(|&s| s == id)?;
        siblings.remove(index);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        Some(index)
    }

    /// Re-link a detached node under `parent` at `index`
    pub(crate) fn relink(&mut self, id: TaskId, parent: Option<TaskId>, index: usize) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, id);
        }
    }

    /// Remove `id` and every descendant from the arena. Returns the removed
    /// ids, root first.
    pub(crate) fn remove_subtree(&mut self, id: TaskId) -> Vec<TaskId> {
        let doomed = self.subtree(id);
        self.detach(id);
        for gone in &doomed {
            self.nodes.remove(gone);
        }
        doomed
    }

    /// Rewrite the display orders of `parent`'s children as 0..n in their
    /// current list order.
    pub(crate) fn renumber(&mut self, parent: Option<TaskId>) {
        let children: Vec<TaskId> = self.children_of(parent).to_vec();
        for (order, child) in children.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.display_order = order as i64;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence bridge
    // -----------------------------------------------------------------------

    /// Flatten every node into its persisted form
    pub fn task_records(&self) -> Vec<TaskRecord> {
        self.nodes.values().map(TaskRecord::from).collect()
    }

    /// Rebuild a checklist from persisted records.
    ///
    /// Sibling order is `(display_order, creation_date, id)`; a sibling group
    /// with colliding orders is renumbered densely in that order. Records
    /// whose parent is missing become live roots; template flags are
    /// re-derived from the parent chain.
    pub fn from_records(tasks: Vec<TaskRecord>, mut tags: Vec<Tag>, mut templates: Vec<Template>) -> Self {
        let mut nodes: HashMap<TaskId, TaskNode> = tasks
            .into_iter()
            .map(|r| (r.id, TaskNode::from(r)))
            .collect();

        let content_roots: HashSet<TaskId> = templates.iter().map(|t| t.root).collect();
        templates.retain(|t| {
            let present = nodes.contains_key(&t.root);
            if !present {
                tracing::warn!(template = %t.name, "dropping template whose content root is missing");
            }
            present
        });

        let mut ids: Vec<TaskId> = nodes.keys().copied().collect();
        ids.sort_by(|a, b| sibling_key(&nodes[a]).cmp(&sibling_key(&nodes[b])));

        let mut roots = Vec::new();
        let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for id in ids {
            let parent = nodes[&id].parent;
            match parent {
                Some(pid) if nodes.contains_key(&pid) && pid != id => {
                    children.entry(pid).or_default().push(id);
                }
                Some(_) => {
                    tracing::warn!(task = %id, "orphaned task record promoted to a root");
                    if let Some(node) = nodes.get_mut(&id) {
                        node.parent = None;
                        node.is_template_component = false;
                    }
                    roots.push(id);
                }
                None if content_roots.contains(&id) => {}
                None => {
                    if let Some(node) = nodes.get_mut(&id) {
                        node.is_template_component = false;
                    }
                    roots.push(id);
                }
            }
        }
        for (pid, kids) in children {
            if let Some(parent) = nodes.get_mut(&pid) {
                parent.subtasks = kids;
            }
        }

        tags.sort_by(|a, b| (a.display_order, a.creation_date).cmp(&(b.display_order, b.creation_date)));
        templates.sort_by_key(|t| t.display_order);

        let mut checklist = Checklist {
            nodes,
            roots,
            tags,
            templates,
        };
        checklist.rederive_template_flags();
        checklist.renumber_tied_groups();
        checklist
    }

    fn renumber_tied_groups(&mut self) {
        let parents: Vec<Option<TaskId>> = std::iter::once(None)
            .chain(self.nodes.values().filter(|n| n.has_subtasks()).map(|n| Some(n.id)))
            .collect();
        for parent in parents {
            let tied = self
                .children_of(parent)
                .windows(2)
                .any(|pair| match (self.nodes.get(&pair[0]), self.nodes.get(&pair[1])) {
                    (Some(a), Some(b)) => a.display_order == b.display_order,
                    _ => false,
                });
            if tied {
                tracing::debug!(parent = ?parent, "renumbering sibling group with colliding display orders");
                self.renumber(parent);
            }
        }
    }

    fn rederive_template_flags(&mut self) {
        let content_roots: Vec<TaskId> = self.templates.iter().map(|t| t.root).collect();
        for root in content_roots {
            for id in self.subtree(root) {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.is_template_component = true;
                }
            }
        }
        for id in self.roots.clone() {
            for id in self.subtree(id) {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.is_template_component = false;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Invariant check
    // -----------------------------------------------------------------------

    /// Describe every structural invariant that does not hold. Empty means the
    /// checklist is consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let content_roots: HashSet<TaskId> = self.templates.iter().map(|t| t.root).collect();

        let check_group = |parent: Option<TaskId>, kids: &[TaskId], problems: &mut Vec<String>| {
            let mut last: Option<i64> = None;
            for kid in kids {
                let Some(node) = self.nodes.get(kid) else {
                    problems.push(format!("child {} is not in the arena", kid));
                    continue;
                };
                if node.parent != parent {
                    problems.push(format!("{} has a stale parent link", kid));
                }
                if let Some(prev) = last
                    && node.display_order <= prev
                {
                    problems.push(format!("display order not strictly increasing at {}", kid));
                }
                last = Some(node.display_order);
                let expected_flag = match parent {
                    Some(pid) => self.nodes.get(&pid).is_some_and(|p| p.is_template_component),
                    None => false,
                };
                if node.is_template_component != expected_flag {
                    problems.push(format!("{} has a template flag different from its parent", kid));
                }
            }
        };

        check_group(None, &self.roots, &mut problems);
        for node in self.nodes.values() {
            check_group(Some(node.id), &node.subtasks, &mut problems);
            if node.parent.is_none() && !self.roots.contains(&node.id) && !content_roots.contains(&node.id) {
                problems.push(format!("{} is unreachable", node.id));
            }
            if self.ancestors(node.id).len() > self.nodes.len() {
                problems.push(format!("{} is on a cycle", node.id));
            }
            for tag in &node.tags {
                if self.tag(*tag).is_none() {
                    problems.push(format!("{} references missing tag {}", node.id, tag));
                }
            }
        }
        problems
    }
}

fn sibling_key(node: &TaskNode) -> (i64, chrono::DateTime<chrono::Utc>, TaskId) {
    (node.display_order, node.creation_date, node.id)
}
