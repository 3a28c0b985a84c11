use std::collections::HashSet;

use chrono::Utc;

use crate::model::checklist::Checklist;
use crate::model::id::{TaskId, TemplateId};
use crate::model::tag::Tag;
use crate::model::task::TaskNode;
use crate::model::template::Template;
use crate::ops::export::{Backup, ExportedTag, ExportedTask, ExportedTemplate};
use crate::ops::tag_ops::{self, TagError};
use crate::ops::template_ops::{self, TemplateError};
use crate::ops::tree_ops::TreeError;

/// Error type for import operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("could not decode import data (as a backup: {backup}; as a task list: {task_list})")]
    Decode { backup: String, task_list: String },
    #[error("no tasks found in import data")]
    NoTasks,
    #[error("task id already exists: {0}")]
    DuplicateId(TaskId),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Tag(#[from] TagError),
}

/// A decoded import file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Backup(Backup),
    TaskList(Vec<ExportedTask>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Keep serialized ids, display orders, creation dates and locks
    pub preserve_metadata: bool,
    /// Parent for imported live tasks; `None` means the top level
    pub target: Option<TaskId>,
}

/// Result of an import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Ids of the imported top-level live tasks
    pub roots: Vec<TaskId>,
    /// Templates created or extended by the import
    pub templates: Vec<TemplateId>,
    /// Total number of tasks imported (including subtasks and template content)
    pub total_count: usize,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode JSON as a backup object, falling back to a bare task array
pub fn decode(input: &str) -> Result<Payload, ImportError> {
    let backup = match serde_json::from_str::<Backup>(input) {
        Ok(backup) => return Ok(Payload::Backup(backup)),
        Err(e) => e.to_string(),
    };
    match serde_json::from_str::<Vec<ExportedTask>>(input) {
        Ok(tasks) => Ok(Payload::TaskList(tasks)),
        Err(e) => Err(ImportError::Decode {
            backup,
            task_list: e.to_string(),
        }),
    }
}

/// Decode and import in one step
pub fn import_str(list: &mut Checklist, input: &str, options: ImportOptions) -> Result<ImportResult, ImportError> {
    let payload = decode(input)?;
    import_payload(list, payload, options)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Insert a decoded payload. Everything is validated before the checklist is
/// touched, so an error leaves it unchanged.
pub fn import_payload(list: &mut Checklist, payload: Payload, options: ImportOptions) -> Result<ImportResult, ImportError> {
    let (tasks, templates, tags) = match payload {
        Payload::Backup(b) => (b.tasks, b.templates, b.tags),
        Payload::TaskList(tasks) => (tasks, Vec::new(), Vec::new()),
    };
    if tasks.is_empty() && templates.is_empty() && tags.is_empty() {
        return Err(ImportError::NoTasks);
    }
    validate(list, &tasks, &templates, &tags, options)?;

    let mut importer = Importer {
        list,
        preserve: options.preserve_metadata,
        count: 0,
    };
    for tag in &tags {
        importer.import_tag(tag);
    }

    let mut result = ImportResult::default();
    for task in &tasks {
        let id = importer.import_task(task, options.target, false)?;
        result.roots.push(id);
    }
    for template in &templates {
        let id = importer.import_template(template)?;
        result.templates.push(id);
    }
    result.total_count = importer.count;

    tracing::info!(
        roots = result.roots.len(),
        templates = result.templates.len(),
        total = result.total_count,
        preserve = options.preserve_metadata,
        "import finished"
    );
    Ok(result)
}

fn validate(
    list: &Checklist,
    tasks: &[ExportedTask],
    templates: &[ExportedTemplate],
    tags: &[ExportedTag],
    options: ImportOptions,
) -> Result<(), ImportError> {
    if let Some(target) = options.target {
        let node = list.get(target).ok_or(TreeError::NotFound(target))?;
        if node.is_template_component {
            return Err(TreeError::NotLive(target).into());
        }
    }
    for tag in tags {
        if tag.phrase.trim().is_empty() {
            return Err(TagError::EmptyPhrase.into());
        }
    }
    for template in templates {
        if template.name.trim().is_empty() {
            return Err(TemplateError::EmptyName.into());
        }
    }

    let mut seen = HashSet::new();
    let all = tasks
        .iter()
        .chain(templates.iter().flat_map(|t| t.roots.iter()));
    for task in all {
        validate_task(list, task, options.preserve_metadata, &mut seen)?;
    }
    Ok(())
}

fn validate_task(
    list: &Checklist,
    task: &ExportedTask,
    preserve: bool,
    seen: &mut HashSet<TaskId>,
) -> Result<(), ImportError> {
    if task.name.is_empty() {
        return Err(TreeError::EmptyName.into());
    }
    if task.tags.iter().any(|p| p.trim().is_empty()) {
        return Err(TagError::EmptyPhrase.into());
    }
    if preserve
        && let Some(id) = task.id
        && (list.contains(id) || !seen.insert(id))
    {
        return Err(ImportError::DuplicateId(id));
    }
    for sub in &task.subtasks {
        validate_task(list, sub, preserve, seen)?;
    }
    Ok(())
}

struct Importer<'a> {
    list: &'a mut Checklist,
    preserve: bool,
    count: usize,
}

impl Importer<'_> {
    fn import_tag(&mut self, tag: &ExportedTag) {
        let phrase = tag.phrase.trim();
        if tag_ops::find_tag(self.list, phrase).is_some() {
            return;
        }
        let order = self
            .list
            .tags()
            .iter()
            .map(|t| t.display_order)
            .max()
            .map_or(0, |max| max + 1);
        let mut new_tag = Tag::new(phrase, tag.color, order);
        if self.preserve {
            if let Some(id) = tag.id.filter(|id| self.list.tag(*id).is_none()) {
                new_tag.id = id;
            }
            if let Some(date) = tag.creation_date {
                new_tag.creation_date = date;
            }
            if let Some(order) = tag.display_order {
                new_tag.display_order = order;
            }
        }
        let tags = self.list.tags_mut();
        let index = tags
            .iter()
            .position(|t| t.display_order > new_tag.display_order)
            .unwrap_or(tags.len());
        tags.insert(index, new_tag);
    }

    /// Insert `task` and its subtasks under `parent`, keeping each sibling
    /// group sorted by display order
    fn import_task(&mut self, task: &ExportedTask, parent: Option<TaskId>, template_component: bool) -> Result<TaskId, ImportError> {
        let mut node = TaskNode::new(task.name.clone(), template_component);
        node.is_completed = task.is_completed;

        let next = self.list.next_display_order(parent);
        if self.preserve {
            if let Some(id) = task.id {
                node.id = id;
            }
            node.creation_date = task.creation_date;
            node.is_locked = task.is_locked.unwrap_or(false);
            node.display_order = match task.display_order {
                Some(order) if !self.order_taken(parent, order) => order,
                _ => next,
            };
        } else {
            node.creation_date = Utc::now();
            node.display_order = next;
        }

        for phrase in &task.tags {
            let tag = tag_ops::ensure_tag(self.list, phrase)?;
            if !node.tags.contains(&tag) {
                node.tags.push(tag);
            }
        }

        let siblings = self.list.children_of(parent);
        let index = siblings
            .iter()
            .position(|s| {
                self.list
                    .get(*s)
                    .is_some_and(|n| n.display_order > node.display_order)
            })
            .unwrap_or(siblings.len());
        let id = node.id;
        self.list.attach(node, parent, index);
        self.count += 1;

        for sub in &task.subtasks {
            self.import_task(sub, Some(id), template_component)?;
        }
        Ok(id)
    }

    /// Import a template's roots, appending into an existing template of the
    /// same id or name
    fn import_template(&mut self, template: &ExportedTemplate) -> Result<TemplateId, ImportError> {
        let existing = template
            .id
            .filter(|_| self.preserve)
            .and_then(|id| self.list.template(id))
            .or_else(|| template_ops::find_template(self.list, &template.name))
            .map(|t| t.id);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = template_ops::create_template(self.list, &template.name)?;
                if self.preserve {
                    self.restore_template_identity(id, template)
                } else {
                    id
                }
            }
        };
        let root = template_ops::content_root(self.list, id)?;
        for task in &template.roots {
            self.import_task(task, Some(root), true)?;
        }
        Ok(id)
    }

    /// Give a freshly created template its serialized id and display order.
    /// Returns the id the template ends up with.
    fn restore_template_identity(&mut self, id: TemplateId, template: &ExportedTemplate) -> TemplateId {
        let new_id = template
            .id
            .filter(|wanted| self.list.template(*wanted).is_none());
        let templates = self.list.templates_mut();
        let Some(position) = templates.iter().position(|t| t.id == id) else {
            return id;
        };
        let mut entry: Template = templates.remove(position);
        if let Some(new_id) = new_id {
            entry.id = new_id;
        }
        if let Some(order) = template.display_order {
            entry.display_order = order;
        }
        let index = templates
            .iter()
            .position(|t| t.display_order > entry.display_order)
            .unwrap_or(templates.len());
        let final_id = entry.id;
        templates.insert(index, entry);
        final_id
    }

    fn order_taken(&self, parent: Option<TaskId>, order: i64) -> bool {
        self.list
            .children_of(parent)
            .iter()
            .filter_map(|id| self.list.get(*id))
            .any(|n| n.display_order == order)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
