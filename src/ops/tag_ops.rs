use crate::model::checklist::Checklist;
use crate::model::id::{TagId, TaskId};
use crate::model::tag::{ColorKey, Tag};

/// Error type for tag operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag not found: {0}")]
    NotFound(String),
    #[error("tag already exists: {0}")]
    AlreadyExists(String),
    #[error("tag phrase cannot be empty")]
    EmptyPhrase,
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Find a tag by its exact phrase
pub fn find_tag<'a>(list: &'a Checklist, phrase: &str) -> Option<&'a Tag> {
    list.tags().iter().find(|t| t.phrase == phrase)
}

fn tag_mut(list: &mut Checklist, id: TagId) -> Result<&mut Tag, TagError> {
    list.tags_mut()
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| TagError::NotFound(id.to_string()))
}

pub fn create_tag(list: &mut Checklist, phrase: &str, color: ColorKey) -> Result<TagId, TagError> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Err(TagError::EmptyPhrase);
    }
    if find_tag(list, phrase).is_some() {
        return Err(TagError::AlreadyExists(phrase.to_string()));
    }
    let order = list
        .tags()
        .iter()
        .map(|t| t.display_order)
        .max()
        .map_or(0, |max| max + 1);
    let tag = Tag::new(phrase, color, order);
    let id = tag.id;
    list.tags_mut().push(tag);
    Ok(id)
}

/// Look a tag up by phrase, creating it with the default color if missing
pub fn ensure_tag(list: &mut Checklist, phrase: &str) -> Result<TagId, TagError> {
    match find_tag(list, phrase.trim()) {
        Some(tag) => Ok(tag.id),
        None => create_tag(list, phrase, ColorKey::default()),
    }
}

pub fn rename_tag(list: &mut Checklist, id: TagId, phrase: &str) -> Result<(), TagError> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Err(TagError::EmptyPhrase);
    }
    if find_tag(list, phrase).is_some_and(|t| t.id != id) {
        return Err(TagError::AlreadyExists(phrase.to_string()));
    }
    tag_mut(list, id)?.phrase = phrase.to_string();
    Ok(())
}

pub fn recolor_tag(list: &mut Checklist, id: TagId, color: ColorKey) -> Result<(), TagError> {
    tag_mut(list, id)?.color = color;
    Ok(())
}

/// Delete a tag and drop it from every task. Tasks are untouched otherwise.
/// Returns how many tasks lost the tag.
pub fn delete_tag(list: &mut Checklist, id: TagId) -> Result<usize, TagError> {
    if list.tag(id).is_none() {
        return Err(TagError::NotFound(id.to_string()));
    }
    list.tags_mut().retain(|t| t.id != id);

    let tagged: Vec<TaskId> = list
        .nodes()
        .filter(|n| n.tags.contains(&id))
        .map(|n| n.id)
        .collect();
    for task in &tagged {
        if let Some(node) = list.get_mut(*task) {
            node.tags.retain(|t| *t != id);
        }
    }
    Ok(tagged.len())
}

/// Attach a tag to a task. Returns false if it was already attached.
pub fn tag_task(list: &mut Checklist, task: TaskId, tag: TagId) -> Result<bool, TagError> {
    if list.tag(tag).is_none() {
        return Err(TagError::NotFound(tag.to_string()));
    }
    let node = list.get_mut(task).ok_or(TagError::TaskNotFound(task))?;
    if node.tags.contains(&tag) {
        return Ok(false);
    }
    node.tags.push(tag);
    Ok(true)
}

/// Detach a tag from a task. Returns false if it was not attached.
pub fn untag_task(list: &mut Checklist, task: TaskId, tag: TagId) -> Result<bool, TagError> {
    let node = list.get_mut(task).ok_or(TagError::TaskNotFound(task))?;
    let before = node.tags.len();
    node.tags.retain(|t| *t != tag);
    Ok(node.tags.len() != before)
}

/// Phrases of a task's tags, in tag display order
pub fn task_tag_phrases(list: &Checklist, task: TaskId) -> Vec<String> {
    let Some(node) = list.get(task) else {
        return Vec::new();
    };
    list.tags()
        .iter()
        .filter(|t| node.tags.contains(&t.id))
        .map(|t| t.phrase.clone())
        .collect()
}
