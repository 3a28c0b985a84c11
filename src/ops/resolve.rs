use crate::model::checklist::Checklist;
use crate::model::id::TaskId;
use crate::ops::tree_ops::{self, InsertPosition, TreeError};
use crate::parse::path::{self, PathError};

/// Error type for path resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("path is empty")]
    EmptyPath,
    #[error("no task at {0}")]
    NoSuchPath(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The deepest node on the path; the task to focus
    pub leaf: TaskId,
    /// Nodes created along the way, top-down
    pub created: Vec<TaskId>,
}

/// Walk `segments` down from `anchor` (`None` = the live top level), reusing
/// the first same-named child at each level and creating the rest at the
/// bottom of their sibling group.
///
/// Resolving the same path twice creates nothing the second time.
pub fn resolve(list: &mut Checklist, anchor: Option<TaskId>, segments: &[String]) -> Result<Resolution, ResolveError> {
    if segments.is_empty() {
        return Err(ResolveError::EmptyPath);
    }
    if let Some(id) = anchor
        && !list.contains(id)
    {
        return Err(TreeError::NotFound(id).into());
    }
    if let Some(index) = segments.iter().position(|s| s.is_empty()) {
        return Err(PathError::EmptySegment { index }.into());
    }

    let found = tree_ops::find_by_path(list, anchor, segments);
    let mut current = found.node;
    let mut created = Vec::new();
    for name in found.remaining {
        let id = tree_ops::insert_child(list, current, name, InsertPosition::Bottom)?;
        created.push(id);
        current = Some(id);
    }

    // segments is non-empty, so either a match or a creation happened
    let leaf = current.ok_or(ResolveError::EmptyPath)?;
    if !created.is_empty() {
        tracing::debug!(created = created.len(), leaf = %leaf, "path materialized");
    }
    Ok(Resolution { leaf, created })
}

/// Tokenize `input` and resolve it from `anchor`
pub fn ingest(list: &mut Checklist, anchor: Option<TaskId>, input: &str) -> Result<Resolution, ResolveError> {
    let segments = path::tokenize(input)?;
    resolve(list, anchor, &segments)
}

/// Find the existing node named by `input`, creating nothing
pub fn locate(list: &Checklist, anchor: Option<TaskId>, input: &str) -> Result<TaskId, ResolveError> {
    let segments = path::tokenize(input)?;
    if segments.is_empty() {
        return Err(ResolveError::EmptyPath);
    }
    let found = tree_ops::find_by_path(list, anchor, &segments);
    match found.node {
        Some(id) if found.is_complete() => Ok(id),
        _ => Err(ResolveError::NoSuchPath(path::join_path(&segments))),
    }
}
