use serde::{Deserialize, Serialize};

use super::id::{TaskId, TemplateId};

/// A named, inert task tree that can be merged into the live list.
///
/// `root` is a synthetic container node owned by the template. Its children
/// are the template's visible top-level tasks; the container itself is never
/// shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub display_order: i64,
    pub root: TaskId,
}
