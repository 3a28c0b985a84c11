use std::ops::Range;

use regex::Regex;

use crate::model::checklist::Checklist;
use crate::model::id::TaskId;
use crate::ops::tag_ops::task_tag_phrases;

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Name,
    Tag,
}

/// A search hit for a task field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub task: TaskId,
    /// Names from the top of the task's forest down to the task
    pub path: Vec<String>,
    pub field: MatchField,
    /// Text the spans point into
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Which forest to search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    Live,
    Templates,
    All,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search task names and tag phrases depth-first in display order
pub fn search_tasks(list: &Checklist, re: &Regex, scope: SearchScope) -> Vec<SearchHit> {
    let mut order: Vec<TaskId> = Vec::new();
    if scope != SearchScope::Templates {
        order.extend(list.walk_live().into_iter().map(|(_, id)| id));
    }
    if scope != SearchScope::Live {
        for template in list.templates() {
            order.extend(list.walk_below(template.root).into_iter().map(|(_, id)| id));
        }
    }

    let mut hits = Vec::new();
    for id in order {
        search_task(list, re, id, &mut hits);
    }
    hits
}

fn search_task(list: &Checklist, re: &Regex, id: TaskId, hits: &mut Vec<SearchHit>) {
    let Some(node) = list.get(id) else {
        return;
    };

    let spans = find_matches(re, &node.name);
    if !spans.is_empty() {
        hits.push(SearchHit {
            task: id,
            path: list.path_of(id),
            field: MatchField::Name,
            text: node.name.clone(),
            spans,
        });
    }

    for phrase in task_tag_phrases(list, id) {
        let spans = find_matches(re, &phrase);
        if !spans.is_empty() {
            hits.push(SearchHit {
                task: id,
                path: list.path_of(id),
                field: MatchField::Tag,
                text: phrase,
                spans,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
