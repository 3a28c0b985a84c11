use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::store::{ObjectStore, Record, RecordKey, SortOrder, StoreError};
use crate::model::checklist::Checklist;
use crate::model::config::Config;
use crate::model::id::TaskId;
use crate::model::tag::Tag;
use crate::model::task::TaskRecord;
use crate::model::template::Template;
use crate::ops::tag_ops::task_tag_phrases;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session state is poisoned by an earlier panic")]
    Poisoned,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-only snapshot of one task, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub path: Vec<String>,
    pub is_completed: bool,
    pub is_locked: bool,
    pub is_template_component: bool,
    pub display_order: i64,
    pub creation_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub subtasks: Vec<TaskId>,
}

impl TaskView {
    pub fn of(list: &Checklist, id: TaskId) -> Option<TaskView> {
        let node = list.get(id)?;
        Some(TaskView {
            id,
            name: node.name.clone(),
            path: list.path_of(id),
            is_completed: node.is_completed,
            is_locked: node.is_locked,
            is_template_component: node.is_template_component,
            display_order: node.display_order,
            creation_date: node.creation_date,
            tags: task_tag_phrases(list, id),
            subtasks: node.subtasks().to_vec(),
        })
    }
}

struct Inner<S> {
    list: Checklist,
    store: S,
}

/// Single-writer gate over a checklist and its object store.
///
/// Every mutation goes through [`Session::apply`], which runs it as one
/// transaction: on any failure, including a failed save, both the in-memory
/// checklist and the store's staged changes are rolled back.
pub struct Session<S: ObjectStore> {
    inner: Mutex<Inner<S>>,
    config: Config,
}

impl<S: ObjectStore> Session<S> {
    /// Load the checklist from `store`
    pub fn open(store: S, config: Config) -> Self {
        let list = load_checklist(&store);
        tracing::debug!(tasks = list.len(), "session opened");
        Session {
            inner: Mutex::new(Inner { list, store }),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<S>>, SessionError> {
        self.inner.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Run `f` against a consistent view of the checklist
    pub fn read<R>(&self, f: impl FnOnce(&Checklist) -> R) -> Result<R, SessionError> {
        let inner = self.lock()?;
        Ok(f(&inner.list))
    }

    /// Snapshot of one task
    pub fn view(&self, id: TaskId) -> Result<Option<TaskView>, SessionError> {
        self.read(|list| TaskView::of(list, id))
    }

    /// Run `f` against the store, e.g. for counts
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, SessionError> {
        let inner = self.lock()?;
        Ok(f(&inner.store))
    }

    /// Run one user action as a transaction.
    ///
    /// `f` mutates the checklist. If it fails the checklist is restored. If it
    /// succeeds, the changes are written to the store and saved; a failed save
    /// rolls back the store and restores the checklist too.
    pub fn apply<T, E>(&self, f: impl FnOnce(&mut Checklist) -> Result<T, E>) -> Result<T, E>
    where
        E: From<SessionError>,
    {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let before = inner.list.clone();

        let value = match f(&mut inner.list) {
            Ok(value) => value,
            Err(e) => {
                inner.list = before;
                tracing::debug!("transaction aborted by operation error");
                return Err(e);
            }
        };

        let changes = stage_changes(&before, &inner.list, &mut inner.store);
        if let Err(e) = inner.store.save() {
            inner.store.rollback();
            inner.list = before;
            tracing::warn!(error = %e, "save failed; transaction rolled back");
            return Err(SessionError::from(e).into());
        }
        tracing::debug!(
            upserts = changes.upserts,
            deletes = changes.deletes,
            "transaction committed"
        );
        Ok(value)
    }

    /// Consume the session, returning the store
    pub fn into_store(self) -> Result<S, SessionError> {
        let inner = self.inner.into_inner().map_err(|_| SessionError::Poisoned)?;
        Ok(inner.store)
    }
}

/// Rebuild a checklist from everything in `store`
pub fn load_checklist<S: ObjectStore + ?Sized>(store: &S) -> Checklist {
    let mut tasks = Vec::new();
    let mut tags = Vec::new();
    let mut templates = Vec::new();
    for record in store.fetch(&|_| true, SortOrder::DisplayOrder) {
        match record {
            Record::Task(t) => tasks.push(t),
            Record::Tag(t) => tags.push(t),
            Record::Template(t) => templates.push(t),
        }
    }
    Checklist::from_records(tasks, tags, templates)
}

#[derive(Debug, Default)]
struct ChangeCount {
    upserts: usize,
    deletes: usize,
}

/// Stage an insert for every record that is new or changed and a delete for
/// every record that is gone
fn stage_changes<S: ObjectStore + ?Sized>(before: &Checklist, after: &Checklist, store: &mut S) -> ChangeCount {
    let mut count = ChangeCount::default();

    let old_tasks: HashMap<TaskId, TaskRecord> = before.task_records().into_iter().map(|r| (r.id, r)).collect();
    for record in after.task_records() {
        if old_tasks.get(&record.id) != Some(&record) {
            store.insert(Record::Task(record));
            count.upserts += 1;
        }
    }
    for id in old_tasks.keys() {
        if !after.contains(*id) {
            store.delete(RecordKey::Task(*id));
            count.deletes += 1;
        }
    }

    diff_by_id(before.tags(), after.tags(), |t: &Tag| RecordKey::Tag(t.id), Record::Tag, store, &mut count);
    diff_by_id(
        before.templates(),
        after.templates(),
        |t: &Template| RecordKey::Template(t.id),
        Record::Template,
        store,
        &mut count,
    );
    count
}

fn diff_by_id<T: Clone + PartialEq, S: ObjectStore + ?Sized>(
    before: &[T],
    after: &[T],
    key: impl Fn(&T) -> RecordKey,
    wrap: impl Fn(T) -> Record,
    store: &mut S,
    count: &mut ChangeCount,
) {
    let old: HashMap<RecordKey, &T> = before.iter().map(|t| (key(t), t)).collect();
    for item in after {
        if old.get(&key(item)) != Some(&item) {
            store.insert(wrap(item.clone()));
            count.upserts += 1;
        }
    }
    for (k, _) in old {
        if !after.iter().any(|t| key(t) == k) {
            store.delete(k);
            count.deletes += 1;
        }
    }
}
