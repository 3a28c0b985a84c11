use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::lock::{DirLock, LockError};
use crate::model::id::{TagId, TaskId, TemplateId};
use crate::model::tag::Tag;
use crate::model::task::TaskRecord;
use crate::model::template::Template;

/// Name of the data file inside the data directory
pub const STORE_FILE: &str = "checklist.json";

const STORE_VERSION: u32 = 1;

/// Error type for object store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize store: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("unsupported store version {0}")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("save rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    Task(TaskId),
    Tag(TagId),
    Template(TemplateId),
}

/// One persisted object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Task(TaskRecord),
    Tag(Tag),
    Template(Template),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::Task(t) => RecordKey::Task(t.id),
            Record::Tag(t) => RecordKey::Tag(t.id),
            Record::Template(t) => RecordKey::Template(t.id),
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Record::Task(_))
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Record::Tag(_))
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Record::Template(_))
    }

    fn display_order(&self) -> i64 {
        match self {
            Record::Task(t) => t.display_order,
            Record::Tag(t) => t.display_order,
            Record::Template(t) => t.display_order,
        }
    }

    fn creation_date(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Record::Task(t) => Some(t.creation_date),
            Record::Tag(t) => Some(t.creation_date),
            Record::Template(_) => None,
        }
    }
}

/// Result ordering for [`ObjectStore::fetch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Key order
    #[default]
    Key,
    DisplayOrder,
    CreationDate,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// A transactional object store.
///
/// `insert` and `delete` stage changes; reads see staged changes. `save`
/// commits everything staged, `rollback` discards it.
pub trait ObjectStore {
    /// Insert or replace the record with the same key
    fn insert(&mut self, record: Record);
    fn delete(&mut self, key: RecordKey);
    fn fetch(&self, predicate: &dyn Fn(&Record) -> bool, sort: SortOrder) -> Vec<Record>;
    fn fetch_count(&self, predicate: &dyn Fn(&Record) -> bool) -> usize;
    fn save(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self);
}

/// Committed records plus staged changes; the shared core of both stores
#[derive(Debug, Clone, Default)]
struct RecordSet {
    committed: BTreeMap<RecordKey, Record>,
    /// `None` stages a delete
    pending: BTreeMap<RecordKey, Option<Record>>,
}

impl RecordSet {
    fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        RecordSet {
            committed: records.into_iter().map(|r| (r.key(), r)).collect(),
            pending: BTreeMap::new(),
        }
    }

    fn insert(&mut self, record: Record) {
        self.pending.insert(record.key(), Some(record));
    }

    fn delete(&mut self, key: RecordKey) {
        self.pending.insert(key, None);
    }

    /// Committed records overlaid with staged changes
    fn view(&self) -> BTreeMap<RecordKey, &Record> {
        let mut out: BTreeMap<RecordKey, &Record> = self.committed.iter().map(|(k, r)| (*k, r)).collect();
        for (key, change) in &self.pending {
            match change {
                Some(record) => {
                    out.insert(*key, record);
                }
                None => {
                    out.remove(key);
                }
            }
        }
        out
    }

    fn fetch(&self, predicate: &dyn Fn(&Record) -> bool, sort: SortOrder) -> Vec<Record> {
        let mut found: Vec<Record> = self
            .view()
            .into_values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        match sort {
            SortOrder::Key => {}
            SortOrder::DisplayOrder => found.sort_by_key(|r| (r.display_order(), r.creation_date())),
            SortOrder::CreationDate => found.sort_by_key(|r| (r.creation_date(), r.display_order())),
        }
        found
    }

    fn fetch_count(&self, predicate: &dyn Fn(&Record) -> bool) -> usize {
        self.view().into_values().filter(|r| predicate(r)).count()
    }

    fn commit(&mut self) {
        for (key, change) in std::mem::take(&mut self.pending) {
            match change {
                Some(record) => {
                    self.committed.insert(key, record);
                }
                None => {
                    self.committed.remove(&key);
                }
            }
        }
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store that lives only in memory; used for tests and scratch sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: RecordSet,
    fail_next_save: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        MemoryStore {
            records: RecordSet::from_records(records),
            ..Self::default()
        }
    }

    /// Make the next `save` fail, leaving staged changes in place
    pub fn fail_next_save(&mut self) {
        self.fail_next_save = true;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn has_pending(&self) -> bool {
        self.records.has_pending()
    }
}

impl ObjectStore for MemoryStore {
    fn insert(&mut self, record: Record) {
        self.records.insert(record);
    }

    fn delete(&mut self, key: RecordKey) {
        self.records.delete(key);
    }

    fn fetch(&self, predicate: &dyn Fn(&Record) -> bool, sort: SortOrder) -> Vec<Record> {
        self.records.fetch(predicate, sort)
    }

    fn fetch_count(&self, predicate: &dyn Fn(&Record) -> bool) -> usize {
        self.records.fetch_count(predicate)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        if std::mem::take(&mut self.fail_next_save) {
            return Err(StoreError::Rejected("injected failure".into()));
        }
        self.records.commit();
        self.saves += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.records.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// On-disk layout of `checklist.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    templates: Vec<Template>,
}

/// Store backed by a single JSON file in the data directory.
///
/// The directory lock is held from `open` until the store is dropped, so the
/// snapshot a save is computed from is never stale. Saves rewrite the file
/// atomically.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    records: RecordSet,
    _lock: DirLock,
}

impl JsonFileStore {
    /// Open the store in `dir`, creating the directory if needed. A missing
    /// data file is an empty store. Waits up to
    /// [`DirLock::DEFAULT_TIMEOUT`] for another process to close it.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        Self::open_with_timeout(dir, DirLock::DEFAULT_TIMEOUT)
    }

    pub fn open_with_timeout(dir: &Path, timeout: Duration) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::WriteError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let lock = DirLock::acquire(dir, timeout)?;
        let path = dir.join(STORE_FILE);
        let records = match fs::read_to_string(&path) {
            Ok(text) => {
                let file: StoreFile = serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
                    path: path.clone(),
                    source: e,
                })?;
                if file.version > STORE_VERSION {
                    return Err(StoreError::UnsupportedVersion(file.version));
                }
                let records = file
                    .tasks
                    .into_iter()
                    .map(Record::Task)
                    .chain(file.tags.into_iter().map(Record::Tag))
                    .chain(file.templates.into_iter().map(Record::Template));
                RecordSet::from_records(records)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => RecordSet::default(),
            Err(e) => return Err(StoreError::ReadError { path, source: e }),
        };
        tracing::debug!(dir = %dir.display(), records = records.committed.len(), "opened store");
        Ok(JsonFileStore {
            dir: dir.to_path_buf(),
            records,
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn render(&self) -> Result<String, serde_json::Error> {
        let mut file = StoreFile {
            version: STORE_VERSION,
            ..StoreFile::default()
        };
        for record in self.records.view().into_values() {
            match record {
                Record::Task(t) => file.tasks.push(t.clone()),
                Record::Tag(t) => file.tags.push(t.clone()),
                Record::Template(t) => file.templates.push(t.clone()),
            }
        }
        serde_json::to_string_pretty(&file)
    }
}

impl ObjectStore for JsonFileStore {
    fn insert(&mut self, record: Record) {
        self.records.insert(record);
    }

    fn delete(&mut self, key: RecordKey) {
        self.records.delete(key);
    }

    fn fetch(&self, predicate: &dyn Fn(&Record) -> bool, sort: SortOrder) -> Vec<Record> {
        self.records.fetch(predicate, sort)
    }

    fn fetch_count(&self, predicate: &dyn Fn(&Record) -> bool) -> usize {
        self.records.fetch_count(predicate)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        if !self.records.has_pending() {
            return Ok(());
        }
        let path = self.path();
        let content = self.render()?;
        atomic_write(&path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: path.clone(),
            source: e,
        })?;
        self.records.commit();
        Ok(())
    }

    fn rollback(&mut self) {
        self.records.pending.clear();
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
