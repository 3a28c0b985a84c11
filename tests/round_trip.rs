use pathlist::io::store::{JsonFileStore, MemoryStore};
use pathlist::model::checklist::Checklist;
use pathlist::model::config::Config;
use pathlist::model::id::TaskId;
use pathlist::ops::export::{export_backup, export_tasks, to_json, ExportedTask};
use pathlist::ops::import::{import_str, ImportOptions};
use pathlist::ops::resolve::{ingest, locate};
use pathlist::ops::session::Session;
use pathlist::ops::template_ops::{apply_template, create_template, content_root};
use pathlist::ops::tree_ops::{self, TreeError};
use pathlist::parse::{join_path, tokenize};
use pretty_assertions::assert_eq;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A small live list with nesting, completion and a lock
fn sample() -> Checklist {
    let mut list = Checklist::new();
    for path in [
        "/Work/Report/Draft",
        "/Work/Report/Review",
        "/Work/Email",
        r#"/Home/"Groceries / weekly"/Milk"#,
        r#"/Home/"Groceries / weekly"/Bread"#,
        "/Home/Laundry",
    ] {
        ingest(&mut list, None, path).unwrap();
    }
    let draft = locate(&list, None, "/Work/Report/Draft").unwrap();
    tree_ops::set_completed(&mut list, draft, true).unwrap();
    let laundry = locate(&list, None, "/Home/Laundry").unwrap();
    tree_ops::set_completed(&mut list, laundry, true).unwrap();
    tree_ops::set_locked(&mut list, laundry, true).unwrap();
    list
}

fn names(list: &Checklist, ids: &[TaskId]) -> Vec<String> {
    ids.iter().map(|id| list.get(*id).unwrap().name.clone()).collect()
}

/// Names, completion and nesting only
fn shape(tasks: &[ExportedTask]) -> Vec<(String, bool, usize, Vec<String>)> {
    let mut out = Vec::new();
    for task in tasks {
        out.push((
            task.name.clone(),
            task.is_completed,
            task.subtasks.len(),
            task.subtasks.iter().map(|s| s.name.clone()).collect(),
        ));
        out.extend(shape(&task.subtasks));
    }
    out
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[test]
fn tokenizer_examples() {
    assert_eq!(
        tokenize(r#"/Work/"Follow up"/Notes"#).unwrap(),
        vec!["Work", "Follow up", "Notes"]
    );

    let quoted = r#"/"Release \"v2\"""#;
    let segments = tokenize(quoted).unwrap();
    assert_eq!(segments, vec![r#"Release "v2""#]);
    assert_eq!(join_path(&segments), quoted);
}

#[test]
fn join_then_tokenize_is_identity() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["plain"],
        vec!["with space", "a/b", " padded "],
        vec![r#""starts with quote"#, r"back\slash", "tail\""],
        vec!["Work", "Report", "Draft"],
    ];
    for segments in cases {
        let joined = join_path(&segments);
        assert_eq!(tokenize(&joined).unwrap(), segments, "via {joined}");
    }
}

// ---------------------------------------------------------------------------
// Tree invariants
// ---------------------------------------------------------------------------

#[test]
fn cyclic_move_leaves_tree_unchanged() {
    let mut list = sample();
    let before = to_json(&export_backup(&list)).unwrap();

    let work = locate(&list, None, "/Work").unwrap();
    let draft = locate(&list, None, "/Work/Report/Draft").unwrap();
    let err = tree_ops::move_node(&mut list, work, Some(draft), None).unwrap_err();
    assert_eq!(err, TreeError::Cycle { node: work, target: draft });
    let err = tree_ops::move_node(&mut list, work, Some(work), None).unwrap_err();
    assert!(matches!(err, TreeError::Cycle { .. }));

    assert_eq!(to_json(&export_backup(&list)).unwrap(), before);
}

#[test]
fn double_ingestion_creates_one_chain() {
    let mut list = Checklist::new();
    let first = ingest(&mut list, None, "/Work/Report").unwrap();
    let second = ingest(&mut list, None, "/Work/Report").unwrap();

    assert_eq!(first.created.len(), 2);
    assert!(second.created.is_empty());
    assert_eq!(first.leaf, second.leaf);

    let work = list.roots()[0];
    assert_eq!(list.roots().len(), 1);
    assert_eq!(names(&list, list.get(work).unwrap().subtasks()), vec!["Report"]);
}

#[test]
fn clear_completed_honors_locks() {
    let mut list = sample();
    let laundry = locate(&list, None, "/Home/Laundry").unwrap();
    let locked_before = list.get(laundry).unwrap().clone();

    let result = tree_ops::clear_completed(&mut list, None).unwrap();
    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.skipped_locked, vec![laundry]);

    assert!(locate(&list, None, "/Work/Report/Draft").is_err());
    assert!(locate(&list, None, "/Work/Report/Review").is_ok());
    assert_eq!(list.get(laundry), Some(&locked_before));
    assert!(list.invariant_violations().is_empty());
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[test]
fn fresh_round_trip_keeps_shape_with_new_ids() {
    let source = sample();
    let exported = export_tasks(&source, None);
    let json = to_json(&exported).unwrap();

    let mut target = Checklist::new();
    import_str(&mut target, &json, ImportOptions::default()).unwrap();

    assert_eq!(shape(&export_tasks(&target, None)), shape(&exported));
    assert!(target.nodes().all(|n| !source.contains(n.id)));
}

#[test]
fn preserve_round_trip_is_identity() {
    let mut source = sample();
    let template = create_template(&mut source, "Weekly").unwrap();
    let root = content_root(&source, template).unwrap();
    ingest(&mut source, Some(root), "/Plan/Review goals").unwrap();
    let backup = to_json(&export_backup(&source)).unwrap();

    let mut target = Checklist::new();
    let options = ImportOptions {
        preserve_metadata: true,
        target: None,
    };
    import_str(&mut target, &backup, options).unwrap();

    assert_eq!(to_json(&export_backup(&target)).unwrap(), backup);
    for node in source.nodes().filter(|n| !source.is_content_root(n.id)) {
        let copy = target.get(node.id).unwrap();
        assert_eq!(copy.display_order, node.display_order);
        assert_eq!(copy.is_locked, node.is_locked);
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[test]
fn template_merge_is_idempotent() {
    let mut list = Checklist::new();
    ingest(&mut list, None, "/Trip/Passport").unwrap();
    let template = create_template(&mut list, "Packing").unwrap();
    let root = content_root(&list, template).unwrap();
    for path in ["/Trip/Passport", "/Trip/Charger", "/Toiletries/Toothbrush"] {
        ingest(&mut list, Some(root), path).unwrap();
    }

    let first = apply_template(&mut list, template, None).unwrap();
    assert_eq!(first.created.len(), 3);
    let once = to_json(&export_tasks(&list, None)).unwrap();

    let second = apply_template(&mut list, template, None).unwrap();
    assert!(second.created.is_empty());
    assert_eq!(to_json(&export_tasks(&list, None)).unwrap(), once);
    assert_eq!(names(&list, list.roots()), vec!["Trip", "Toiletries"]);
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn failed_action_does_not_reach_the_store() {
    let s = Session::open(MemoryStore::new(), Config::default());
    s.apply(|list| -> Result<_, AnyError> { Ok(ingest(list, None, "/Work/Report")?) })
        .unwrap();

    let result = s.apply(|list| -> Result<(), AnyError> {
        let work = locate(list, None, "/Work")?;
        let report = locate(list, None, "/Work/Report")?;
        ingest(list, None, "/Scratch")?;
        tree_ops::move_node(list, work, Some(report), None)?;
        Ok(())
    });
    assert!(result.is_err());

    let store = s.into_store().unwrap();
    let reloaded = pathlist::ops::session::load_checklist(&store);
    assert_eq!(reloaded.len(), 2);
    assert!(locate(&reloaded, None, "/Scratch").is_err());
}

#[test]
fn file_store_survives_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let leaf = {
        let s = Session::open(JsonFileStore::open(tmp.path()).unwrap(), Config::default());
        s.apply(|list| -> Result<_, AnyError> { Ok(ingest(list, None, r#"/Home/"a/b""#)?) })
            .unwrap()
            .leaf
    };

    let s = Session::open(JsonFileStore::open(tmp.path()).unwrap(), Config::default());
    let path = s.read(|list| join_path(&list.path_of(leaf))).unwrap();
    assert_eq!(path, r#"/Home/"a/b""#);
}

#[test]
fn overlapping_sessions_on_one_directory_keep_both_changes() {
    let tmp = tempfile::TempDir::new().unwrap();
    let first = Session::open(JsonFileStore::open(tmp.path()).unwrap(), Config::default());

    let dir = tmp.path().to_path_buf();
    let second = std::thread::spawn(move || {
        let s = Session::open(JsonFileStore::open(&dir).unwrap(), Config::default());
        s.apply(|list| -> Result<_, AnyError> { Ok(ingest(list, None, "/FromB")?) })
            .unwrap();
    });

    std::thread::sleep(std::time::Duration::from_millis(50));
    first
        .apply(|list| -> Result<_, AnyError> { Ok(ingest(list, None, "/FromA")?) })
        .unwrap();
    drop(first);
    second.join().unwrap();

    let s = Session::open(JsonFileStore::open(tmp.path()).unwrap(), Config::default());
    let roots = s.read(|list| names(list, list.roots())).unwrap();
    assert_eq!(roots, vec!["FromA", "FromB"]);
}
