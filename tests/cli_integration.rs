//! Integration tests for the `pl` CLI.
//!
//! Each test creates a temp data directory, runs `pl -C <dir>` as a
//! subprocess, and verifies stdout and/or the stored files.

use std::fs;
use std::path::Path;
use std::process::Command;

use pretty_assertions::assert_eq;

/// Run `pl` against the given data directory, returning (stdout, stderr, success).
fn run_pl(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_pl"))
        .arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("PATHLIST_LOG")
        .output()
        .expect("failed to run pl");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `pl` expecting success, return stdout.
fn run_pl_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_pl(dir, args);
    if !success {
        panic!("pl {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

/// Run `pl` expecting failure, return stderr.
fn run_pl_err(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_pl(dir, args);
    if success {
        panic!("pl {:?} unexpectedly succeeded:\nstdout: {}", args, stdout);
    }
    stderr
}

/// Data directory with a handful of tasks
fn seeded() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    run_pl_ok(tmp.path(), &["init"]);
    for path in [
        "/Work/Report/Draft",
        "/Work/Email",
        r#"/Home/"Groceries / weekly"/Milk"#,
        "/Home/Laundry",
    ] {
        run_pl_ok(tmp.path(), &["add", path]);
    }
    tmp
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn test_init_creates_config_and_store() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_pl_ok(tmp.path(), &["init"]);
    assert!(out.contains("initialized pathlist"));
    assert!(tmp.path().join("config.toml").exists());

    let err = run_pl_err(tmp.path(), &["init"]);
    assert!(err.contains("--force"));
    run_pl_ok(tmp.path(), &["init", "--force"]);
}

#[test]
fn test_commands_work_without_init() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_pl_ok(tmp.path(), &["add", "/a/b"]);
    assert_eq!(out.trim(), "/a/b");
    assert!(tmp.path().join("checklist.json").exists());
}

#[test]
fn test_bad_config_is_reported() {
    let tmp = tempfile::TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[tasks\n").unwrap();
    let err = run_pl_err(tmp.path(), &["list"]);
    assert!(err.starts_with("error:"));
}

// ---------------------------------------------------------------------------
// Adding and listing
// ---------------------------------------------------------------------------

#[test]
fn test_add_prints_quoted_path() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["add", r#"/Home/"Groceries / weekly"/Bread"#]);
    assert_eq!(out.trim(), r#"/Home/"Groceries / weekly"/Bread"#);
}

#[test]
fn test_add_twice_creates_one_chain() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["add", "/Work/Report/Draft"]);
    let out = run_pl_ok(tmp.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let roots = parsed.as_array().unwrap();
    assert_eq!(roots.len(), 2);
    let report = &roots[0]["subtasks"][0];
    assert_eq!(report["name"], "Report");
    assert_eq!(report["subtasks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_list_tree() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["list"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[ ] Work",
            "  [ ] Report",
            "    [ ] Draft",
            "  [ ] Email",
            "[ ] Home",
            "  [ ] Groceries / weekly",
            "    [ ] Milk",
            "  [ ] Laundry  <",
        ]
    );
}

#[test]
fn test_list_subtree() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["list", "/Work"]);
    assert!(out.contains("Report"));
    assert!(!out.contains("Home"));
}

#[test]
fn test_collapse_hides_subtasks() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["collapse", "/Work"]);
    let out = run_pl_ok(tmp.path(), &["list"]);
    assert!(out.contains("[ ] Work (+3 hidden)"));
    assert!(!out.contains("Draft"));

    let all = run_pl_ok(tmp.path(), &["list", "--all"]);
    assert!(all.contains("Draft"));

    run_pl_ok(tmp.path(), &["expand", "/Work"]);
    let out = run_pl_ok(tmp.path(), &["list"]);
    assert!(out.contains("Draft"));
}

#[test]
fn test_insert_at_top() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["insert", "Urgent", "--parent", "/Work", "--top"]);
    let out = run_pl_ok(tmp.path(), &["list", "/Work"]);
    assert!(out.starts_with("[ ] Urgent"));
}

#[test]
fn test_show_json() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["show", "/Work/Report", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["name"], "Report");
    assert_eq!(parsed["path"], serde_json::json!(["Work", "Report"]));
    assert_eq!(parsed["is_completed"], false);
}

#[test]
fn test_missing_path_is_an_error() {
    let tmp = seeded();
    let err = run_pl_err(tmp.path(), &["show", "/Work/Nope"]);
    assert!(err.contains("/Work/Nope"));
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

#[test]
fn test_cyclic_move_fails_and_changes_nothing() {
    let tmp = seeded();
    let before = fs::read_to_string(tmp.path().join("checklist.json")).unwrap();
    let err = run_pl_err(tmp.path(), &["mv", "/Work", "--to", "/Work/Report"]);
    assert!(err.starts_with("error:"));
    let after = fs::read_to_string(tmp.path().join("checklist.json")).unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_move_to_top_level() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["mv", "/Work/Email", "--to", "/"]);
    assert_eq!(out.trim(), "/Email");
}

#[test]
fn test_rename_and_reorder() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["rename", "/Work/Email", "Inbox zero"]);
    run_pl_ok(tmp.path(), &["reorder", "/Work/Inbox zero", "-1"]);
    let out = run_pl_ok(tmp.path(), &["list", "/Work"]);
    assert!(out.starts_with("[ ] Inbox zero"));
}

#[test]
fn test_clear_skips_locked() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["done", "/Work/Report/Draft"]);
    run_pl_ok(tmp.path(), &["done", "/Home/Laundry"]);
    run_pl_ok(tmp.path(), &["lock", "/Home/Laundry"]);

    let out = run_pl_ok(tmp.path(), &["clear"]);
    assert!(out.contains("removed 1 task(s)"));
    assert!(out.contains("skipped locked: /Home/Laundry"));

    let list = run_pl_ok(tmp.path(), &["list"]);
    assert!(!list.contains("Draft"));
    assert!(list.contains("[x] Laundry [locked]"));
}

#[test]
fn test_rm_locked_is_refused_by_default() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["lock", "/Home/Laundry"]);
    run_pl_err(tmp.path(), &["rm", "/Home"]);

    fs::write(
        tmp.path().join("config.toml"),
        "[tasks]\nlocked_delete = \"allow\"\n",
    )
    .unwrap();
    let out = run_pl_ok(tmp.path(), &["rm", "/Home"]);
    assert!(out.contains("deleted 4 task(s)"));
}

#[test]
fn test_dup_copies_subtree() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["dup", "/Work/Report"]);
    let out = run_pl_ok(tmp.path(), &["list", "/Work"]);
    assert_eq!(out.matches("Draft").count(), 2);
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[test]
fn test_complete() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["complete", "/Home/gro"]);
    assert_eq!(out.trim(), r#"/Home/"Groceries / weekly""#);

    let out = run_pl_ok(tmp.path(), &["complete", "/Work/"]);
    assert_eq!(out.lines().collect::<Vec<_>>(), vec!["/Work/Report", "/Work/Email"]);
}

#[test]
fn test_search() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["search", "^(Milk|Draft)$"]);
    assert!(out.contains("/Work/Report/Draft"));
    assert!(out.contains("Milk"));
}

#[test]
fn test_tags() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["tag", "new", "errands", "--color", "green"]);
    run_pl_ok(tmp.path(), &["tag", "add", "/Home/Laundry", "errands"]);
    let out = run_pl_ok(tmp.path(), &["tag", "list"]);
    assert!(out.contains("#errands (green) 1 task(s)"));

    let list = run_pl_ok(tmp.path(), &["list", "/Home"]);
    assert!(list.contains("Laundry #errands"));

    run_pl_err(tmp.path(), &["tag", "new", "x", "--color", "mauve"]);
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[test]
fn test_template_apply_is_idempotent() {
    let tmp = seeded();
    run_pl_ok(tmp.path(), &["template", "new", "Weekly"]);
    run_pl_ok(tmp.path(), &["add", "--template", "Weekly", "/Work/Report/Draft"]);
    run_pl_ok(tmp.path(), &["add", "--template", "Weekly", "/Review"]);

    let first = run_pl_ok(tmp.path(), &["template", "apply", "Weekly"]);
    assert!(first.contains("created 1 task(s), matched 3"));
    let second = run_pl_ok(tmp.path(), &["template", "apply", "Weekly"]);
    assert!(second.contains("created 0 task(s), matched 4"));

    let out = run_pl_ok(tmp.path(), &["list", "--template", "Weekly"]);
    assert!(out.contains("Review"));
}

#[test]
fn test_unknown_template() {
    let tmp = seeded();
    let err = run_pl_err(tmp.path(), &["list", "--template", "Nope"]);
    assert!(err.contains("template not found: Nope"));
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[test]
fn test_preserve_round_trip_between_directories() {
    let source = seeded();
    run_pl_ok(source.path(), &["lock", "/Home/Laundry"]);
    run_pl_ok(source.path(), &["template", "new", "Weekly", "--from", "/Work"]);
    let backup_file = source.path().join("backup.json");
    run_pl_ok(
        source.path(),
        &["export", "--backup", "-o", backup_file.to_str().unwrap()],
    );
    let exported = run_pl_ok(source.path(), &["export", "--backup"]);

    let target = tempfile::TempDir::new().unwrap();
    let out = run_pl_ok(
        target.path(),
        &["import", "--preserve", backup_file.to_str().unwrap()],
    );
    assert!(out.contains("1 template(s)"));
    assert_eq!(run_pl_ok(target.path(), &["export", "--backup"]), exported);
}

#[test]
fn test_fresh_import_appends_copies() {
    let tmp = seeded();
    let file = tmp.path().join("work.json");
    run_pl_ok(
        tmp.path(),
        &["export", "--path", "/Work", "-o", file.to_str().unwrap()],
    );
    let out = run_pl_ok(tmp.path(), &["import", file.to_str().unwrap(), "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["total"], 4);
    assert_eq!(parsed["roots"], serde_json::json!(["/Work"]));

    let preserve = run_pl_err(tmp.path(), &["import", "--preserve", file.to_str().unwrap()]);
    assert!(preserve.starts_with("error:"));
}

#[test]
fn test_check() {
    let tmp = seeded();
    let out = run_pl_ok(tmp.path(), &["check"]);
    assert!(out.contains("checklist is valid"));
}

#[test]
fn test_concurrent_adds_are_all_kept() {
    let tmp = seeded();
    let dir = tmp.path().to_path_buf();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dir = dir.clone();
            std::thread::spawn(move || run_pl_ok(&dir, &["add", &format!("/Batch/item {i}")]))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let out = run_pl_ok(tmp.path(), &["list", "/Batch"]);
    for i in 0..4 {
        assert!(out.contains(&format!("item {i}")), "missing item {i} in:\n{out}");
    }
}
