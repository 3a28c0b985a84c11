mod init;
pub use init::cmd_init;

use std::error::Error;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::state::{self, UiState};
use crate::io::store::{self, JsonFileStore};
use crate::model::checklist::Checklist;
use crate::model::config::Config;
use crate::model::id::{TagId, TaskId};
use crate::model::tag::ColorKey;
use crate::ops::import::ImportOptions;
use crate::ops::search::SearchScope;
use crate::ops::session::{Session, TaskView};
use crate::ops::tree_ops::{self, InsertPosition};
use crate::ops::{complete, export, import, resolve, search, tag_ops, template_ops};
use crate::parse::path::{join_path, tokenize};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, data_dir: PathBuf, config: Config) -> Result<(), Box<dyn Error>> {
    let json = cli.json;
    if let Commands::Init(args) = cli.command {
        return cmd_init(&data_dir, args);
    }

    let ctx = Context::open(data_dir, config, json)?;
    match cli.command {
        Commands::Init(_) => Ok(()),

        // Read commands
        Commands::List(args) => cmd_list(&ctx, args),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Complete(args) => cmd_complete(&ctx, args),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::Export(args) => cmd_export(&ctx, args),
        Commands::Check => cmd_check(&ctx),

        // Write commands
        Commands::Add(args) => cmd_add(&ctx, args),
        Commands::Insert(args) => cmd_insert(&ctx, args),
        Commands::Done(args) => cmd_done(&ctx, args),
        Commands::Toggle(args) => cmd_toggle(&ctx, args),
        Commands::Lock(args) => cmd_lock(&ctx, args),
        Commands::Rename(args) => cmd_rename(&ctx, args),
        Commands::Mv(args) => cmd_mv(&ctx, args),
        Commands::Reorder(args) => cmd_reorder(&ctx, args),
        Commands::Dup(args) => cmd_dup(&ctx, args),
        Commands::Rm(args) => cmd_rm(&ctx, args),
        Commands::Clear(args) => cmd_clear(&ctx, args),
        Commands::Import(args) => cmd_import(&ctx, args),

        // View state
        Commands::Collapse(args) => cmd_collapse(&ctx, args, true),
        Commands::Expand(args) => cmd_collapse(&ctx, args, false),

        Commands::Tag(args) => cmd_tag(&ctx, args),
        Commands::Template(args) => cmd_template(&ctx, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Context {
    data_dir: PathBuf,
    session: Session<JsonFileStore>,
    json: bool,
}

impl Context {
    fn open(data_dir: PathBuf, config: Config, json: bool) -> Result<Self, Box<dyn Error>> {
        let store = JsonFileStore::open(&data_dir)?;
        Ok(Context {
            session: Session::open(store, config),
            data_dir,
            json,
        })
    }

    fn config(&self) -> &Config {
        self.session.config()
    }

    fn ui_state(&self) -> UiState {
        state::read_ui_state(&self.data_dir).unwrap_or_default()
    }

    fn save_ui_state(&self, ui: &mut UiState) -> Result<(), Box<dyn Error>> {
        self.session.read(|list| ui.prune(list))?;
        state::write_ui_state(&self.data_dir, ui)?;
        Ok(())
    }

    /// Focus `id` and expand its ancestors
    fn focus(&self, id: TaskId) -> Result<(), Box<dyn Error>> {
        let mut ui = self.ui_state();
        self.session.read(|list| ui.reveal(list, id))?;
        self.save_ui_state(&mut ui)
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<(), Box<dyn Error>> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Where paths start: a template's content root, or the live top level
fn anchor_for(list: &Checklist, template: Option<&str>) -> Result<Option<TaskId>, Box<dyn Error>> {
    match template {
        None => Ok(None),
        Some(name) => {
            let found = template_ops::find_template(list, name)
                .ok_or_else(|| format!("template not found: {}", name))?;
            Ok(Some(found.root))
        }
    }
}

/// Find an existing task by path
fn find_task(list: &Checklist, template: Option<&str>, path: &str) -> Result<TaskId, Box<dyn Error>> {
    let anchor = anchor_for(list, template)?;
    Ok(resolve::locate(list, anchor, path)?)
}

/// Like [`find_task`], but a blank path or `/` names the anchor itself
fn find_parent(list: &Checklist, template: Option<&str>, path: &str) -> Result<Option<TaskId>, Box<dyn Error>> {
    let anchor = anchor_for(list, template)?;
    if tokenize(path)?.is_empty() {
        return Ok(anchor);
    }
    Ok(Some(resolve::locate(list, anchor, path)?))
}

fn find_tag_id(list: &Checklist, phrase: &str) -> Result<TagId, Box<dyn Error>> {
    Ok(tag_ops::find_tag(list, phrase.trim())
        .ok_or_else(|| format!("tag not found: {}", phrase))?
        .id)
}

fn parse_color(s: &str) -> Result<ColorKey, Box<dyn Error>> {
    ColorKey::parse_key(s).ok_or_else(|| {
        let names: Vec<&str> = ColorKey::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown color '{}' (expected: {})", s, names.join(", ")).into()
    })
}

fn path_string(list: &Checklist, id: TaskId) -> String {
    join_path(&list.path_of(id))
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs) -> Result<(), Box<dyn Error>> {
    let ui = ctx.ui_state();
    ctx.session.read(|list| -> Result<(), Box<dyn Error>> {
        let parent = match &args.path {
            Some(path) => find_parent(list, args.template.as_deref(), path)?,
            None => anchor_for(list, args.template.as_deref())?,
        };
        if ctx.json {
            let tasks: Vec<TaskJson> = list
                .children_of(parent)
                .iter()
                .filter_map(|id| task_to_json(list, *id))
                .collect();
            return ctx.print_json(&tasks);
        }
        for line in format_tree(list, parent, &ui, args.all) {
            println!("{}", line);
        }
        Ok(())
    })?
}

fn cmd_show(ctx: &Context, args: PathArgs) -> Result<(), Box<dyn Error>> {
    let view = ctx.session.read(|list| -> Result<Option<TaskView>, Box<dyn Error>> {
        let id = find_task(list, args.template.as_deref(), &args.path)?;
        Ok(TaskView::of(list, id))
    })??;
    let view = view.ok_or_else(|| format!("task not found: {}", args.path))?;
    if ctx.json {
        return ctx.print_json(&view);
    }
    for line in format_task_detail(&view) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_complete(ctx: &Context, args: CompleteArgs) -> Result<(), Box<dyn Error>> {
    let options = ctx.config().complete.clone();
    let found = ctx.session.read(|list| -> Result<_, Box<dyn Error>> {
        let anchor = anchor_for(list, args.template.as_deref())?;
        Ok(complete::complete(list, anchor, &args.partial, &options)?)
    })??;

    if ctx.json {
        let out: Vec<CompletionJson> = found.iter().map(completion_to_json).collect();
        return ctx.print_json(&out);
    }
    for c in &found {
        println!("{}", c.path);
    }
    Ok(())
}

fn cmd_search(ctx: &Context, args: SearchArgs) -> Result<(), Box<dyn Error>> {
    let re = Regex::new(&args.pattern)?;
    let scope = if args.all {
        SearchScope::All
    } else if args.templates {
        SearchScope::Templates
    } else {
        SearchScope::Live
    };
    let hits = ctx.session.read(|list| search::search_tasks(list, &re, scope))?;

    let mut ui = ctx.ui_state();
    ui.last_search = Some(args.pattern.clone());
    state::write_ui_state(&ctx.data_dir, &ui)?;

    if ctx.json {
        let out: Vec<SearchHitJson> = hits.iter().map(hit_to_json).collect();
        return ctx.print_json(&out);
    }
    for hit in &hits {
        println!("{}", format_search_hit(hit));
    }
    Ok(())
}

fn cmd_export(ctx: &Context, args: ExportArgs) -> Result<(), Box<dyn Error>> {
    let text = ctx.session.read(|list| -> Result<String, Box<dyn Error>> {
        if args.backup {
            return Ok(export::to_json(&export::export_backup(list))?);
        }
        let scope = match &args.path {
            Some(path) => Some(find_task(list, None, path)?),
            None => None,
        };
        Ok(export::to_json(&export::export_tasks(list, scope))?)
    })??;

    match &args.output {
        Some(file) => {
            store::atomic_write(Path::new(file), text.as_bytes())?;
            tracing::info!(file = %file, "exported");
        }
        None => println!("{}", text),
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckJson {
    valid: bool,
    problems: Vec<String>,
}

fn cmd_check(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let problems = ctx.session.read(|list| list.invariant_violations())?;
    let valid = problems.is_empty();
    if ctx.json {
        return ctx.print_json(&CheckJson { valid, problems });
    }
    for problem in &problems {
        println!("  {}", problem);
    }
    if valid {
        println!("✓ checklist is valid");
    } else {
        println!("✗ checklist has {} problem(s)", problems.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AddedJson {
    id: TaskId,
    path: String,
    created: usize,
}

fn cmd_add(ctx: &Context, args: AddArgs) -> Result<(), Box<dyn Error>> {
    let resolution = ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
        let anchor = anchor_for(list, args.template.as_deref())?;
        Ok(resolve::ingest(list, anchor, &args.path)?)
    })?;
    ctx.focus(resolution.leaf)?;

    let path = ctx.session.read(|list| path_string(list, resolution.leaf))?;
    if ctx.json {
        return ctx.print_json(&AddedJson {
            id: resolution.leaf,
            path,
            created: resolution.created.len(),
        });
    }
    println!("{}", path);
    Ok(())
}

fn cmd_insert(ctx: &Context, args: InsertArgs) -> Result<(), Box<dyn Error>> {
    let template = args.template.as_deref();
    let id = ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
        let parent = match &args.parent {
            Some(path) => find_parent(list, template, path)?,
            None => anchor_for(list, template)?,
        };
        let position = match &args.after {
            Some(path) => InsertPosition::After(find_task(list, template, path)?),
            None if args.top => InsertPosition::Top,
            None => InsertPosition::Bottom,
        };
        Ok(tree_ops::insert_child(list, parent, &args.name, position)?)
    })?;
    ctx.focus(id)?;
    let path = ctx.session.read(|list| path_string(list, id))?;
    println!("{}", path);
    Ok(())
}

fn cmd_done(ctx: &Context, args: DoneArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
        let id = find_task(list, target.template.as_deref(), &target.path)?;
        tree_ops::set_completed(list, id, !args.undo)?;
        Ok(())
    })?;
    Ok(())
}

fn cmd_toggle(ctx: &Context, args: PathArgs) -> Result<(), Box<dyn Error>> {
    let completed = ctx.session.apply(|list| -> Result<bool, Box<dyn Error>> {
        let id = find_task(list, args.template.as_deref(), &args.path)?;
        Ok(tree_ops::toggle_completed(list, id)?)
    })?;
    println!("{}", if completed { "completed" } else { "not completed" });
    Ok(())
}

fn cmd_lock(ctx: &Context, args: LockArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
        let id = find_task(list, target.template.as_deref(), &target.path)?;
        tree_ops::set_locked(list, id, !args.unlock)?;
        Ok(())
    })?;
    Ok(())
}

fn cmd_rename(ctx: &Context, args: RenameArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    let id = ctx.session.apply(|list| -> Result<TaskId, Box<dyn Error>> {
        let id = find_task(list, target.template.as_deref(), &target.path)?;
        tree_ops::rename(list, id, &args.name)?;
        Ok(id)
    })?;
    let path = ctx.session.read(|list| path_string(list, id))?;
    println!("{}", path);
    Ok(())
}

fn cmd_mv(ctx: &Context, args: MvArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    let template = target.template.as_deref();
    let id = ctx.session.apply(|list| -> Result<TaskId, Box<dyn Error>> {
        let id = find_task(list, template, &target.path)?;
        let new_parent = find_parent(list, template, &args.to)?;
        let before = match &args.before {
            Some(path) => Some(find_task(list, template, path)?),
            None => None,
        };
        tree_ops::move_node(list, id, new_parent, before)?;
        Ok(id)
    })?;
    ctx.focus(id)?;
    let path = ctx.session.read(|list| path_string(list, id))?;
    println!("{}", path);
    Ok(())
}

fn cmd_reorder(ctx: &Context, args: ReorderArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
        let id = find_task(list, target.template.as_deref(), &target.path)?;
        tree_ops::reorder(list, id, args.offset)?;
        Ok(())
    })?;
    Ok(())
}

fn cmd_dup(ctx: &Context, args: DupArgs) -> Result<(), Box<dyn Error>> {
    let target = &args.target;
    let copy = ctx.session.apply(|list| -> Result<TaskId, Box<dyn Error>> {
        let id = find_task(list, target.template.as_deref(), &target.path)?;
        Ok(tree_ops::duplicate(list, id, !args.shallow)?)
    })?;
    ctx.focus(copy)?;
    let path = ctx.session.read(|list| path_string(list, copy))?;
    println!("{}", path);
    Ok(())
}

fn cmd_rm(ctx: &Context, args: PathArgs) -> Result<(), Box<dyn Error>> {
    let policy = ctx.config().tasks.locked_delete;
    let removed = ctx.session.apply(|list| -> Result<Vec<TaskId>, Box<dyn Error>> {
        let id = find_task(list, args.template.as_deref(), &args.path)?;
        Ok(tree_ops::delete(list, id, policy)?)
    })?;
    let mut ui = ctx.ui_state();
    ctx.save_ui_state(&mut ui)?;
    println!("deleted {} task(s)", removed.len());
    Ok(())
}

fn cmd_clear(ctx: &Context, args: ClearArgs) -> Result<(), Box<dyn Error>> {
    let result = ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
        let scope = match &args.path {
            Some(path) => find_parent(list, None, path)?,
            None => None,
        };
        Ok(tree_ops::clear_completed(list, scope)?)
    })?;
    let mut ui = ctx.ui_state();
    ctx.save_ui_state(&mut ui)?;

    let out = ctx.session.read(|list| clear_to_json(list, &result))?;
    if ctx.json {
        return ctx.print_json(&out);
    }
    println!("removed {} task(s)", out.removed);
    for path in &out.skipped_locked {
        println!("  skipped locked: {}", path);
    }
    for path in &out.kept_for_lock {
        println!("  kept (locked subtask): {}", path);
    }
    Ok(())
}

#[derive(Serialize)]
struct ImportJson {
    roots: Vec<String>,
    templates: usize,
    total: usize,
}

fn cmd_import(ctx: &Context, args: ImportArgs) -> Result<(), Box<dyn Error>> {
    let text = if args.file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file).map_err(|e| format!("could not read {}: {}", args.file, e))?
    };
    let payload = import::decode(&text)?;
    let preserve_metadata = args.preserve || (ctx.config().import.preserve_metadata && !args.fresh);

    let result = ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
        let target = match &args.to {
            Some(path) => Some(find_task(list, None, path)?),
            None => None,
        };
        let options = ImportOptions {
            preserve_metadata,
            target,
        };
        Ok(import::import_payload(list, payload, options)?)
    })?;

    let roots = ctx.session.read(|list| {
        result
            .roots
            .iter()
            .map(|id| path_string(list, *id))
            .collect::<Vec<_>>()
    })?;
    if ctx.json {
        return ctx.print_json(&ImportJson {
            roots,
            templates: result.templates.len(),
            total: result.total_count,
        });
    }
    println!(
        "imported {} task(s), {} template(s)",
        result.total_count,
        result.templates.len()
    );
    for path in &roots {
        println!("  {}", path);
    }
    Ok(())
}

fn cmd_collapse(ctx: &Context, args: PathArgs, collapsed: bool) -> Result<(), Box<dyn Error>> {
    let id = ctx
        .session
        .read(|list| find_task(list, args.template.as_deref(), &args.path))??;
    let mut ui = ctx.ui_state();
    ui.set_collapsed(id, collapsed);
    ctx.save_ui_state(&mut ui)
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

fn cmd_tag(ctx: &Context, args: TagCmd) -> Result<(), Box<dyn Error>> {
    match args.action {
        TagAction::List => {
            let tags = ctx
                .session
                .read(|list| list.tags().iter().map(|t| tag_to_json(list, t)).collect::<Vec<_>>())?;
            if ctx.json {
                return ctx.print_json(&tags);
            }
            for tag in &tags {
                println!("#{} ({}) {} task(s)", tag.phrase, tag.color, tag.tasks);
            }
            Ok(())
        }
        TagAction::New(a) => {
            let color = parse_color(&a.color)?;
            ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
                Ok(tag_ops::create_tag(list, &a.phrase, color)?)
            })?;
            Ok(())
        }
        TagAction::Rename(a) => ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
            let id = find_tag_id(list, &a.phrase)?;
            tag_ops::rename_tag(list, id, &a.new_phrase)?;
            Ok(())
        }),
        TagAction::Color(a) => {
            let color = parse_color(&a.color)?;
            ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
                let id = find_tag_id(list, &a.phrase)?;
                tag_ops::recolor_tag(list, id, color)?;
                Ok(())
            })
        }
        TagAction::Delete(a) => {
            let untagged = ctx.session.apply(|list| -> Result<usize, Box<dyn Error>> {
                let id = find_tag_id(list, &a.phrase)?;
                Ok(tag_ops::delete_tag(list, id)?)
            })?;
            println!("deleted #{} from {} task(s)", a.phrase.trim(), untagged);
            Ok(())
        }
        TagAction::Add(a) => ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
            let task = find_task(list, None, &a.path)?;
            let tag = tag_ops::ensure_tag(list, &a.phrase)?;
            tag_ops::tag_task(list, task, tag)?;
            Ok(())
        }),
        TagAction::Rm(a) => ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
            let task = find_task(list, None, &a.path)?;
            let tag = find_tag_id(list, &a.phrase)?;
            tag_ops::untag_task(list, task, tag)?;
            Ok(())
        }),
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn cmd_template(ctx: &Context, args: TemplateCmd) -> Result<(), Box<dyn Error>> {
    match args.action {
        TemplateAction::List => {
            let templates = ctx.session.read(|list| {
                list.templates()
                    .iter()
                    .map(|t| TemplateJson {
                        name: t.name.clone(),
                        tasks: list.subtree(t.root).len() - 1,
                    })
                    .collect::<Vec<_>>()
            })?;
            if ctx.json {
                return ctx.print_json(&templates);
            }
            for t in &templates {
                println!("{} ({} task(s))", t.name, t.tasks);
            }
            Ok(())
        }
        TemplateAction::New(a) => {
            ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
                let sources = a
                    .from
                    .iter()
                    .map(|path| find_task(list, None, path))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(template_ops::create_template_from(list, &a.name, &sources)?)
            })?;
            Ok(())
        }
        TemplateAction::Rename(a) => ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
            let id = template_ops::find_template(list, &a.name)
                .ok_or_else(|| format!("template not found: {}", a.name))?
                .id;
            template_ops::rename_template(list, id, &a.new_name)?;
            Ok(())
        }),
        TemplateAction::Delete(a) => ctx.session.apply(|list| -> Result<(), Box<dyn Error>> {
            let id = template_ops::find_template(list, &a.name)
                .ok_or_else(|| format!("template not found: {}", a.name))?
                .id;
            template_ops::delete_template(list, id)?;
            Ok(())
        }),
        TemplateAction::Apply(a) => {
            let result = ctx.session.apply(|list| -> Result<_, Box<dyn Error>> {
                let id = template_ops::find_template(list, &a.name)
                    .ok_or_else(|| format!("template not found: {}", a.name))?
                    .id;
                let target = match &a.to {
                    Some(path) => Some(find_task(list, None, path)?),
                    None => None,
                };
                Ok(template_ops::apply_template(list, id, target)?)
            })?;
            println!(
                "created {} task(s), matched {}",
                result.created.len(),
                result.matched
            );
            Ok(())
        }
    }
}
