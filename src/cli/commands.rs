use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pl", about = concat!("pathlist v", env!("CARGO_PKG_VERSION"), " - nested checklists, one path at a time"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a default config.toml
    Init(InitArgs),
    /// Add a path of tasks, creating whatever is missing
    Add(AddArgs),
    /// Insert one task at a position among its siblings
    Insert(InsertArgs),
    /// Show the task tree
    List(ListArgs),
    /// Show task details
    Show(PathArgs),
    /// Mark a task completed (or not, with --undo)
    Done(DoneArgs),
    /// Flip a task's completion
    Toggle(PathArgs),
    /// Lock a task against bulk clear (or unlock)
    Lock(LockArgs),
    /// Rename a task
    Rename(RenameArgs),
    /// Move a task under a new parent
    Mv(MvArgs),
    /// Shift a task up (negative) or down among its siblings
    Reorder(ReorderArgs),
    /// Duplicate a task next to itself
    Dup(DupArgs),
    /// Delete a task and its subtasks
    Rm(PathArgs),
    /// Remove completed, unlocked tasks
    Clear(ClearArgs),
    /// Suggest completions for a partially typed path
    Complete(CompleteArgs),
    /// Search task names and tags by regex
    Search(SearchArgs),
    /// Hide a task's subtasks in `list`
    Collapse(PathArgs),
    /// Show a task's subtasks in `list`
    Expand(PathArgs),
    /// Tag management and tagging
    Tag(TagCmd),
    /// Template management
    Template(TemplateCmd),
    /// Export tasks as JSON
    Export(ExportArgs),
    /// Import tasks from a JSON export or backup
    Import(ImportArgs),
    /// Validate checklist integrity
    Check,
}

// ---------------------------------------------------------------------------
// Shared args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PathArgs {
    /// Task path, e.g. /Work/"Follow up"
    pub path: String,
    /// Resolve the path inside this template instead of the live list
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config.toml
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Task command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Path to materialize
    pub path: String,
    /// Add inside this template
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct InsertArgs {
    /// Task name (taken literally, not as a path)
    pub name: String,
    /// Parent path (default: top level)
    #[arg(long)]
    pub parent: Option<String>,
    /// Insert at the top of the sibling group
    #[arg(long, conflicts_with = "after")]
    pub top: bool,
    /// Insert after this sibling (path)
    #[arg(long)]
    pub after: Option<String>,
    /// Insert inside this template
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only list below this path
    pub path: Option<String>,
    /// List this template's content
    #[arg(long)]
    pub template: Option<String>,
    /// Ignore collapse state
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct DoneArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// Mark not completed instead
    #[arg(long)]
    pub undo: bool,
}

#[derive(Args)]
pub struct LockArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// Unlock instead
    #[arg(long)]
    pub unlock: bool,
}

#[derive(Args)]
pub struct RenameArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct MvArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// New parent path; `/` for the top level
    #[arg(long)]
    pub to: String,
    /// Place before this sibling (path) under the new parent
    #[arg(long)]
    pub before: Option<String>,
}

#[derive(Args)]
pub struct ReorderArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// Positions to shift; negative moves up
    #[arg(allow_hyphen_values = true)]
    pub offset: isize,
}

#[derive(Args)]
pub struct DupArgs {
    #[command(flatten)]
    pub target: PathArgs,
    /// Copy only the task, not its subtasks
    #[arg(long)]
    pub shallow: bool,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Only clear below this path
    pub path: Option<String>,
}

#[derive(Args)]
pub struct CompleteArgs {
    /// Partially typed path
    #[arg(allow_hyphen_values = true, default_value = "")]
    pub partial: String,
    /// Complete inside this template
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Search template content instead of the live list
    #[arg(long, conflicts_with = "all")]
    pub templates: bool,
    /// Search the live list and templates
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TagCmd {
    #[command(subcommand)]
    pub action: TagAction,
}

#[derive(Subcommand)]
pub enum TagAction {
    /// List tags
    List,
    /// Create a tag
    New(TagNewArgs),
    /// Rename a tag
    Rename(TagRenameArgs),
    /// Change a tag's color
    Color(TagColorArgs),
    /// Delete a tag (tasks keep existing)
    Delete(TagPhraseArg),
    /// Attach a tag to a task, creating the tag if needed
    Add(TagTaskArgs),
    /// Detach a tag from a task
    Rm(TagTaskArgs),
}

#[derive(Args)]
pub struct TagNewArgs {
    pub phrase: String,
    /// red, orange, yellow, green, teal, blue, purple, pink or gray
    #[arg(long, default_value = "blue")]
    pub color: String,
}

#[derive(Args)]
pub struct TagRenameArgs {
    pub phrase: String,
    pub new_phrase: String,
}

#[derive(Args)]
pub struct TagColorArgs {
    pub phrase: String,
    pub color: String,
}

#[derive(Args)]
pub struct TagPhraseArg {
    pub phrase: String,
}

#[derive(Args)]
pub struct TagTaskArgs {
    /// Task path
    pub path: String,
    pub phrase: String,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TemplateCmd {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List templates
    List,
    /// Create a template, optionally copying live tasks into it
    New(TemplateNewArgs),
    /// Rename a template
    Rename(TemplateRenameArgs),
    /// Delete a template and its content
    Delete(TemplateNameArg),
    /// Merge a template into the live list
    Apply(TemplateApplyArgs),
}

#[derive(Args)]
pub struct TemplateNewArgs {
    pub name: String,
    /// Live task paths to copy in (repeatable)
    #[arg(long)]
    pub from: Vec<String>,
}

#[derive(Args)]
pub struct TemplateRenameArgs {
    pub name: String,
    pub new_name: String,
}

#[derive(Args)]
pub struct TemplateNameArg {
    pub name: String,
}

#[derive(Args)]
pub struct TemplateApplyArgs {
    pub name: String,
    /// Live task to merge under (default: top level)
    #[arg(long)]
    pub to: Option<String>,
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Write a backup (tasks, templates and tags) instead of a task list
    #[arg(long, conflicts_with = "path")]
    pub backup: bool,
    /// Export only this subtree
    #[arg(long)]
    pub path: Option<String>,
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file to import; `-` reads stdin
    pub file: String,
    /// Keep ids, display orders, dates and locks (overrides config)
    #[arg(long, conflicts_with = "fresh")]
    pub preserve: bool,
    /// Assign new ids and orders (overrides config)
    #[arg(long)]
    pub fresh: bool,
    /// Live task to import under (default: top level)
    #[arg(long)]
    pub to: Option<String>,
}
