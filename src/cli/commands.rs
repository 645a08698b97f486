use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wbs", about = concat!("wbs v", env!("CARGO_PKG_VERSION"), " - work breakdown schedules with live rollups"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new wbs project in the current directory
    Init(InitArgs),
    /// Show the schedule table with rollups
    List(ListArgs),
    /// List the distinct values a column filter can take
    Values(ValuesArgs),
    /// Show one node with its breadcrumb and derived values
    Show(ShowArgs),
    /// Show rolled-up totals for a section (or every top-level section)
    Rollup(RollupArgs),
    /// List available columns
    Columns(ColumnsArgs),
    /// Search codes, names, units and executors by regex
    Search(SearchArgs),
    /// Validate the schedule
    Check,
    /// Show overall progress figures
    Stats(StatsArgs),
    /// Add a section or task
    Add(AddArgs),
    /// Change fields of a node
    Set(SetArgs),
    /// Delete a node
    Rm(RmArgs),
    /// Delete every node
    Clear(ClearArgs),
    /// Replace the schedule with nodes from a JSON file
    Import(ImportArgs),
    /// Print every node as JSON
    Export,
    /// Follow the schedule live, redrawing on every change
    Watch(WatchArgs),
    /// Manage saved filter sets
    Preset(PresetCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Project name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if wbs/ already exists (keeps nodes.json)
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

/// Filter and scope options shared by list, values and watch
#[derive(Args, Clone, Default)]
pub struct ViewArgs {
    /// Column filter as column=text (case-insensitive substring, repeatable)
    #[arg(long = "filter", short = 'f', value_name = "COLUMN=TEXT")]
    pub filters: Vec<String>,
    /// Apply a saved preset before --filter options
    #[arg(long)]
    pub preset: Option<String>,
    /// Only tasks whose period overlaps this month (YYYY-MM)
    #[arg(long)]
    pub month: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Comma-separated column keys (see `wbs columns`)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Maximum width of any column
    #[arg(long, default_value = "40")]
    pub max_width: usize,
}

#[derive(Args)]
pub struct ValuesArgs {
    /// Column to list values for
    pub column: String,
    #[command(flatten)]
    pub view: ViewArgs,
    /// Maximum number of values (default: display.picker_limit)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Node code
    pub code: String,
}

#[derive(Args)]
pub struct RollupArgs {
    /// Section code (default: every top-level node)
    pub code: Option<String>,
}

#[derive(Args)]
pub struct ColumnsArgs {
    /// Save these comma-separated keys as the default list columns
    #[arg(long, value_delimiter = ',', value_name = "KEYS")]
    pub set_default: Vec<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Compute time progress as of this date (YYYY-MM-DD, default today)
    #[arg(long)]
    pub today: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Hierarchical code, e.g. 2.1.3
    pub code: String,
    /// Display name
    pub name: String,
    /// Create a section instead of a task
    #[arg(long)]
    pub section: bool,
    /// Parent code (default: the code minus its last segment)
    #[arg(long)]
    pub parent: Option<String>,
    /// Extra fields as field=value
    #[arg(value_name = "FIELD=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct SetArgs {
    /// Node id
    pub id: i64,
    /// Fields as field=value (empty value or "-" clears)
    #[arg(required = true, value_name = "FIELD=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Node id
    pub id: i64,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Required: confirm deleting every node
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file holding an array of nodes
    pub file: String,
}

// ---------------------------------------------------------------------------
// Watch args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Comma-separated column keys (see `wbs columns`)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long)]
    pub duration: Option<u64>,
}

// ---------------------------------------------------------------------------
// Preset args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PresetCmd {
    #[command(subcommand)]
    pub action: PresetAction,
}

#[derive(Subcommand)]
pub enum PresetAction {
    /// Save filters under a name (replaces an existing preset)
    Save(PresetSaveArgs),
    /// List saved presets
    List,
    /// Remove a preset
    Rm(PresetNameArg),
}

#[derive(Args)]
pub struct PresetSaveArgs {
    /// Preset name
    pub name: String,
    /// Column filter as column=text (repeatable)
    #[arg(long = "filter", short = 'f', value_name = "COLUMN=TEXT", required = true)]
    pub filters: Vec<String>,
}

#[derive(Args)]
pub struct PresetNameArg {
    /// Preset name
    pub name: String,
}
