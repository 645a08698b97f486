mod edit;
mod init;
mod watch;

pub use init::cmd_init;

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;
use indexmap::IndexMap;

/// Global override for project directory (set by -C flag)
static PROJECT_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::project_io::{self, Project, ProjectError};
use crate::io::store::FileStore;
use crate::ops::columns::{self, Column, DEFAULT_COLUMNS, DisplayOptions};
use crate::ops::filter::{self, FilterSet};
use crate::ops::tree::TreeIndex;
use crate::ops::view::build_view;
use crate::ops::window::FetchScope;
use crate::ops::{check, rollup, search, stats};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for load_project_cwd()
    if let Some(ref dir) = cli.project_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        PROJECT_DIR_OVERRIDE
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(abs);
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args),

        // Read commands
        Commands::List(args) => cmd_list(args, json),
        Commands::Values(args) => cmd_values(args, json),
        Commands::Show(args) => cmd_show(args, json),
        Commands::Rollup(args) => cmd_rollup(args, json),
        Commands::Columns(args) => cmd_columns(args, json),
        Commands::Search(args) => cmd_search(args, json),
        Commands::Check => cmd_check(json),
        Commands::Stats(args) => cmd_stats(args, json),

        // Write commands
        Commands::Add(args) => edit::cmd_add(args),
        Commands::Set(args) => edit::cmd_set(args),
        Commands::Rm(args) => edit::cmd_rm(args),
        Commands::Clear(args) => edit::cmd_clear(args),
        Commands::Import(args) => edit::cmd_import(args),
        Commands::Export => edit::cmd_export(),

        Commands::Watch(args) => watch::cmd_watch(args, json),
        Commands::Preset(cmd) => cmd_preset(cmd, json),
    }
}

/// Directory the project search starts from: `-C` if given, else cwd
fn start_dir() -> Result<PathBuf, ProjectError> {
    match PROJECT_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
    {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(ProjectError::IoError),
    }
}

fn load_project_cwd() -> Result<Project, ProjectError> {
    let root = project_io::discover_project(&start_dir()?)?;
    project_io::load_project(&root)
}

fn display_options(project: &Project) -> DisplayOptions {
    DisplayOptions::from(&project.config.display)
}

/// Preset first, then each `--filter` on top of it
fn build_filters(project: &Project, args: &ViewArgs) -> Result<FilterSet, Box<dyn std::error::Error>> {
    let mut filters = FilterSet::new();
    if let Some(name) = &args.preset {
        let preset = project
            .config
            .presets
            .get(name)
            .ok_or_else(|| format!("no preset named \"{}\" (see `wbs preset list`)", name))?;
        for (column, needle) in preset {
            filters.set(column, needle)?;
        }
    }
    for spec in &args.filters {
        filters.set_spec(spec)?;
    }
    Ok(filters)
}

fn fetch_scope(args: &ViewArgs) -> Result<FetchScope, String> {
    match &args.month {
        Some(month) => FetchScope::month(month),
        None => Ok(FetchScope::All),
    }
}

/// `--columns`, else `display.columns`, else the built-in default set
fn resolve_columns(
    project: &Project,
    requested: &[String],
) -> Result<Vec<&'static Column>, Box<dyn std::error::Error>> {
    let keys: Vec<&str> = if !requested.is_empty() {
        requested.iter().map(|s| s.trim()).collect()
    } else if !project.config.display.columns.is_empty() {
        project.config.display.columns.iter().map(String::as_str).collect()
    } else {
        DEFAULT_COLUMNS.to_vec()
    };
    for key in &keys {
        if columns::column(key).is_none() {
            return Err(format!("unknown column \"{}\" (see `wbs columns`)", key).into());
        }
    }
    Ok(columns::resolve(&keys)?)
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let filters = build_filters(&project, &args.view)?;
    let scope = fetch_scope(&args.view)?;
    let cols = resolve_columns(&project, &args.columns)?;
    let nodes = scope.apply(FileStore::open(&project.wbs_dir).load()?);

    let view = build_view(
        &nodes,
        &filters,
        &cols,
        &display_options(&project),
        &project.config.display.breadcrumb_separator,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    if view.rows.is_empty() {
        println!("{}", if view.total == 0 { "no nodes" } else { "no matching rows" });
        return Ok(());
    }
    for line in format_table(&view, args.max_width) {
        println!("{}", line);
    }
    println!();
    println!("{}", format_table_footer(&view));
    Ok(())
}

fn cmd_values(args: ValuesArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let filters = build_filters(&project, &args.view)?;
    let scope = fetch_scope(&args.view)?;
    let nodes = scope.apply(FileStore::open(&project.wbs_dir).load()?);
    let index = TreeIndex::build(&nodes);
    let limit = args.limit.unwrap_or(project.config.display.picker_limit);

    let values = filter::available_values(
        &index,
        &filters,
        &args.column,
        &display_options(&project),
        limit,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for value in &values {
            println!("{}", value);
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let nodes = FileStore::open(&project.wbs_dir).load()?;
    let index = TreeIndex::build(&nodes);
    let idx = index
        .find_code(&args.code)
        .ok_or_else(|| format!("no node with code {}", args.code))?;
    let node = index.node(idx);
    let opts = display_options(&project);

    let values: IndexMap<&'static str, String> = columns::COLUMNS
        .iter()
        .map(|c| (c.key, c.text(&index, idx, &opts)))
        .collect();
    let detail = NodeDetailJson {
        node,
        breadcrumb: index.breadcrumb(idx, &project.config.display.breadcrumb_separator),
        children: index.children(idx).len(),
        orphan: index.is_orphan(idx),
        values,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let kind = if node.is_section { "section" } else { "task" };
    println!("{} {} ({}, id {})", node.code, node.name, kind, node.id);
    if !detail.breadcrumb.is_empty() {
        println!("in {}", detail.breadcrumb);
    }
    if detail.orphan {
        println!("parent {} not found", node.parent_code.as_deref().unwrap_or("?"));
    }
    if node.is_section {
        println!("{} children", detail.children);
    }
    println!();
    let width = columns::COLUMNS.iter().map(|c| c.label.len()).max().unwrap_or(0);
    for c in columns::COLUMNS {
        let value = &detail.values[c.key];
        if value.is_empty() || c.key == "code" || c.key == "name" {
            continue;
        }
        println!("  {:<width$}  {}", c.label, value, width = width);
    }
    Ok(())
}

fn cmd_rollup(args: RollupArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let nodes = FileStore::open(&project.wbs_dir).load()?;
    let index = TreeIndex::build(&nodes);

    let targets: Vec<usize> = match &args.code {
        Some(code) => vec![
            index
                .find_code(code)
                .ok_or_else(|| format!("no node with code {}", code))?,
        ],
        None => index.roots().to_vec(),
    };
    let summaries: Vec<_> = targets.iter().map(|&i| rollup::summarize(&index, i)).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    for (n, summary) in summaries.iter().enumerate() {
        if n > 0 {
            println!();
        }
        for line in format_rollup(summary) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_columns(args: ColumnsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !args.set_default.is_empty() {
        let project = load_project_cwd()?;
        let cols = resolve_columns(&project, &args.set_default)?;
        let keys: Vec<&str> = cols.iter().map(|c| c.key).collect();
        let (_, mut doc) = config_io::read_config(&project.wbs_dir)?;
        config_io::set_default_columns(&mut doc, &keys);
        config_io::write_config(&project.wbs_dir, &doc)?;
        println!("default columns: {}", keys.join(","));
        return Ok(());
    }

    let list: Vec<ColumnJson> = columns::COLUMNS
        .iter()
        .map(|c| ColumnJson {
            key: c.key,
            label: c.label,
            rolls_up: c.rolls_up,
        })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    let width = list.iter().map(|c| c.key.len()).max().unwrap_or(0);
    for c in &list {
        let marker = if DEFAULT_COLUMNS.contains(&c.key) { "*" } else { " " };
        println!("{} {:<width$}  {}", marker, c.key, c.label, width = width);
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let nodes = FileStore::open(&project.wbs_dir).load()?;
    let re = search::compile_pattern(&args.pattern);
    let hits = search::search_nodes(&nodes, &re);

    let rows: Vec<SearchHitJson> = hits
        .iter()
        .filter_map(|hit| {
            let node = nodes.iter().find(|n| n.id == hit.id)?;
            let text = match hit.field {
                search::MatchField::Code => node.code.clone(),
                search::MatchField::Name => node.name.clone(),
                search::MatchField::Unit => node.unit.clone().unwrap_or_default(),
                search::MatchField::Executor => node.executor.clone().unwrap_or_default(),
            };
            Some(SearchHitJson {
                id: hit.id,
                code: hit.code.clone(),
                field: hit.field.as_str().to_string(),
                text,
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in &rows {
        if row.field == "code" {
            println!("{}", row.code);
        } else {
            println!("{}  {}: {}", row.code, row.field, row.text);
        }
    }
    Ok(())
}

fn cmd_check(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let nodes = FileStore::open(&project.wbs_dir).load()?;
    let result = check::check_nodes(&nodes);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_check(&result) {
            println!("{}", line);
        }
    }
    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_stats(args: StatsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let nodes = FileStore::open(&project.wbs_dir).load()?;
    let today = match &args.today {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("invalid date \"{}\": expected YYYY-MM-DD", s))?,
        None => chrono::Local::now().date_naive(),
    };
    let result = stats::schedule_stats(&nodes, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_stats(&result) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

fn cmd_preset(cmd: PresetCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    match cmd.action {
        PresetAction::Save(args) => {
            // Validate through a FilterSet so bad columns never reach the file
            let mut filters = FilterSet::new();
            for spec in &args.filters {
                filters.set_spec(spec)?;
            }
            let (_, mut doc) = config_io::read_config(&project.wbs_dir)?;
            config_io::save_preset(&mut doc, &args.name, filters.iter());
            config_io::write_config(&project.wbs_dir, &doc)?;
            println!("saved preset {} ({} filters)", args.name, filters.active_count());
        }
        PresetAction::List => {
            let presets: Vec<PresetJson> = project
                .config
                .presets
                .iter()
                .map(|(name, filters)| PresetJson { name, filters })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else if presets.is_empty() {
                println!("no presets");
            } else {
                for preset in &presets {
                    let filters: Vec<String> = preset
                        .filters
                        .iter()
                        .map(|(c, n)| format!("{}={}", c, n))
                        .collect();
                    println!("{}  {}", preset.name, filters.join(" "));
                }
            }
        }
        PresetAction::Rm(args) => {
            let (_, mut doc) = config_io::read_config(&project.wbs_dir)?;
            if !config_io::remove_preset(&mut doc, &args.name) {
                return Err(format!("no preset named \"{}\"", args.name).into());
            }
            config_io::write_config(&project.wbs_dir, &doc)?;
            println!("removed preset {}", args.name);
        }
    }
    Ok(())
}
