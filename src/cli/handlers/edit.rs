use std::fs;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::cli::commands::{AddArgs, ClearArgs, ImportArgs, RmArgs, SetArgs};
use crate::io::store::FileStore;
use crate::model::code::{SEPARATOR, compare_codes};
use crate::model::node::Node;
use crate::ops::check;
use crate::sync::NodeSource;

use super::load_project_cwd;

const NUMBER_FIELDS: &[&str] = &[
    "volume_plan",
    "volume_fact",
    "unit_price",
    "labor_per_unit",
    "machine_hours_per_unit",
];

const DATE_FIELDS: &[&str] = &[
    "start_date_contract",
    "end_date_contract",
    "start_date_plan",
    "end_date_plan",
];

/// Text fields that may be cleared
const OPTIONAL_TEXT_FIELDS: &[&str] = &["unit", "parent_code", "executor"];

/// Text fields that must stay set
const REQUIRED_TEXT_FIELDS: &[&str] = &["code", "name"];

/// Parse `field=value` into a patch entry.
///
/// Numbers accept a decimal comma; dates accept ISO (`2026-03-09`) or the
/// configured display format. An empty value or `-` clears optional fields.
pub fn parse_assignment(spec: &str, date_format: &str) -> Result<(String, Value), String> {
    let (field, raw) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got \"{}\"", spec))?;
    let field = field.trim();
    let raw = raw.trim();
    let clear = raw.is_empty() || raw == "-";

    let value = if NUMBER_FIELDS.contains(&field) {
        if clear {
            Value::Null
        } else {
            let n: f64 = raw
                .replace(',', ".")
                .parse()
                .map_err(|_| format!("{}: \"{}\" is not a number", field, raw))?;
            if !n.is_finite() {
                return Err(format!("{}: \"{}\" is not a number", field, raw));
            }
            Value::from(n)
        }
    } else if DATE_FIELDS.contains(&field) {
        if clear {
            Value::Null
        } else {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(raw, date_format))
                .map_err(|_| format!("{}: \"{}\" is not a date", field, raw))?;
            Value::from(date.format("%Y-%m-%d").to_string())
        }
    } else if OPTIONAL_TEXT_FIELDS.contains(&field) {
        if clear { Value::Null } else { Value::from(raw) }
    } else if REQUIRED_TEXT_FIELDS.contains(&field) {
        if clear {
            return Err(format!("{} cannot be empty", field));
        }
        Value::from(raw)
    } else if field == "is_section" {
        Value::from(
            raw.parse::<bool>()
                .map_err(|_| format!("is_section: expected true or false, got \"{}\"", raw))?,
        )
    } else {
        return Err(format!("unknown field \"{}\"", field));
    };
    Ok((field.to_string(), value))
}

pub fn parse_assignments(specs: &[String], date_format: &str) -> Result<Map<String, Value>, String> {
    let mut fields = Map::new();
    for spec in specs {
        let (field, value) = parse_assignment(spec, date_format)?;
        fields.insert(field, value);
    }
    Ok(fields)
}

/// Parent code implied by a code: everything before the last separator
pub fn implied_parent(code: &str) -> Option<&str> {
    code.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

pub fn cmd_add(args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut store = FileStore::open(&project.wbs_dir);

    let parent = args.parent.as_deref().or_else(|| implied_parent(&args.code));
    if let Some(p) = parent
        && !store.load()?.iter().any(|n| n.code == p && n.is_section)
    {
        eprintln!("warning: no section with code {}", p);
    }

    let mut node = if args.section {
        Node::section(0, &args.code, &args.name, parent)
    } else {
        Node::task(0, &args.code, &args.name, parent)
    };
    let fields = parse_assignments(&args.fields, &project.config.display.date_format)?;
    node.merge_patch(&fields)?;

    let node = store.create(node)?;
    println!("{} {} {}", node.id, node.code, node.name);
    Ok(())
}

pub fn cmd_set(args: SetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut store = FileStore::open(&project.wbs_dir);
    let fields = parse_assignments(&args.fields, &project.config.display.date_format)?;
    let node = store.patch(args.id, &fields)?;
    println!("{} {} {}", node.id, node.code, node.name);
    Ok(())
}

pub fn cmd_rm(args: RmArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut store = FileStore::open(&project.wbs_dir);
    let removed = store.delete(args.id)?;
    println!("deleted {} {}", removed.code, removed.name);
    Ok(())
}

pub fn cmd_clear(args: ClearArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.yes {
        return Err("refusing to delete every node without --yes".into());
    }
    let project = load_project_cwd()?;
    let mut store = FileStore::open(&project.wbs_dir);
    let count = store.clear()?;
    println!("deleted {} nodes", count);
    Ok(())
}

pub fn cmd_import(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let text = fs::read_to_string(&args.file)
        .map_err(|e| format!("could not read {}: {}", args.file, e))?;
    let mut nodes: Vec<Node> =
        serde_json::from_str(&text).map_err(|e| format!("could not parse {}: {}", args.file, e))?;

    let result = check::check_nodes(&nodes);
    if !result.valid {
        for line in crate::cli::output::format_check(&result) {
            eprintln!("{}", line);
        }
        return Err("import aborted: schedule has errors".into());
    }

    nodes.sort_by(|a, b| compare_codes(&a.code, &b.code));
    let mut store = FileStore::open(&project.wbs_dir);
    store.import(&nodes)?;
    println!(
        "imported {} nodes ({} warnings)",
        nodes.len(),
        result.warnings.len()
    );
    Ok(())
}

pub fn cmd_export() -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let mut nodes = FileStore::open(&project.wbs_dir).load()?;
    nodes.sort_by(|a, b| compare_codes(&a.code, &b.code));
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}
