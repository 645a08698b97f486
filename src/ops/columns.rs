//! Column registry.
//!
//! Every displayable column is a `Column` entry mapping a key to a pure
//! derivation function over the tree index. Adding a column means adding an
//! entry here; the filter engine, the view builder and the CLI all read the
//! registry.

use chrono::NaiveDate;

use crate::model::config::DisplayConfig;
use crate::model::node::Node;
use crate::ops::rollup::{self, Basis, Derived, Measure};
use crate::ops::tree::TreeIndex;

/// Text shown for quantities that do not aggregate onto a section
pub const NOT_APPLICABLE: &str = "-";

/// A resolved cell value before formatting
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Percent(f64),
    Date(NaiveDate),
    /// Column has no meaning on this row (section quantities)
    NotApplicable,
    /// Column applies but the value is missing
    Empty,
}

/// Formatting options for cells
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub date_format: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOptions::from(&DisplayConfig::default())
    }
}

impl From<&DisplayConfig> for DisplayOptions {
    fn from(config: &DisplayConfig) -> Self {
        DisplayOptions {
            date_format: config.date_format.clone(),
        }
    }
}

impl Cell {
    pub fn display(&self, opts: &DisplayOptions) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Percent(p) => format!("{}%", format_number((*p * 10.0).round() / 10.0)),
            Cell::Date(d) => d.format(&opts.date_format).to_string(),
            Cell::NotApplicable => NOT_APPLICABLE.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// Format a quantity: integers without a fraction, otherwise up to two
/// decimals with trailing zeros trimmed.
pub fn format_number(n: f64) -> String {
    // normalize -0.0
    let n = if n == 0.0 { 0.0 } else { n };
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{:.0}", n);
    }
    let s = format!("{:.2}", n);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Derivation function: (index, node position) -> cell
pub type DeriveFn = fn(&TreeIndex<'_>, usize) -> Cell;

/// A registered column
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    /// Summed onto sections (as opposed to "not applicable")
    pub rolls_up: bool,
    pub derive: DeriveFn,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column").field("key", &self.key).finish()
    }
}

impl Column {
    pub fn cell(&self, index: &TreeIndex<'_>, idx: usize) -> Cell {
        (self.derive)(index, idx)
    }

    pub fn text(&self, index: &TreeIndex<'_>, idx: usize, opts: &DisplayOptions) -> String {
        self.cell(index, idx).display(opts)
    }
}

fn text_or_empty(value: &Option<String>) -> Cell {
    match value {
        Some(s) if !s.is_empty() => Cell::Text(s.clone()),
        _ => Cell::Empty,
    }
}

/// A stored task-only quantity; sections render "not applicable"
fn task_number(index: &TreeIndex<'_>, idx: usize, field: fn(&Node) -> Option<f64>) -> Cell {
    let node = index.node(idx);
    if node.is_section {
        return Cell::NotApplicable;
    }
    field(node).map(Cell::Number).unwrap_or(Cell::Empty)
}

fn task_date(index: &TreeIndex<'_>, idx: usize, field: fn(&Node) -> Option<NaiveDate>) -> Cell {
    let node = index.node(idx);
    if node.is_section {
        return Cell::NotApplicable;
    }
    field(node).map(Cell::Date).unwrap_or(Cell::Empty)
}

fn derived(index: &TreeIndex<'_>, idx: usize, column: Derived) -> Cell {
    Cell::Number(rollup::rollup(index, idx, column))
}

const fn d(measure: Measure, basis: Basis) -> Derived {
    Derived::new(measure, basis)
}

pub static COLUMNS: &[Column] = &[
    Column {
        key: "code",
        label: "Code",
        rolls_up: false,
        derive: |index, idx| Cell::Text(index.node(idx).code.clone()),
    },
    Column {
        key: "name",
        label: "Name",
        rolls_up: false,
        derive: |index, idx| Cell::Text(index.node(idx).name.clone()),
    },
    Column {
        key: "unit",
        label: "Unit",
        rolls_up: false,
        derive: |index, idx| {
            let node = index.node(idx);
            if node.is_section {
                Cell::NotApplicable
            } else {
                text_or_empty(&node.unit)
            }
        },
    },
    Column {
        key: "volume_plan",
        label: "Vol. plan",
        rolls_up: false,
        derive: |index, idx| task_number(index, idx, |n| n.volume_plan),
    },
    Column {
        key: "volume_fact",
        label: "Vol. fact",
        rolls_up: false,
        derive: |index, idx| task_number(index, idx, |n| n.volume_fact),
    },
    Column {
        key: "volume_remaining",
        label: "Vol. left",
        rolls_up: false,
        derive: |index, idx| {
            task_number(index, idx, |n| {
                n.volume_plan.map(|p| p - n.volume_fact.unwrap_or(0.0))
            })
        },
    },
    Column {
        key: "unit_price",
        label: "Price",
        rolls_up: false,
        derive: |index, idx| task_number(index, idx, |n| n.unit_price),
    },
    Column {
        key: "labor_per_unit",
        label: "Labor/unit",
        rolls_up: false,
        derive: |index, idx| task_number(index, idx, |n| n.labor_per_unit),
    },
    Column {
        key: "machine_hours_per_unit",
        label: "Mach.h/unit",
        rolls_up: false,
        derive: |index, idx| task_number(index, idx, |n| n.machine_hours_per_unit),
    },
    Column {
        key: "start_date_contract",
        label: "Start (contract)",
        rolls_up: false,
        derive: |index, idx| task_date(index, idx, |n| n.start_date_contract),
    },
    Column {
        key: "end_date_contract",
        label: "End (contract)",
        rolls_up: false,
        derive: |index, idx| task_date(index, idx, |n| n.end_date_contract),
    },
    Column {
        key: "start_date_plan",
        label: "Start",
        rolls_up: false,
        derive: |index, idx| task_date(index, idx, |n| n.start_date_plan),
    },
    Column {
        key: "end_date_plan",
        label: "End",
        rolls_up: false,
        derive: |index, idx| task_date(index, idx, |n| n.end_date_plan),
    },
    Column {
        key: "executor",
        label: "Executor",
        rolls_up: false,
        derive: |index, idx| {
            let node = index.node(idx);
            if node.is_section {
                Cell::NotApplicable
            } else {
                text_or_empty(&node.executor)
            }
        },
    },
    Column {
        key: "labor_total",
        label: "Labor",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Labor, Basis::Total)),
    },
    Column {
        key: "labor_fact",
        label: "Labor fact",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Labor, Basis::Fact)),
    },
    Column {
        key: "labor_remaining",
        label: "Labor left",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Labor, Basis::Remaining)),
    },
    Column {
        key: "cost_total",
        label: "Cost",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Cost, Basis::Total)),
    },
    Column {
        key: "cost_fact",
        label: "Cost fact",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Cost, Basis::Fact)),
    },
    Column {
        key: "cost_remaining",
        label: "Cost left",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::Cost, Basis::Remaining)),
    },
    Column {
        key: "machine_hours_total",
        label: "Mach.h",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::MachineHours, Basis::Total)),
    },
    Column {
        key: "machine_hours_fact",
        label: "Mach.h fact",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::MachineHours, Basis::Fact)),
    },
    Column {
        key: "machine_hours_remaining",
        label: "Mach.h left",
        rolls_up: true,
        derive: |index, idx| derived(index, idx, d(Measure::MachineHours, Basis::Remaining)),
    },
    Column {
        key: "progress",
        label: "Done",
        rolls_up: true,
        derive: |index, idx| match rollup::progress(index, idx) {
            Some(p) => Cell::Percent(p),
            None => Cell::NotApplicable,
        },
    },
];

/// Columns shown when neither the config nor the command line picks any
pub const DEFAULT_COLUMNS: &[&str] = &[
    "code",
    "name",
    "unit",
    "volume_plan",
    "volume_fact",
    "start_date_plan",
    "end_date_plan",
    "executor",
    "labor_total",
    "labor_remaining",
    "progress",
];

/// Look up a column by key
pub fn column(key: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.key == key)
}

/// Resolve a list of keys, returning the first unknown key on failure
pub fn resolve<S: AsRef<str>>(keys: &[S]) -> Result<Vec<&'static Column>, String> {
    keys.iter()
        .map(|k| column(k.as_ref()).ok_or_else(|| k.as_ref().to_string()))
        .collect()
}
