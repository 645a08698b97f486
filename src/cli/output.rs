use indexmap::IndexMap;
use serde::Serialize;

use crate::model::node::{Node, NodeId};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::columns::{self, format_number};
use crate::ops::rollup::RollupSummary;
use crate::ops::stats::ScheduleStats;
use crate::ops::view::View;
use crate::sync::ConnectionStatus;
use crate::util::unicode::{display_width, fit};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NodeDetailJson<'a> {
    #[serde(flatten)]
    pub node: &'a Node,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub breadcrumb: String,
    pub children: usize,
    pub orphan: bool,
    /// Displayed value of every registered column
    pub values: IndexMap<&'static str, String>,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub key: &'static str,
    pub label: &'static str,
    pub rolls_up: bool,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub id: NodeId,
    pub code: String,
    pub field: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct PresetJson<'a> {
    pub name: &'a str,
    pub filters: &'a IndexMap<String, String>,
}

/// One frame of `wbs watch --json`, emitted on every change
#[derive(Serialize)]
pub struct WatchFrameJson<'a> {
    pub revision: u64,
    pub status: ConnectionStatus,
    pub view: &'a View,
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Numeric columns are right-aligned
fn right_aligned(key: &str) -> bool {
    matches!(
        key,
        "volume_plan"
            | "volume_fact"
            | "volume_remaining"
            | "unit_price"
            | "labor_per_unit"
            | "machine_hours_per_unit"
            | "progress"
    ) || columns::column(key).is_some_and(|c| c.rolls_up)
}

fn label(key: &str) -> &str {
    columns::column(key).map(|c| c.label).unwrap_or(key)
}

/// Render a view as an aligned table. Names are indented by nesting level;
/// while filters are active a trailing column shows each row's breadcrumb.
pub fn format_table(view: &View, max_width: usize) -> Vec<String> {
    let with_path = view.rows.iter().any(|r| r.breadcrumb.is_some());

    let mut header: Vec<String> = view.columns.iter().map(|k| label(k).to_string()).collect();
    let mut body: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = view
                .columns
                .iter()
                .zip(&row.cells)
                .map(|(key, cell)| {
                    if *key == "name" {
                        format!("{}{}", "  ".repeat(row.level as usize), cell)
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            if with_path {
                cells.push(row.breadcrumb.clone().unwrap_or_default());
            }
            cells
        })
        .collect();
    if with_path {
        header.push("Path".to_string());
    }

    let widths: Vec<usize> = (0..header.len())
        .map(|c| {
            body.iter()
                .map(|r| display_width(&r[c]))
                .chain(std::iter::once(display_width(&header[c])))
                .max()
                .unwrap_or(0)
                .min(max_width.max(1))
        })
        .collect();
    let align: Vec<bool> = (0..header.len())
        .map(|c| view.columns.get(c).is_some_and(|k| right_aligned(k)))
        .collect();

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(c, text)| fit(text, widths[c], align[c]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(render(&header));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in body.drain(..) {
        lines.push(render(&row));
    }
    lines
}

/// Footer under a table: row counts and active filters
pub fn format_table_footer(view: &View) -> String {
    if view.filtered {
        format!("{} of {} rows (filtered)", view.rows.len(), view.total)
    } else {
        format!("{} rows", view.rows.len())
    }
}

pub fn format_rollup(summary: &RollupSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let kind = if summary.is_section { "section" } else { "task" };
    lines.push(format!("{} {} ({}, {} tasks)", summary.code, summary.name, kind, summary.tasks));
    let key_width = summary
        .values
        .iter()
        .map(|(k, _)| label(k).len())
        .max()
        .unwrap_or(0);
    for (key, value) in &summary.values {
        lines.push(format!(
            "  {:<width$}  {:>12}",
            label(key),
            format_number(*value),
            width = key_width
        ));
    }
    if let Some(p) = summary.progress {
        lines.push(format!(
            "  {:<width$}  {:>12}",
            "Done",
            format!("{}%", format_number((p * 10.0).round() / 10.0)),
            width = key_width
        ));
    }
    lines
}

pub fn format_stats(stats: &ScheduleStats) -> Vec<String> {
    let mut lines = vec![
        format!("{} sections, {} tasks", stats.sections, stats.tasks),
        format!(
            "volume progress  {}%",
            format_number(stats.volume_progress_percent)
        ),
        format!("time progress    {}%", format_number(stats.time_progress_percent)),
    ];
    if let (Some(start), Some(finish)) = (stats.start, stats.finish) {
        lines.push(format!("period           {} .. {}", start, finish));
    }
    lines.push(String::new());
    lines.push(format!("{:<8}{:>14}{:>14}{:>14}", "", "plan", "fact", "remaining"));
    lines.push(format!(
        "{:<8}{:>14}{:>14}{:>14}",
        "labor",
        format_number(stats.labor_plan),
        format_number(stats.labor_fact),
        format_number(stats.labor_remaining)
    ));
    lines.push(format!(
        "{:<8}{:>14}{:>14}{:>14}",
        "cost",
        format_number(stats.cost_plan),
        format_number(stats.cost_fact),
        format_number(stats.cost_remaining)
    ));
    lines
}

pub fn format_check(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        for err in &result.errors {
            lines.push(match err {
                CheckError::DuplicateCode { code, ids } => format!(
                    "  code {} is used by ids {}",
                    code,
                    ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
                ),
                CheckError::DuplicateId { id, codes } => {
                    format!("  id {} is used by codes {}", id, codes.join(", "))
                }
                CheckError::ParentCycle { id, code } => {
                    format!("  {} (id {}) is its own ancestor", code, id)
                }
            });
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        for warn in &result.warnings {
            lines.push(match warn {
                CheckWarning::Orphan {
                    code, parent_code, ..
                } => format!("  {} has unknown parent {}", code, parent_code),
                CheckWarning::SectionQuantities { code, .. } => {
                    format!("  section {} stores quantities (ignored)", code)
                }
                CheckWarning::MissingVolume { code, .. } => {
                    format!("  {} has no plan volume", code)
                }
                CheckWarning::CodeOutsideParent {
                    code, parent_code, ..
                } => format!("  {} does not extend parent code {}", code, parent_code),
                CheckWarning::MalformedCode { code, .. } => {
                    format!("  \"{}\" is not a well-formed code", code)
                }
                CheckWarning::Overrun { code, .. } => {
                    format!("  {} has more fact than plan volume", code)
                }
            });
        }
    }
    if result.valid {
        lines.push("✓ schedule is valid".to_string());
    } else {
        lines.push("✗ schedule has errors".to_string());
    }
    lines
}
