use serde::Serialize;

use crate::model::node::Node;
use crate::ops::tree::TreeIndex;

/// Which per-unit rate a derived column multiplies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Labor,
    Cost,
    MachineHours,
}

/// Which volume a derived column multiplies the rate by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// rate x plan volume
    Total,
    /// rate x fact volume
    Fact,
    /// rate x (plan - fact)
    Remaining,
}

/// One of the nine summable derived columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Derived {
    pub measure: Measure,
    pub basis: Basis,
}

impl Derived {
    pub const fn new(measure: Measure, basis: Basis) -> Self {
        Derived { measure, basis }
    }

    pub const ALL: [Derived; 9] = [
        Derived::new(Measure::Labor, Basis::Total),
        Derived::new(Measure::Labor, Basis::Fact),
        Derived::new(Measure::Labor, Basis::Remaining),
        Derived::new(Measure::Cost, Basis::Total),
        Derived::new(Measure::Cost, Basis::Fact),
        Derived::new(Measure::Cost, Basis::Remaining),
        Derived::new(Measure::MachineHours, Basis::Total),
        Derived::new(Measure::MachineHours, Basis::Fact),
        Derived::new(Measure::MachineHours, Basis::Remaining),
    ];

    /// Column key, e.g. `labor_total`, `machine_hours_remaining`
    pub fn key(self) -> &'static str {
        match (self.measure, self.basis) {
            (Measure::Labor, Basis::Total) => "labor_total",
            (Measure::Labor, Basis::Fact) => "labor_fact",
            (Measure::Labor, Basis::Remaining) => "labor_remaining",
            (Measure::Cost, Basis::Total) => "cost_total",
            (Measure::Cost, Basis::Fact) => "cost_fact",
            (Measure::Cost, Basis::Remaining) => "cost_remaining",
            (Measure::MachineHours, Basis::Total) => "machine_hours_total",
            (Measure::MachineHours, Basis::Fact) => "machine_hours_fact",
            (Measure::MachineHours, Basis::Remaining) => "machine_hours_remaining",
        }
    }
}

fn rate(node: &Node, measure: Measure) -> f64 {
    match measure {
        Measure::Labor => node.labor_per_unit,
        Measure::Cost => node.unit_price,
        Measure::MachineHours => node.machine_hours_per_unit,
    }
    .unwrap_or(0.0)
}

/// Derived value for a single task. Absent fields count as zero.
pub fn task_value(node: &Node, column: Derived) -> f64 {
    let plan = node.volume_plan.unwrap_or(0.0);
    let fact = node.volume_fact.unwrap_or(0.0);
    let volume = match column.basis {
        Basis::Total => plan,
        Basis::Fact => fact,
        Basis::Remaining => plan - fact,
    };
    rate(node, column.measure) * volume
}

/// Sum `column` over every task under `idx`.
///
/// Intermediate sections are walked through but never summed themselves, so
/// nothing is counted twice. For a task `idx` this is just its own value.
/// Recomputed on every call.
pub fn rollup(index: &TreeIndex, idx: usize, column: Derived) -> f64 {
    let node = index.node(idx);
    if node.is_task() {
        return task_value(node, column);
    }
    index
        .task_descendants(idx)
        .into_iter()
        .map(|t| task_value(index.node(t), column))
        .sum()
}

/// All nine derived values for one node, keyed by column key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupSummary {
    pub code: String,
    pub name: String,
    pub is_section: bool,
    pub tasks: usize,
    pub values: Vec<(&'static str, f64)>,
    /// Labor-weighted percent complete, if any labor is planned
    pub progress: Option<f64>,
}

pub fn summarize(index: &TreeIndex, idx: usize) -> RollupSummary {
    let node = index.node(idx);
    let tasks = if node.is_task() {
        vec![idx]
    } else {
        index.task_descendants(idx)
    };
    let values = Derived::ALL
        .iter()
        .map(|&col| {
            let sum = tasks.iter().map(|&t| task_value(index.node(t), col)).sum();
            (col.key(), sum)
        })
        .collect();
    RollupSummary {
        code: node.code.clone(),
        name: node.name.clone(),
        is_section: node.is_section,
        tasks: tasks.len(),
        values,
        progress: progress(index, idx),
    }
}

/// Percent complete.
///
/// Tasks: fact / plan volume. Sections: fact labor / total labor over the
/// section's tasks. `None` when the denominator is zero.
pub fn progress(index: &TreeIndex, idx: usize) -> Option<f64> {
    let node = index.node(idx);
    let (done, planned) = if node.is_task() {
        (node.volume_fact.unwrap_or(0.0), node.volume_plan.unwrap_or(0.0))
    } else {
        (
            rollup(index, idx, Derived::new(Measure::Labor, Basis::Fact)),
            rollup(index, idx, Derived::new(Measure::Labor, Basis::Total)),
        )
    };
    if planned == 0.0 {
        None
    } else {
        Some(done / planned * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, code: &str, parent: &str, vp: f64, vf: f64, labor: f64) -> Node {
        Node {
            volume_plan: Some(vp),
            volume_fact: Some(vf),
            labor_per_unit: Some(labor),
            ..Node::task(id, code, code, Some(parent))
        }
    }

    fn sample() -> Vec<Node> {
        vec![
            Node::section(1, "1", "Earthworks", None),
            Node::section(2, "1.1", "Excavation", Some("1")),
            task(3, "1.1.1", "1.1", 10.0, 4.0, 2.0),
            task(4, "1.2", "1", 5.0, 5.0, 3.0),
        ]
    }

    const LABOR_TOTAL: Derived = Derived::new(Measure::Labor, Basis::Total);
    const LABOR_FACT: Derived = Derived::new(Measure::Labor, Basis::Fact);
    const LABOR_REMAINING: Derived = Derived::new(Measure::Labor, Basis::Remaining);

    #[test]
    fn labor_rollup_matches_hand_computation() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let root = index.find_code("1").unwrap();
        assert_eq!(rollup(&index, root, LABOR_TOTAL), 35.0);
        assert_eq!(rollup(&index, root, LABOR_FACT), 23.0);
        assert_eq!(rollup(&index, root, LABOR_REMAINING), 12.0);
    }

    #[test]
    fn nested_section_counts_only_its_tasks() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let sub = index.find_code("1.1").unwrap();
        assert_eq!(rollup(&index, sub, LABOR_TOTAL), 20.0);
    }

    #[test]
    fn rollup_is_idempotent() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let root = index.find_code("1").unwrap();
        for col in Derived::ALL {
            assert_eq!(rollup(&index, root, col), rollup(&index, root, col));
        }
        assert_eq!(summarize(&index, root), summarize(&index, root));
    }

    #[test]
    fn absent_rates_count_as_zero() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let root = index.find_code("1").unwrap();
        let cost = Derived::new(Measure::Cost, Basis::Total);
        assert_eq!(rollup(&index, root, cost), 0.0);
    }

    #[test]
    fn cost_and_machine_hours_share_the_formula() {
        let mut nodes = sample();
        nodes[2].unit_price = Some(100.0);
        nodes[2].machine_hours_per_unit = Some(0.5);
        let index = TreeIndex::build(&nodes);
        let root = index.find_code("1").unwrap();
        assert_eq!(rollup(&index, root, Derived::new(Measure::Cost, Basis::Remaining)), 600.0);
        assert_eq!(
            rollup(&index, root, Derived::new(Measure::MachineHours, Basis::Fact)),
            2.0
        );
    }

    #[test]
    fn section_progress_is_labor_weighted() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let root = index.find_code("1").unwrap();
        let pct = progress(&index, root).unwrap();
        assert!((pct - 23.0 / 35.0 * 100.0).abs() < 1e-9);
        let leaf = index.find_code("1.2").unwrap();
        assert_eq!(progress(&index, leaf), Some(100.0));

        let empty = vec![Node::section(1, "9", "Empty", None)];
        let index = TreeIndex::build(&empty);
        assert_eq!(progress(&index, 0), None);
    }

    #[test]
    fn summary_lists_all_nine_columns() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let summary = summarize(&index, index.find_code("1").unwrap());
        assert_eq!(summary.tasks, 2);
        assert_eq!(summary.values.len(), 9);
        assert_eq!(summary.values[0], ("labor_total", 35.0));
    }
}
