use chrono::NaiveDate;
use serde::Serialize;

use crate::model::node::Node;
use crate::ops::rollup::{Basis, Derived, Measure, task_value};

/// Project-wide progress figures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleStats {
    pub sections: usize,
    pub tasks: usize,
    /// Sum of fact volume over sum of plan volume, in percent
    pub volume_progress_percent: f64,
    /// Share of the schedule's calendar span already elapsed, in percent
    pub time_progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<NaiveDate>,
    pub labor_plan: f64,
    pub labor_fact: f64,
    pub labor_remaining: f64,
    pub cost_plan: f64,
    pub cost_fact: f64,
    pub cost_remaining: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute stats over every task in `nodes` as of `today`
pub fn schedule_stats(nodes: &[Node], today: NaiveDate) -> ScheduleStats {
    let mut stats = ScheduleStats::default();
    let mut plan_volume = 0.0;
    let mut fact_volume = 0.0;

    for node in nodes {
        if node.is_section {
            stats.sections += 1;
            continue;
        }
        stats.tasks += 1;
        plan_volume += node.volume_plan.unwrap_or(0.0);
        fact_volume += node.volume_fact.unwrap_or(0.0);

        let sum = |m, b| task_value(node, Derived::new(m, b));
        stats.labor_plan += sum(Measure::Labor, Basis::Total);
        stats.labor_fact += sum(Measure::Labor, Basis::Fact);
        stats.labor_remaining += sum(Measure::Labor, Basis::Remaining);
        stats.cost_plan += sum(Measure::Cost, Basis::Total);
        stats.cost_fact += sum(Measure::Cost, Basis::Fact);
        stats.cost_remaining += sum(Measure::Cost, Basis::Remaining);

        let (start, end) = node.period();
        if let Some(s) = start {
            stats.start = Some(stats.start.map_or(s, |cur| cur.min(s)));
        }
        if let Some(e) = end {
            stats.finish = Some(stats.finish.map_or(e, |cur| cur.max(e)));
        }
    }

    if plan_volume > 0.0 {
        stats.volume_progress_percent = round2(fact_volume / plan_volume * 100.0);
    }
    if let (Some(start), Some(finish)) = (stats.start, stats.finish) {
        let total_days = (finish - start).num_days();
        if total_days > 0 {
            let passed = (today - start).num_days().clamp(0, total_days);
            stats.time_progress_percent = round2(passed as f64 / total_days as f64 * 100.0);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(code: &str, vp: f64, vf: f64, start: u32, end: u32) -> Node {
        Node {
            volume_plan: Some(vp),
            volume_fact: Some(vf),
            labor_per_unit: Some(1.0),
            unit_price: Some(10.0),
            start_date_plan: NaiveDate::from_ymd_opt(2026, start, 1),
            end_date_plan: NaiveDate::from_ymd_opt(2026, end, 1),
            ..Node::task(1, code, code, Some("1"))
        }
    }

    #[test]
    fn totals_and_progress() {
        let nodes = vec![
            Node::section(1, "1", "root", None),
            task("1.1", 30.0, 15.0, 1, 3),
            task("1.2", 10.0, 5.0, 2, 5),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let stats = schedule_stats(&nodes, today);
        assert_eq!(stats.sections, 1);
        assert_eq!(stats.tasks, 2);
        assert_eq!(stats.volume_progress_percent, 50.0);
        assert_eq!(stats.labor_plan, 40.0);
        assert_eq!(stats.labor_remaining, 20.0);
        assert_eq!(stats.cost_fact, 200.0);
        assert_eq!(stats.start, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(stats.finish, NaiveDate::from_ymd_opt(2026, 5, 1));
        // Jan 1 -> Mar 1 is 59 of 120 days
        assert_eq!(stats.time_progress_percent, 49.17);
    }

    #[test]
    fn time_progress_is_clamped() {
        let nodes = vec![task("1", 1.0, 0.0, 1, 2)];
        let before = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let after = NaiveDate::from_ymd_opt(2027, 6, 1).unwrap();
        assert_eq!(schedule_stats(&nodes, before).time_progress_percent, 0.0);
        assert_eq!(schedule_stats(&nodes, after).time_progress_percent, 100.0);
    }

    #[test]
    fn empty_schedule() {
        let stats = schedule_stats(&[], NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(stats, ScheduleStats::default());
    }
}
