use chrono::{Datelike, Months, NaiveDate};

use crate::model::node::Node;

const SCOPE_FIELDS: &[&str] = &[
    "is_section",
    "start_date_plan",
    "end_date_plan",
    "start_date_contract",
    "end_date_contract",
];

/// Which slice of the schedule a view asks the store for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// Whole schedule
    All,
    /// Calendar month starting at the given first day
    Month(NaiveDate),
}

impl FetchScope {
    /// Parse `YYYY-MM` or `YYYY-MM-DD` into a month scope
    pub fn month(spec: &str) -> Result<FetchScope, String> {
        let full = if spec.len() == 7 {
            format!("{}-01", spec)
        } else {
            spec.to_string()
        };
        let date = NaiveDate::parse_from_str(&full, "%Y-%m-%d")
            .map_err(|_| format!("invalid month \"{}\": expected YYYY-MM", spec))?;
        Ok(FetchScope::Month(first_of_month(date)))
    }

    /// Whether a node belongs to this scope.
    ///
    /// Sections are always kept so month views still show the hierarchy.
    /// A task is in a month if its period (plan dates, falling back to
    /// contract dates) overlaps it. Tasks missing either date are only in
    /// `All`.
    pub fn contains(&self, node: &Node) -> bool {
        match self {
            FetchScope::All => true,
            FetchScope::Month(first) => {
                if node.is_section {
                    return true;
                }
                let (Some(start), Some(end)) = node.period() else {
                    return false;
                };
                let next = next_month(*first);
                start < next && end >= *first
            }
        }
    }

    /// Whether a change to `field` can move a node in or out of a month
    pub fn depends_on(field: &str) -> bool {
        SCOPE_FIELDS.contains(&field)
    }

    pub fn apply(&self, nodes: Vec<Node>) -> Vec<Node> {
        match self {
            FetchScope::All => nodes,
            _ => nodes.into_iter().filter(|n| self.contains(n)).collect(),
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month(first: NaiveDate) -> NaiveDate {
    first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX)
}
