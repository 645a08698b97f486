use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::code::compare_codes;
use crate::ops::columns::{self, DisplayOptions, NOT_APPLICABLE};
use crate::ops::tree::TreeIndex;

/// Error type for filter construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("unknown column \"{0}\" (see `wbs columns`)")]
    UnknownColumn(String),
    #[error("invalid filter \"{0}\": expected <column>=<text>")]
    Malformed(String),
}

/// Per-column substring predicates, kept in the order they were set.
///
/// Matching is case-insensitive against the displayed value of the column.
/// Blank needles are stored but inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    predicates: IndexMap<String, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the predicate for `column`
    pub fn set(&mut self, column: &str, needle: &str) -> Result<(), FilterError> {
        if columns::column(column).is_none() {
            return Err(FilterError::UnknownColumn(column.to_string()));
        }
        self.predicates.insert(column.to_string(), needle.to_string());
        Ok(())
    }

    /// Parse `column=needle` and set it
    pub fn set_spec(&mut self, spec: &str) -> Result<(), FilterError> {
        let (column, needle) = spec
            .split_once('=')
            .ok_or_else(|| FilterError::Malformed(spec.to_string()))?;
        self.set(column.trim(), needle)
    }

    pub fn clear(&mut self, column: &str) {
        self.predicates.shift_remove(column);
    }

    pub fn clear_all(&mut self) {
        self.predicates.clear();
    }

    /// Active predicates as (column, lowercased needle)
    pub fn active(&self) -> impl Iterator<Item = (&str, String)> {
        self.predicates
            .iter()
            .filter(|(_, needle)| !needle.trim().is_empty())
            .map(|(col, needle)| (col.as_str(), needle.to_lowercase()))
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    /// Every stored predicate, including blank ones
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Copy of this set without `column`'s predicate
    pub fn without(&self, column: &str) -> FilterSet {
        let mut other = self.clone();
        other.clear(column);
        other
    }
}

/// Whether a task satisfies every active predicate
fn task_matches(
    index: &TreeIndex<'_>,
    idx: usize,
    active: &[(&'static columns::Column, String)],
    opts: &DisplayOptions,
) -> bool {
    active.iter().all(|(column, needle)| {
        column
            .text(index, idx, opts)
            .to_lowercase()
            .contains(needle.as_str())
    })
}

fn resolve_active(filters: &FilterSet) -> Vec<(&'static columns::Column, String)> {
    filters
        .active()
        .filter_map(|(key, needle)| columns::column(key).map(|c| (c, needle)))
        .collect()
}

/// Tasks matching all active predicates, in code order
pub fn matching_tasks(index: &TreeIndex<'_>, filters: &FilterSet, opts: &DisplayOptions) -> Vec<usize> {
    let active = resolve_active(filters);
    index
        .ordered()
        .iter()
        .copied()
        .filter(|&i| index.node(i).is_task() && task_matches(index, i, &active, opts))
        .collect()
}

/// Visible node set in code order.
///
/// With no active predicate every node passes. Otherwise tasks must match
/// all predicates, and a section is kept only if it is an ancestor of a
/// matching task: each match's parent chain is walked and the visited codes
/// collected. Sections are never tested against predicates themselves.
pub fn apply(index: &TreeIndex<'_>, filters: &FilterSet, opts: &DisplayOptions) -> Vec<usize> {
    if !filters.is_active() {
        return index.ordered().to_vec();
    }

    let matches = matching_tasks(index, filters, opts);
    let matched: HashSet<usize> = matches.iter().copied().collect();
    let mut ancestor_codes: HashSet<&str> = HashSet::new();
    // A chain already walked from another match needs no second pass
    let mut walked: HashSet<usize> = HashSet::new();
    for &m in &matches {
        let mut current = index.parent(m);
        while let Some(a) = current {
            if !walked.insert(a) {
                break;
            }
            ancestor_codes.insert(index.node(a).code.as_str());
            current = index.parent(a);
        }
    }

    index
        .ordered()
        .iter()
        .copied()
        .filter(|&i| {
            let node = index.node(i);
            if node.is_section {
                ancestor_codes.contains(node.code.as_str())
            } else {
                matched.contains(&i)
            }
        })
        .collect()
}

/// Values to offer in the picker for `column`.
///
/// Every *other* active predicate is applied first, then the column's
/// displayed value is collected from the matching tasks. Blank and
/// not-applicable values are dropped; the rest are de-duplicated, sorted
/// (codes by code order, everything else lexically) and capped at `limit`.
pub fn available_values(
    index: &TreeIndex<'_>,
    filters: &FilterSet,
    column: &str,
    opts: &DisplayOptions,
    limit: usize,
) -> Result<Vec<String>, FilterError> {
    let col = columns::column(column).ok_or_else(|| FilterError::UnknownColumn(column.to_string()))?;
    let others = filters.without(column);

    let mut values: Vec<String> = matching_tasks(index, &others, opts)
        .into_iter()
        .map(|i| col.text(index, i, opts))
        .filter(|v| !v.trim().is_empty() && v != NOT_APPLICABLE)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    if col.key == "code" {
        values.sort_by(|a, b| compare_codes(a, b));
    } else {
        values.sort();
    }
    values.truncate(limit);
    Ok(values)
}
