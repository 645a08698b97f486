use serde::Serialize;

use crate::model::node::{Node, NodeId};
use crate::ops::columns::{Column, DisplayOptions};
use crate::ops::filter::{self, FilterSet};
use crate::ops::tree::TreeIndex;

/// One materialized table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: NodeId,
    pub code: String,
    pub level: u32,
    pub is_section: bool,
    /// Displayed cell text, aligned with `View::columns`
    pub cells: Vec<String>,
    /// Ancestor names, only while filters are active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumb: Option<String>,
}

/// Ordered, filtered rows with every derived value resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Row>,
    pub filtered: bool,
    /// Total nodes before filtering
    pub total: usize,
}

impl View {
    /// Cell text for `row` under column `key`
    pub fn cell<'r>(&self, row: &'r Row, key: &str) -> Option<&'r str> {
        self.columns
            .iter()
            .position(|c| *c == key)
            .and_then(|i| row.cells.get(i))
            .map(String::as_str)
    }
}

/// Build the view for the current node list and filters.
///
/// Pure function of its inputs: the tree index, rollups and filter result
/// are rebuilt from scratch on every call.
pub fn build_view(
    nodes: &[Node],
    filters: &FilterSet,
    columns: &[&'static Column],
    opts: &DisplayOptions,
    breadcrumb_sep: &str,
) -> View {
    let index = TreeIndex::build(nodes);
    let filtered = filters.is_active();
    let rows = filter::apply(&index, filters, opts)
        .into_iter()
        .map(|i| {
            let node = index.node(i);
            let breadcrumb = filtered
                .then(|| index.breadcrumb(i, breadcrumb_sep))
                .filter(|b| !b.is_empty());
            Row {
                id: node.id,
                code: node.code.clone(),
                level: node.level,
                is_section: node.is_section,
                cells: columns.iter().map(|c| c.text(&index, i, opts)).collect(),
                breadcrumb,
            }
        })
        .collect();

    View {
        columns: columns.iter().map(|c| c.key).collect(),
        rows,
        filtered,
        total: nodes.len(),
    }
}
