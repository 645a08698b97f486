use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::model::node::{Node, NodeId};
use crate::ops::tree::TreeIndex;

/// Which field of a node matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Code,
    Name,
    Unit,
    Executor,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Code => "code",
            MatchField::Name => "name",
            MatchField::Unit => "unit",
            MatchField::Executor => "executor",
        }
    }
}

/// A search hit for a node field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: NodeId,
    pub code: String,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search every node's text fields, in code order.
///
/// Unlike column filters this matches sections too, so it can be used to
/// locate a section by name.
pub fn search_nodes(nodes: &[Node], re: &Regex) -> Vec<SearchHit> {
    let index = TreeIndex::build(nodes);
    let mut hits = Vec::new();
    for &i in index.ordered() {
        search_node(re, index.node(i), &mut hits);
    }
    hits
}

fn search_node(re: &Regex, node: &Node, hits: &mut Vec<SearchHit>) {
    let fields = [
        (MatchField::Code, Some(node.code.as_str())),
        (MatchField::Name, Some(node.name.as_str())),
        (MatchField::Unit, node.unit.as_deref()),
        (MatchField::Executor, node.executor.as_deref()),
    ];
    for (field, text) in fields {
        let Some(text) = text else { continue };
        let spans = find_matches(re, text);
        if !spans.is_empty() {
            hits.push(SearchHit {
                id: node.id,
                code: node.code.clone(),
                field,
                spans,
            });
        }
    }
}

/// Compile a user pattern case-insensitively, falling back to a literal
/// match when it is not a valid regex.
pub fn compile_pattern(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){}", pattern))
        .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(pattern))))
        .unwrap_or_else(|_| Regex::new("$^").expect("never-matching regex"))
}
