use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::code::is_segment_prefix;
use crate::model::node::{Node, NodeId};
use crate::ops::tree::TreeIndex;

/// Non-empty segments without whitespace, separated by single dots
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.\s]+(\.[^.\s]+)*$").expect("valid code regex"));

/// Structured result from `wbs check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something that should be fixed).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// Two or more nodes share a code
    #[serde(rename = "duplicate_code")]
    DuplicateCode { code: String, ids: Vec<NodeId> },
    /// Two or more nodes share an id
    #[serde(rename = "duplicate_id")]
    DuplicateId { id: NodeId, codes: Vec<String> },
    /// Following parent codes from this node loops
    #[serde(rename = "parent_cycle")]
    ParentCycle { id: NodeId, code: String },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// `parent_code` does not name any node
    #[serde(rename = "orphan")]
    Orphan {
        id: NodeId,
        code: String,
        parent_code: String,
    },
    /// A section stores quantities that will never be shown
    #[serde(rename = "section_quantities")]
    SectionQuantities { id: NodeId, code: String },
    /// Task without a plan volume (rolls up as zero)
    #[serde(rename = "missing_volume")]
    MissingVolume { id: NodeId, code: String },
    /// Code does not extend its parent's code segment-wise
    #[serde(rename = "code_outside_parent")]
    CodeOutsideParent {
        id: NodeId,
        code: String,
        parent_code: String,
    },
    /// Empty segments or whitespace in the code
    #[serde(rename = "malformed_code")]
    MalformedCode { id: NodeId, code: String },
    /// Fact volume exceeds plan volume
    #[serde(rename = "overrun")]
    Overrun { id: NodeId, code: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a node list and return structured results.
///
/// Checks performed:
/// 1. No duplicate codes or ids
/// 2. No parent cycles
/// 3. Warnings for orphans, misplaced codes, malformed codes, quantities on
///    sections, tasks without plan volume, and overruns
pub fn check_nodes(nodes: &[Node]) -> CheckResult {
    let mut result = CheckResult::default();
    let index = TreeIndex::build(nodes);

    find_duplicates(nodes, &mut result);

    for &i in index.ordered() {
        check_node(&index, i, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

fn check_node(index: &TreeIndex<'_>, i: usize, result: &mut CheckResult) {
    let node = index.node(i);
    let id = node.id;
    let code = || node.code.clone();

    if !CODE_RE.is_match(&node.code) {
        result.warnings.push(CheckWarning::MalformedCode { id, code: code() });
    }

    if index.in_cycle(i) {
        result.errors.push(CheckError::ParentCycle { id, code: code() });
    }

    if let Some(parent_code) = node.parent_code.as_deref().filter(|p| !p.is_empty()) {
        if index.is_orphan(i) {
            result.warnings.push(CheckWarning::Orphan {
                id,
                code: code(),
                parent_code: parent_code.to_string(),
            });
        } else if !is_segment_prefix(parent_code, &node.code) {
            result.warnings.push(CheckWarning::CodeOutsideParent {
                id,
                code: code(),
                parent_code: parent_code.to_string(),
            });
        }
    }

    if node.is_section {
        if node.has_quantities() {
            result.warnings.push(CheckWarning::SectionQuantities { id, code: code() });
        }
        return;
    }

    match (node.volume_plan, node.volume_fact) {
        (None, _) => result.warnings.push(CheckWarning::MissingVolume { id, code: code() }),
        (Some(plan), Some(fact)) if fact > plan => {
            result.warnings.push(CheckWarning::Overrun { id, code: code() })
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_duplicates(nodes: &[Node], result: &mut CheckResult) {
    let mut by_code: HashMap<&str, Vec<NodeId>> = HashMap::new();
    let mut by_id: HashMap<NodeId, Vec<String>> = HashMap::new();
    for node in nodes {
        by_code.entry(node.code.as_str()).or_default().push(node.id);
        by_id.entry(node.id).or_default().push(node.code.clone());
    }

    let mut dup_codes: Vec<_> = by_code.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    dup_codes.sort_by(|a, b| crate::model::code::compare_codes(a.0, b.0));
    for (code, ids) in dup_codes {
        result.errors.push(CheckError::DuplicateCode {
            code: code.to_string(),
            ids,
        });
    }

    let mut dup_ids: Vec<_> = by_id.into_iter().filter(|(_, codes)| codes.len() > 1).collect();
    dup_ids.sort_by_key(|(id, _)| *id);
    for (id, codes) in dup_ids {
        result.errors.push(CheckError::DuplicateId { id, codes });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
