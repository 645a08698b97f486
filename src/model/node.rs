use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned by the authoritative store
pub type NodeId = i64;

/// A section or task in the work breakdown structure.
///
/// The hierarchy is implicit: `parent_code` names the containing section's
/// `code`. Quantity fields are only meaningful on tasks; a section's quantity
/// columns are always derived from its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Dotted hierarchical code like `2.1.3`
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Unit of measure (`m3`, `t`, `pcs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    #[serde(default)]
    pub is_section: bool,
    /// Nesting depth for display only
    #[serde(default)]
    pub level: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_plan: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_fact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labor_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_hours_per_unit: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_contract: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_contract: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_plan: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_plan: Option<NaiveDate>,

    /// Free-text assignee name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
}

/// Fields a patch may never overwrite
const IMMUTABLE_FIELDS: &[&str] = &["id"];

impl Node {
    /// Create a bare section node
    pub fn section(id: NodeId, code: &str, name: &str, parent_code: Option<&str>) -> Self {
        Node {
            is_section: true,
            ..Node::task(id, code, name, parent_code)
        }
    }

    /// Create a task node with no quantities
    pub fn task(id: NodeId, code: &str, name: &str, parent_code: Option<&str>) -> Self {
        Node {
            id,
            code: code.to_string(),
            name: name.to_string(),
            unit: None,
            parent_code: parent_code.map(str::to_string),
            is_section: false,
            level: crate::model::code::depth(code).saturating_sub(1) as u32,
            volume_plan: None,
            volume_fact: None,
            unit_price: None,
            labor_per_unit: None,
            machine_hours_per_unit: None,
            start_date_contract: None,
            end_date_contract: None,
            start_date_plan: None,
            end_date_plan: None,
            executor: None,
        }
    }

    pub fn is_task(&self) -> bool {
        !self.is_section
    }

    /// Plan period, falling back to the contract period for missing ends
    pub fn period(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (
            self.start_date_plan.or(self.start_date_contract),
            self.end_date_plan.or(self.end_date_contract),
        )
    }

    /// Whether a section carries any stored quantity (it never should)
    pub fn has_quantities(&self) -> bool {
        self.volume_plan.is_some()
            || self.volume_fact.is_some()
            || self.unit_price.is_some()
            || self.labor_per_unit.is_some()
            || self.machine_hours_per_unit.is_some()
    }

    /// Shallow-merge the fields present in `patch` into this node.
    ///
    /// Keys missing from the patch are left untouched; a key present with
    /// `null` clears an optional field. The node is only modified if the
    /// merged result still deserializes, so a malformed patch leaves it
    /// exactly as it was.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if IMMUTABLE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}
