use serde_json::{Map, Value};

use crate::model::node::{Node, NodeId};
use crate::ops::window::FetchScope;

/// Authoritative node store the session fetches from and patches into.
pub trait NodeSource {
    type Error: std::error::Error + 'static;

    /// Every node in `scope`, in any order
    fn fetch(&mut self, scope: FetchScope) -> Result<Vec<Node>, Self::Error>;

    /// Apply a field-level patch and return the stored node
    fn patch(&mut self, id: NodeId, fields: &Map<String, Value>) -> Result<Node, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum MemorySourceError {
    #[error("source offline")]
    Offline,
    #[error("no node with id {0}")]
    UnknownNode(NodeId),
    #[error("a node with code {0} already exists")]
    DuplicateCode(String),
    #[error("section {0} cannot carry quantities")]
    SectionQuantities(String),
    #[error("invalid fields for node {id}: {source}")]
    InvalidFields {
        id: NodeId,
        source: serde_json::Error,
    },
}

/// Node source held in memory, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub nodes: Vec<Node>,
    pub offline: bool,
    pub fetches: usize,
}

impl MemorySource {
    pub fn new(nodes: Vec<Node>) -> Self {
        MemorySource {
            nodes,
            ..Default::default()
        }
    }
}

impl NodeSource for MemorySource {
    type Error = MemorySourceError;

    fn fetch(&mut self, scope: FetchScope) -> Result<Vec<Node>, MemorySourceError> {
        if self.offline {
            return Err(MemorySourceError::Offline);
        }
        self.fetches += 1;
        Ok(scope.apply(self.nodes.clone()))
    }

    fn patch(&mut self, id: NodeId, fields: &Map<String, Value>) -> Result<Node, MemorySourceError> {
        if self.offline {
            return Err(MemorySourceError::Offline);
        }
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(MemorySourceError::UnknownNode(id))?;
        let mut updated = self.nodes[pos].clone();
        updated
            .merge_patch(fields)
            .map_err(|source| MemorySourceError::InvalidFields { id, source })?;
        if self.nodes.iter().any(|n| n.id != id && n.code == updated.code) {
            return Err(MemorySourceError::DuplicateCode(updated.code));
        }
        if updated.is_section && updated.has_quantities() {
            return Err(MemorySourceError::SectionQuantities(updated.code));
        }
        self.nodes[pos] = updated.clone();
        Ok(updated)
    }
}
