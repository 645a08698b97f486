use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::code::compare_codes;
use crate::model::event::SyncEvent;
use crate::model::node::{Node, NodeId};

/// What applying one event did to the node list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Merged,
    Removed,
    Cleared,
    /// The event left the list as it was (unknown id, echo, ignored type)
    Unchanged,
}

impl Applied {
    pub fn changed(self) -> bool {
        self != Applied::Unchanged
    }
}

/// The client's copy of the node list, kept in code order.
///
/// Every mutation goes through `apply`, `patch_local` or `replace_all`;
/// derived data (tree, rollups, filters) is recomputed from `nodes()` by the
/// caller and never cached here.
#[derive(Debug, Clone)]
pub struct Reconciler {
    nodes: Vec<Node>,
    revision: u64,
    refetch_delay: Duration,
    pending_refetch: Option<Instant>,
}

impl Reconciler {
    pub fn new(refetch_delay: Duration) -> Self {
        Reconciler {
            nodes: Vec::new(),
            revision: 0,
            refetch_delay,
            pending_refetch: None,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Bumped on every change to the list
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pending_refetch(&self) -> Option<Instant> {
        self.pending_refetch
    }

    /// Replace the whole list with a fresh fetch and cancel any pending
    /// re-fetch.
    pub fn replace_all(&mut self, mut nodes: Vec<Node>) {
        sort_by_code(&mut nodes);
        self.nodes = nodes;
        self.pending_refetch = None;
        self.revision += 1;
    }

    /// Ask for a full re-fetch at `at` (an earlier pending request wins)
    pub fn schedule_refetch(&mut self, at: Instant) {
        self.pending_refetch = Some(match self.pending_refetch {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
    }

    /// Push a due re-fetch back (after a failed fetch)
    pub fn defer_refetch(&mut self, now: Instant) {
        self.pending_refetch = Some(now + self.refetch_delay);
    }

    pub fn refetch_due(&self, now: Instant) -> bool {
        self.pending_refetch.is_some_and(|at| now >= at)
    }

    pub fn apply(&mut self, event: SyncEvent, now: Instant) -> Applied {
        let applied = match event {
            SyncEvent::Created(node) => self.insert(node),
            SyncEvent::Updated { id, fields } => self.merge(id, &fields),
            SyncEvent::Deleted(id) => self.remove(id),
            SyncEvent::ClearAll => {
                self.nodes.clear();
                self.schedule_refetch(now + self.refetch_delay);
                Applied::Cleared
            }
            SyncEvent::Ignored(kind) => {
                debug!(kind = kind.as_str(), "ignoring event");
                Applied::Unchanged
            }
        };
        if applied.changed() {
            self.revision += 1;
        }
        applied
    }

    /// Optimistic local edit ahead of the server echo
    pub fn patch_local(&mut self, id: NodeId, fields: &Map<String, Value>) -> Applied {
        let applied = self.merge(id, fields);
        if applied.changed() {
            self.revision += 1;
        }
        applied
    }

    fn insert(&mut self, node: Node) -> Applied {
        if self.position(node.id).is_some() {
            // A create for a known id carries the full record: merge it
            let fields = match serde_json::to_value(&node) {
                Ok(Value::Object(map)) => map,
                _ => return Applied::Unchanged,
            };
            return self.merge(node.id, &fields);
        }
        self.nodes.push(node);
        sort_by_code(&mut self.nodes);
        Applied::Inserted
    }

    fn merge(&mut self, id: NodeId, fields: &Map<String, Value>) -> Applied {
        let Some(pos) = self.position(id) else {
            debug!(id, "update for unknown node");
            return Applied::Unchanged;
        };
        let node = &mut self.nodes[pos];
        let before = node.clone();
        if let Err(e) = node.merge_patch(fields) {
            warn!(id, error = %e, "dropping update with invalid fields");
            return Applied::Unchanged;
        }
        if *node == before {
            return Applied::Unchanged;
        }
        if node.code != before.code {
            sort_by_code(&mut self.nodes);
        }
        Applied::Merged
    }

    fn remove(&mut self, id: NodeId) -> Applied {
        match self.position(id) {
            Some(pos) => {
                self.nodes.remove(pos);
                Applied::Removed
            }
            None => Applied::Unchanged,
        }
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

/// Stable, so nodes with equal codes keep arrival order
fn sort_by_code(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| compare_codes(&a.code, &b.code));
}
