use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::io::lock::{self, LockError, WriteLock};
use crate::io::project_io::{JOURNAL_FILE, NODES_FILE, atomic_write};
use crate::model::event::{Envelope, EventKind, SyncEvent};
use crate::model::node::{Node, NodeId};
use crate::ops::window::FetchScope;
use crate::sync::source::NodeSource;

/// Error type for node store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
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
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// File-backed authoritative node store.
///
/// `nodes.json` holds the full list; every mutation rewrites it atomically
/// and then appends the matching broadcast envelope to `events.jsonl`, both
/// under the project lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    wbs_dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    pub fn open(wbs_dir: &Path) -> Self {
        FileStore {
            wbs_dir: wbs_dir.to_path_buf(),
            lock_timeout: lock::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.wbs_dir.join(NODES_FILE)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.wbs_dir.join(JOURNAL_FILE)
    }

    /// Read every node. A missing file is an empty schedule.
    pub fn load(&self) -> Result<Vec<Node>, StoreError> {
        let path = self.nodes_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::ReadError { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::ParseError { path, source })
    }

    /// Add a node, assigning the next free id. Returns the stored node.
    pub fn create(&mut self, mut node: Node) -> Result<Node, StoreError> {
        let _lock = self.lock()?;
        let mut nodes = self.load()?;
        node.id = nodes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        validate(&node, &nodes)?;
        nodes.push(node.clone());
        self.save(&nodes)?;
        self.append(&SyncEvent::Created(node.clone()).to_envelope())?;
        info!(id = node.id, code = %node.code, "created node");
        Ok(node)
    }

    /// Remove a node by id
    pub fn delete(&mut self, id: NodeId) -> Result<Node, StoreError> {
        let _lock = self.lock()?;
        let mut nodes = self.load()?;
        let pos = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(StoreError::UnknownNode(id))?;
        let removed = nodes.remove(pos);
        self.save(&nodes)?;
        self.append(&SyncEvent::Deleted(id).to_envelope())?;
        info!(id, code = %removed.code, "deleted node");
        Ok(removed)
    }

    /// Delete everything. Returns how many nodes were removed.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let _lock = self.lock()?;
        let count = self.load()?.len();
        self.save(&[])?;
        self.append(&Envelope::new(
            EventKind::ScheduleCleared,
            serde_json::json!({ "message": "schedule cleared", "deleted_count": count }),
        ))?;
        info!(count, "cleared schedule");
        Ok(count)
    }

    /// Replace the whole list (bulk import). Live views are told to clear
    /// and re-fetch, since no per-node events are sent.
    pub fn import(&mut self, nodes: &[Node]) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        self.save(nodes)?;
        self.append(&Envelope::new(
            EventKind::ScheduleCleared,
            serde_json::json!({ "message": "schedule imported", "imported_count": nodes.len() }),
        ))?;
        info!(count = nodes.len(), "imported schedule");
        Ok(())
    }

    fn lock(&self) -> Result<WriteLock, StoreError> {
        Ok(WriteLock::acquire(&self.wbs_dir, self.lock_timeout)?)
    }

    fn save(&self, nodes: &[Node]) -> Result<(), StoreError> {
        let path = self.nodes_path();
        let mut text = serde_json::to_string_pretty(nodes).map_err(|source| StoreError::ParseError {
            path: path.clone(),
            source,
        })?;
        text.push('\n');
        atomic_write(&path, text.as_bytes()).map_err(|source| StoreError::WriteError { path, source })
    }

    fn append(&self, envelope: &Envelope) -> Result<(), StoreError> {
        let path = self.journal_path();
        let mut line = serde_json::to_string(envelope).map_err(|source| StoreError::ParseError {
            path: path.clone(),
            source,
        })?;
        line.push('\n');
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.flush()
        };
        write().map_err(|source| StoreError::WriteError {
            path: path.clone(),
            source,
        })?;
        debug!(kind = %envelope.kind, "journal append");
        Ok(())
    }
}

/// Reject a node that would share its code with another id, or a section
/// holding quantities.
fn validate(node: &Node, nodes: &[Node]) -> Result<(), StoreError> {
    if nodes.iter().any(|n| n.id != node.id && n.code == node.code) {
        return Err(StoreError::DuplicateCode(node.code.clone()));
    }
    if node.is_section && node.has_quantities() {
        return Err(StoreError::SectionQuantities(node.code.clone()));
    }
    Ok(())
}

impl NodeSource for FileStore {
    type Error = StoreError;

    fn fetch(&mut self, scope: FetchScope) -> Result<Vec<Node>, StoreError> {
        Ok(scope.apply(self.load()?))
    }

    fn patch(&mut self, id: NodeId, fields: &Map<String, Value>) -> Result<Node, StoreError> {
        let _lock = self.lock()?;
        let mut nodes = self.load()?;
        let pos = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(StoreError::UnknownNode(id))?;
        let mut updated = nodes[pos].clone();
        updated
            .merge_patch(fields)
            .map_err(|source| StoreError::InvalidFields { id, source })?;
        validate(&updated, &nodes)?;
        nodes[pos] = updated.clone();
        self.save(&nodes)?;
        self.append(
            &SyncEvent::Updated {
                id,
                fields: fields.clone(),
            }
            .to_envelope(),
        )?;
        info!(id, "patched node");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let wbs_dir = tmp.path().join("wbs");
        fs::create_dir_all(&wbs_dir).unwrap();
        let store = FileStore::open(&wbs_dir);
        (tmp, store)
    }

    fn journal(store: &FileStore) -> Vec<SyncEvent> {
        fs::read_to_string(store.journal_path())
            .unwrap()
            .lines()
            .map(|l| SyncEvent::from_json_line(l).unwrap())
            .collect()
    }

    #[test]
    fn missing_file_is_empty() {
        let (_tmp, mut store) = store();
        assert!(store.load().unwrap().is_empty());
        assert!(store.fetch(FetchScope::All).unwrap().is_empty());
    }

    #[test]
    fn create_assigns_ids_and_journals() {
        let (_tmp, mut store) = store();
        let a = store.create(Node::section(0, "1", "Earthworks", None)).unwrap();
        let b = store.create(Node::task(0, "1.1", "Dig", Some("1"))).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.load().unwrap().len(), 2);

        let events = journal(&store);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], SyncEvent::Created(b));
    }

    #[test]
    fn duplicate_code_rejected() {
        let (_tmp, mut store) = store();
        store.create(Node::section(0, "1", "a", None)).unwrap();
        let err = store.create(Node::section(0, "1", "b", None)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode(code) if code == "1"));
    }

    #[test]
    fn patch_to_taken_code_rejected() {
        let (_tmp, mut store) = store();
        store.create(Node::section(0, "1", "a", None)).unwrap();
        let b = store.create(Node::section(0, "2", "b", None)).unwrap();
        let fields = match json!({"code": "1"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let err = store.patch(b.id, &fields).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode(code) if code == "1"));

        let codes: Vec<String> = store.load().unwrap().into_iter().map(|n| n.code).collect();
        assert_eq!(codes, vec!["1", "2"]);
        assert_eq!(journal(&store).len(), 2);

        // Re-stating a node's own code is fine
        let same = match json!({"code": "2", "name": "renamed"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(store.patch(b.id, &same).unwrap().name, "renamed");
    }

    #[test]
    fn sections_never_store_quantities() {
        let (_tmp, mut store) = store();
        let with_volume = Node {
            volume_plan: Some(5.0),
            ..Node::section(0, "1", "Earthworks", None)
        };
        assert!(matches!(
            store.create(with_volume),
            Err(StoreError::SectionQuantities(code)) if code == "1"
        ));

        let task = store
            .create(Node {
                volume_plan: Some(5.0),
                ..Node::task(0, "2", "Dig", None)
            })
            .unwrap();
        let promote = match json!({"is_section": true}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(
            store.patch(task.id, &promote),
            Err(StoreError::SectionQuantities(_))
        ));
        assert!(store.load().unwrap()[0].is_task());

        // Clearing the quantity in the same patch makes the promotion valid
        let promote = match json!({"is_section": true, "volume_plan": null}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(store.patch(task.id, &promote).unwrap().is_section);
    }

    #[test]
    fn patch_writes_through_and_journals_fields() {
        let (_tmp, mut store) = store();
        let node = store.create(Node::task(0, "1", "Dig", None)).unwrap();
        let fields = match json!({"executor": "Ivanov"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let updated = store.patch(node.id, &fields).unwrap();
        assert_eq!(updated.executor.as_deref(), Some("Ivanov"));
        assert_eq!(store.load().unwrap()[0], updated);

        let events = journal(&store);
        assert_eq!(
            events[1],
            SyncEvent::Updated {
                id: node.id,
                fields: match json!({"executor": "Ivanov", "id": node.id}) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                }
            }
        );
    }

    #[test]
    fn patch_errors() {
        let (_tmp, mut store) = store();
        store.create(Node::task(0, "1", "Dig", None)).unwrap();
        let bad = match json!({"volume_plan": "many"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(
            store.patch(1, &bad),
            Err(StoreError::InvalidFields { id: 1, .. })
        ));
        assert!(matches!(
            store.patch(7, &Map::new()),
            Err(StoreError::UnknownNode(7))
        ));
        // Nothing journaled for the failures
        assert_eq!(journal(&store).len(), 1);
    }

    #[test]
    fn delete_and_clear() {
        let (_tmp, mut store) = store();
        store.create(Node::section(0, "1", "a", None)).unwrap();
        store.create(Node::task(0, "1.1", "b", Some("1"))).unwrap();
        let removed = store.delete(2).unwrap();
        assert_eq!(removed.code, "1.1");
        assert!(matches!(store.delete(2), Err(StoreError::UnknownNode(2))));

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.load().unwrap().is_empty());
        let events = journal(&store);
        assert_eq!(events.last(), Some(&SyncEvent::ClearAll));
    }

    #[test]
    fn import_replaces_and_broadcasts_clear() {
        let (_tmp, mut store) = store();
        store.create(Node::section(0, "9", "old", None)).unwrap();
        let nodes = vec![
            Node::section(10, "1", "a", None),
            Node::task(11, "1.1", "b", Some("1")),
        ];
        store.import(&nodes).unwrap();
        assert_eq!(store.load().unwrap(), nodes);
        assert_eq!(journal(&store).last(), Some(&SyncEvent::ClearAll));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_tmp, store) = store();
        fs::write(store.nodes_path(), "[{").unwrap();
        assert!(matches!(store.load(), Err(StoreError::ParseError { .. })));
    }
}
