//! Live sync over a real project directory.
//!
//! One `FileStore` plays the editing client, a `SyncSession` tailing the
//! journal plays the viewer. Time is driven explicitly through `tick(now)`.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

use wbs::io::journal::JournalTransport;
use wbs::io::project_io::JOURNAL_FILE;
use wbs::io::store::FileStore;
use wbs::model::config::SyncConfig;
use wbs::model::node::Node;
use wbs::ops::columns::{DisplayOptions, resolve};
use wbs::ops::window::FetchScope;
use wbs::sync::{ConnectionStatus, NodeSource, SyncSession};

type Session = SyncSession<JournalTransport, FileStore>;

fn config() -> SyncConfig {
    SyncConfig {
        retry_delay_ms: 500,
        max_retry_attempts: 2,
        refetch_delay_ms: 200,
        tick_ms: 10,
    }
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Project with a section and one task, plus a connected viewer
fn setup(dir: &Path) -> (FileStore, Session, Instant) {
    let wbs_dir = dir.join("wbs");
    fs::create_dir_all(&wbs_dir).unwrap();
    fs::write(wbs_dir.join(JOURNAL_FILE), "").unwrap();

    let mut writer = FileStore::open(&wbs_dir);
    writer.create(Node::section(0, "1", "Earthworks", None)).unwrap();
    writer
        .create(Node {
            volume_plan: Some(10.0),
            volume_fact: Some(4.0),
            labor_per_unit: Some(2.0),
            ..Node::task(0, "1.1", "Excavation", Some("1"))
        })
        .unwrap();

    let mut session = SyncSession::new(
        JournalTransport::new(&writer.journal_path()),
        FileStore::open(&wbs_dir),
        FetchScope::All,
        &config(),
    );
    let t0 = Instant::now();
    session.start(t0).unwrap();
    session.tick(t0);
    assert_eq!(session.status(), ConnectionStatus::Connected);
    (writer, session, t0)
}

fn labor_cells(session: &Session) -> Vec<String> {
    let cols = resolve(&["labor_total"]).unwrap();
    session
        .view(&cols, &DisplayOptions::default(), " / ")
        .rows
        .into_iter()
        .map(|r| r.cells[0].clone())
        .collect()
}

#[test]
fn viewer_follows_writes() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (mut writer, mut session, t0) = setup(tmp.path());
    assert_eq!(labor_cells(&session), vec!["20", "20"]);

    writer
        .create(Node {
            volume_plan: Some(5.0),
            labor_per_unit: Some(3.0),
            ..Node::task(0, "1.2", "Haulage", Some("1"))
        })
        .unwrap();
    let report = session.tick(t0 + Duration::from_millis(10));
    assert_eq!(report.applied, 1);
    assert_eq!(labor_cells(&session), vec!["35", "20", "15"]);

    writer.patch(2, &fields(json!({"volume_plan": 20}))).unwrap();
    writer.delete(3).unwrap();
    let report = session.tick(t0 + Duration::from_millis(20));
    assert_eq!(report.applied, 2);
    assert_eq!(labor_cells(&session), vec!["40", "40"]);
}

#[test]
fn clear_then_refetch() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (mut writer, mut session, t0) = setup(tmp.path());

    writer.clear().unwrap();
    writer.import(&[Node::section(7, "5", "Finishing", None)]).unwrap();

    let t1 = t0 + Duration::from_millis(10);
    session.tick(t1);
    assert!(session.nodes().is_empty());

    // Re-fetch waits for the configured delay
    let report = session.tick(t1 + Duration::from_millis(100));
    assert!(!report.refetched);
    let report = session.tick(t1 + Duration::from_millis(200));
    assert!(report.refetched);
    let codes: Vec<&str> = session.nodes().iter().map(|n| n.code.as_str()).collect();
    assert_eq!(codes, vec!["5"]);
}

#[test]
fn journal_loss_and_recovery() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (writer, mut session, t0) = setup(tmp.path());
    let journal = writer.journal_path();

    fs::remove_file(&journal).unwrap();
    let t1 = t0 + Duration::from_millis(10);
    let report = session.tick(t1);
    assert!(report.status_changed);
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert_eq!(session.connection().retries(), 1);

    // Retry while the journal is still missing fails immediately
    let t2 = t1 + Duration::from_millis(500);
    session.tick(t2);
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert_eq!(session.connection().retries(), 2);

    let t3 = t2 + Duration::from_millis(500);
    session.tick(t3);
    assert!(session.connection().exhausted());
    session.tick(t3 + Duration::from_secs(10));
    assert_eq!(session.status(), ConnectionStatus::Disconnected);

    // Manual reconnect once the journal is back; the node list is refreshed
    // since events may have been missed in between
    fs::write(&journal, "").unwrap();
    let mut offline = FileStore::open(journal.parent().unwrap());
    offline.patch(2, &fields(json!({"executor": "Ivanov"}))).unwrap();

    let t4 = t3 + Duration::from_secs(20);
    session.reconnect(t4);
    assert_eq!(session.status(), ConnectionStatus::Connecting);
    let report = session.tick(t4);
    assert!(report.refetched);
    assert_eq!(session.status(), ConnectionStatus::Connected);
    assert_eq!(session.nodes()[1].executor.as_deref(), Some("Ivanov"));
}

#[test]
fn malformed_lines_are_skipped() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (writer, mut session, t0) = setup(tmp.path());

    let mut text = fs::read_to_string(writer.journal_path()).unwrap();
    text.push_str("not json\n");
    text.push_str(
        &serde_json::to_string(&json!({
            "type": "task_deleted",
            "data": {"id": 2}
        }))
        .unwrap(),
    );
    text.push('\n');
    fs::write(writer.journal_path(), text).unwrap();

    let report = session.tick(t0 + Duration::from_millis(10));
    assert_eq!(report.malformed, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(session.nodes().len(), 1);
}
