use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::io::watcher::{JournalEvent, JournalWatcher};
use crate::model::event::{Envelope, EventKind};
use crate::sync::transport::{Subscriptions, Transport, TransportError, TransportMessage};

/// Transport that tails a project's `events.jsonl`.
///
/// A connection attaches at the current end of the journal; only lines
/// appended afterwards are delivered. The connection closes if the journal
/// disappears, shrinks, or the watcher fails.
pub struct JournalTransport {
    path: PathBuf,
    live: Option<Tail>,
    queue: Vec<TransportMessage>,
    subscriptions: Subscriptions,
}

struct Tail {
    attempt: u64,
    offset: u64,
    /// Trailing bytes of a line not yet terminated by `\n`
    partial: Vec<u8>,
    watcher: JournalWatcher,
}

impl JournalTransport {
    pub fn new(path: &Path) -> Self {
        JournalTransport {
            path: path.to_path_buf(),
            live: None,
            queue: Vec::new(),
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self, reason: String) {
        if let Some(tail) = self.live.take() {
            self.queue.push(TransportMessage::Closed {
                attempt: tail.attempt,
                reason,
            });
        }
    }

    fn deliver(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => {
                if self.subscriptions.wants(&envelope) {
                    self.queue.push(TransportMessage::Event(envelope));
                }
            }
            Err(_) => self.queue.push(TransportMessage::Malformed(line.to_string())),
        }
    }
}

impl Transport for JournalTransport {
    fn connect(&mut self, attempt: u64) -> Result<(), TransportError> {
        self.disconnect();
        let offset = fs::metadata(&self.path)
            .map_err(|e| TransportError::Unavailable(format!("{}: {}", self.path.display(), e)))?
            .len();
        let watcher = JournalWatcher::start(&self.path).map_err(|source| TransportError::Watch {
            path: self.path.clone(),
            source,
        })?;
        debug!(attempt, offset, path = %self.path.display(), "attached to journal");
        self.live = Some(Tail {
            attempt,
            offset,
            partial: Vec::new(),
            watcher,
        });
        self.queue.push(TransportMessage::Opened { attempt });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.live = None;
    }

    fn subscribe(&mut self, kinds: &[EventKind]) {
        self.subscriptions.add(kinds);
    }

    fn unsubscribe(&mut self, kinds: &[EventKind]) {
        self.subscriptions.remove(kinds);
    }

    fn poll(&mut self) -> Vec<TransportMessage> {
        let Some(tail) = self.live.as_mut() else {
            return std::mem::take(&mut self.queue);
        };

        let mut closed = None;
        for event in tail.watcher.poll() {
            match event {
                JournalEvent::Appended => {}
                JournalEvent::Removed => closed = Some("journal removed".to_string()),
                JournalEvent::Failed(e) => closed = Some(format!("watcher failed: {}", e)),
            }
        }

        // Read regardless of watcher events; notify may coalesce or lag
        let lines = match closed {
            None => read_appended(&self.path, tail),
            Some(_) => Ok(Vec::new()),
        };
        match lines {
            Ok(lines) => {
                for line in lines {
                    self.deliver(&line);
                }
            }
            Err(e) => closed = Some(e.to_string()),
        }

        if let Some(reason) = closed {
            self.close(reason);
        }
        std::mem::take(&mut self.queue)
    }
}

/// Read complete lines appended since `tail.offset`
fn read_appended(path: &Path, tail: &mut Tail) -> io::Result<Vec<String>> {
    let len = fs::metadata(path)?.len();
    if len < tail.offset {
        return Err(io::Error::other("journal truncated"));
    }
    if len == tail.offset {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(tail.offset))?;
    let mut buf = Vec::new();
    let read = file.take(len - tail.offset).read_to_end(&mut buf)?;
    tail.offset += read as u64;
    tail.partial.extend_from_slice(&buf);

    let Some(last_newline) = tail.partial.iter().rposition(|&b| b == b'\n') else {
        return Ok(Vec::new());
    };
    let rest = tail.partial.split_off(last_newline + 1);
    let complete = std::mem::replace(&mut tail.partial, rest);
    Ok(String::from_utf8_lossy(&complete)
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::SyncEvent;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn setup() -> (TempDir, PathBuf, JournalTransport) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        fs::write(&path, "").unwrap();
        let mut transport = JournalTransport::new(&path);
        transport.subscribe(&EventKind::MUTATIONS);
        (tmp, path, transport)
    }

    fn line(event: SyncEvent) -> String {
        format!("{}\n", serde_json::to_string(&event.to_envelope()).unwrap())
    }

    #[test]
    fn missing_journal_refuses_connection() {
        let tmp = TempDir::new().unwrap();
        let mut transport = JournalTransport::new(&tmp.path().join("events.jsonl"));
        assert!(matches!(
            transport.connect(1),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[test]
    fn delivers_lines_appended_after_connect() {
        let (_tmp, path, mut transport) = setup();
        append(&path, &line(SyncEvent::Deleted(1)));
        transport.connect(1).unwrap();
        append(&path, &line(SyncEvent::Deleted(2)));

        let msgs = transport.poll();
        assert_eq!(msgs[0], TransportMessage::Opened { attempt: 1 });
        assert_eq!(msgs.len(), 2);
        let TransportMessage::Event(env) = &msgs[1] else {
            panic!("expected event, got {:?}", msgs[1]);
        };
        assert_eq!(env.data["id"], 2);
    }

    #[test]
    fn partial_lines_wait_for_newline() {
        let (_tmp, path, mut transport) = setup();
        transport.connect(1).unwrap();
        transport.poll();

        let full = line(SyncEvent::Deleted(5));
        let (head, tail) = full.split_at(10);
        append(&path, head);
        assert!(transport.poll().is_empty());
        append(&path, tail);
        assert_eq!(transport.poll().len(), 1);
    }

    #[test]
    fn garbage_lines_are_reported() {
        let (_tmp, path, mut transport) = setup();
        transport.connect(1).unwrap();
        transport.poll();
        append(&path, "not json\n\n");
        assert_eq!(
            transport.poll(),
            vec![TransportMessage::Malformed("not json".into())]
        );
    }

    #[test]
    fn removal_closes_the_connection() {
        let (_tmp, path, mut transport) = setup();
        transport.connect(3).unwrap();
        transport.poll();
        fs::remove_file(&path).unwrap();

        let msgs = transport.poll();
        assert!(matches!(
            msgs.last(),
            Some(TransportMessage::Closed { attempt: 3, .. })
        ));
        // Closed once only
        assert!(transport.poll().is_empty());
        assert!(transport.connect(4).is_err());
    }

    #[test]
    fn truncation_closes_the_connection() {
        let (_tmp, path, mut transport) = setup();
        append(&path, &line(SyncEvent::Deleted(1)));
        transport.connect(1).unwrap();
        transport.poll();
        fs::write(&path, "").unwrap();
        let msgs = transport.poll();
        assert!(matches!(msgs.last(), Some(TransportMessage::Closed { .. })));
    }
}
