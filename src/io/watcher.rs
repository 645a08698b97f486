use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the journal transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    /// The journal was created or written to
    Appended,
    /// The journal was deleted or renamed away
    Removed,
    /// The watcher itself failed
    Failed(String),
}

/// A file system watcher for a single journal file.
///
/// Watches the containing directory (non-recursively) so removal and
/// re-creation of the file are both seen.
pub struct JournalWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<JournalEvent>,
}

impl JournalWatcher {
    /// Start watching `journal`.
    /// Returns a `JournalWatcher` whose `poll()` method should be called each tick.
    pub fn start(journal: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let dir = journal.parent().unwrap_or(Path::new(".")).to_path_buf();
        let file_name: Option<OsString> = journal.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        let _ = tx.send(JournalEvent::Failed(e.to_string()));
                        return;
                    }
                };

                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if !ours {
                    return;
                }

                let mapped = match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => JournalEvent::Appended,
                    EventKind::Remove(_) => JournalEvent::Removed,
                    _ => return,
                };
                let _ = tx.send(mapped);
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(JournalWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<JournalEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}
