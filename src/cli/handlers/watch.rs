use std::io::{BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cli::commands::WatchArgs;
use crate::cli::output::{WatchFrameJson, format_table, format_table_footer};
use crate::io::journal::JournalTransport;
use crate::io::project_io::Project;
use crate::io::store::FileStore;
use crate::ops::columns::Column;
use crate::sync::SyncSession;

use super::{build_filters, display_options, fetch_scope, load_project_cwd, resolve_columns};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Keyboard commands read from stdin, one per line
enum Key {
    Reconnect,
    Quit,
}

/// Forward stdin lines as keys. The thread ends with stdin.
fn spawn_stdin_reader() -> Receiver<Key> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let key = match line.trim() {
                "r" => Key::Reconnect,
                "q" => Key::Quit,
                _ => continue,
            };
            if tx.send(key).is_err() {
                break;
            }
        }
    });
    rx
}

struct Renderer<'a> {
    project: &'a Project,
    columns: Vec<&'static Column>,
    json: bool,
    clear: bool,
}

impl Renderer<'_> {
    fn frame(&self, session: &SyncSession<JournalTransport, FileStore>) -> std::io::Result<()> {
        let view = session.view(
            &self.columns,
            &display_options(self.project),
            &self.project.config.display.breadcrumb_separator,
        );
        let mut out = std::io::stdout().lock();

        if self.json {
            let frame = WatchFrameJson {
                revision: session.revision(),
                status: session.status(),
                view: &view,
            };
            writeln!(out, "{}", serde_json::to_string(&frame)?)?;
            return out.flush();
        }

        if self.clear {
            write!(out, "{}", CLEAR_SCREEN)?;
        }
        writeln!(
            out,
            "{} | {} | {}",
            self.project.config.project.name,
            session.status(),
            format_table_footer(&view)
        )?;
        writeln!(out)?;
        if view.rows.is_empty() {
            writeln!(out, "{}", if view.total == 0 { "no nodes" } else { "no matching rows" })?;
        } else {
            for line in format_table(&view, 40) {
                writeln!(out, "{}", line)?;
            }
        }
        if session.connection().exhausted() {
            writeln!(out)?;
            writeln!(out, "connection lost; enter r to reconnect")?;
        }
        out.flush()
    }
}

pub fn cmd_watch(args: WatchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let columns = resolve_columns(&project, &args.columns)?;
    let scope = fetch_scope(&args.view)?;

    let store = FileStore::open(&project.wbs_dir);
    let transport = JournalTransport::new(&project.journal_path());
    let mut session = SyncSession::new(transport, store, scope, &project.config.sync);
    *session.filters_mut() = build_filters(&project, &args.view)?;

    let renderer = Renderer {
        project: &project,
        columns,
        json,
        clear: !json && std::io::stdout().is_terminal(),
    };

    let started = Instant::now();
    let deadline = args.duration.map(|s| started + Duration::from_secs(s));
    let keys = spawn_stdin_reader();
    let mut stdin_open = true;

    session.start(started)?;
    info!(project = %project.config.project.name, "watching");
    renderer.frame(&session)?;
    let mut last_status = session.status();

    loop {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }

        while stdin_open {
            match keys.try_recv() {
                Ok(Key::Reconnect) => {
                    debug!("manual reconnect");
                    session.reconnect(now);
                }
                Ok(Key::Quit) => {
                    session.shutdown();
                    return Ok(());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => stdin_open = false,
            }
        }

        let report = session.tick(now);
        let status = session.status();
        if report.changed() || status != last_status {
            renderer.frame(&session)?;
            last_status = status;
        }
        std::thread::sleep(project.config.sync.tick());
    }

    session.shutdown();
    Ok(())
}
