use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::model::config::SyncConfig;
use crate::model::event::{EventKind, SyncEvent};
use crate::model::node::{Node, NodeId};
use crate::ops::columns::{Column, DisplayOptions};
use crate::ops::filter::{self, FilterError, FilterSet};
use crate::ops::tree::TreeIndex;
use crate::ops::view::{self, View};
use crate::ops::window::FetchScope;
use crate::sync::connection::{Connection, ConnectionStatus, RetryPolicy};
use crate::sync::reconciler::{Applied, Reconciler};
use crate::sync::source::NodeSource;
use crate::sync::transport::{Transport, TransportMessage};

/// What one `tick` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events that changed the node list
    pub applied: usize,
    /// Undecodable messages dropped
    pub malformed: usize,
    pub status_changed: bool,
    pub refetched: bool,
}

impl TickReport {
    /// Whether the view needs rebuilding
    pub fn changed(&self) -> bool {
        self.applied > 0 || self.refetched
    }
}

/// A live view over a node source kept current by a transport.
///
/// Drive it by calling `tick(now)` periodically: each tick drains the
/// transport in arrival order, applies events one at a time, then runs any
/// due reconnect or re-fetch.
pub struct SyncSession<T: Transport, S: NodeSource> {
    transport: T,
    source: S,
    scope: FetchScope,
    connection: Connection,
    reconciler: Reconciler,
    filters: FilterSet,
}

impl<T: Transport, S: NodeSource> SyncSession<T, S> {
    pub fn new(transport: T, source: S, scope: FetchScope, config: &SyncConfig) -> Self {
        SyncSession {
            transport,
            source,
            scope,
            connection: Connection::new(RetryPolicy::from(config)),
            reconciler: Reconciler::new(config.refetch_delay()),
            filters: FilterSet::new(),
        }
    }

    /// Initial fetch, subscribe to mutations, connect.
    ///
    /// Only the initial fetch can fail; connection problems are retried.
    pub fn start(&mut self, now: Instant) -> Result<(), S::Error> {
        let nodes = self.source.fetch(self.scope)?;
        info!(count = nodes.len(), "initial fetch");
        self.reconciler.replace_all(nodes);
        self.transport.subscribe(&EventKind::MUTATIONS);
        self.connect(now);
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        for msg in self.transport.poll() {
            self.handle(msg, now, &mut report);
        }

        if self.connection.retry_due(now) {
            info!(retry = self.connection.retries(), "reconnecting");
            self.connect(now);
            report.status_changed = true;
        }

        if self.reconciler.refetch_due(now) {
            report.refetched = self.refetch(now);
        }

        report
    }

    /// User-initiated reconnect; resets the retry budget
    pub fn reconnect(&mut self, now: Instant) {
        self.connection.reset_retries();
        self.transport.disconnect();
        self.connect(now);
    }

    pub fn shutdown(&mut self) {
        self.transport.disconnect();
        self.connection.stopped();
    }

    /// Inline edit: merge locally, then write through to the source.
    ///
    /// If the source rejects the patch a full re-fetch is scheduled to undo
    /// the optimistic change.
    pub fn patch_node(
        &mut self,
        id: NodeId,
        fields: &Map<String, Value>,
        now: Instant,
    ) -> Result<Applied, S::Error> {
        let applied = self.reconciler.patch_local(id, fields);
        if let Err(e) = self.source.patch(id, fields) {
            warn!(id, error = %e, "patch rejected, reverting");
            self.reconciler.schedule_refetch(now);
            return Err(e);
        }
        Ok(applied)
    }

    /// Switch scope and fetch it on the next tick
    pub fn set_scope(&mut self, scope: FetchScope, now: Instant) {
        if scope != self.scope {
            self.scope = scope;
            self.reconciler.schedule_refetch(now);
        }
    }

    pub fn view(&self, columns: &[&'static Column], opts: &DisplayOptions, breadcrumb_sep: &str) -> View {
        view::build_view(self.reconciler.nodes(), &self.filters, columns, opts, breadcrumb_sep)
    }

    pub fn available_values(
        &self,
        column: &str,
        opts: &DisplayOptions,
        limit: usize,
    ) -> Result<Vec<String>, FilterError> {
        let index = TreeIndex::build(self.reconciler.nodes());
        filter::available_values(&index, &self.filters, column, opts, limit)
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }

    pub fn nodes(&self) -> &[Node] {
        self.reconciler.nodes()
    }

    pub fn revision(&self) -> u64 {
        self.reconciler.revision()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn scope(&self) -> FetchScope {
        self.scope
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn connect(&mut self, now: Instant) {
        let attempt = self.connection.begin_attempt();
        debug!(attempt, "connecting");
        if let Err(e) = self.transport.connect(attempt) {
            warn!(attempt, error = %e, "connect failed");
            self.connection.closed(attempt, now);
        }
    }

    fn handle(&mut self, msg: TransportMessage, now: Instant, report: &mut TickReport) {
        match msg {
            TransportMessage::Opened { attempt } => match self.connection.opened(attempt) {
                Some(reconnected) => {
                    info!(attempt, "connected");
                    report.status_changed = true;
                    if reconnected {
                        // Missed events cannot be replayed
                        self.reconciler.schedule_refetch(now);
                    }
                }
                None => debug!(attempt, "stale open ignored"),
            },
            TransportMessage::Closed { attempt, reason } => {
                if self.connection.closed(attempt, now) {
                    warn!(attempt, %reason, "connection lost");
                    if self.connection.exhausted() {
                        warn!("giving up reconnecting");
                    }
                    report.status_changed = true;
                } else {
                    debug!(attempt, "stale close ignored");
                }
            }
            TransportMessage::Event(envelope) => match SyncEvent::from_envelope(envelope) {
                Ok(event) => {
                    if self.apply_in_scope(event, now).changed() {
                        report.applied += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "dropping event");
                    report.malformed += 1;
                }
            },
            TransportMessage::Malformed(text) => {
                warn!(len = text.len(), "dropping malformed message");
                report.malformed += 1;
            }
        }
    }

    /// Apply an event, keeping the list inside the current scope.
    ///
    /// Creates outside the scope are dropped and a node an update moves out
    /// of scope is removed. An update for a node not held here may move it
    /// into scope; the partial payload cannot rebuild it, so that schedules
    /// a re-fetch.
    fn apply_in_scope(&mut self, event: SyncEvent, now: Instant) -> Applied {
        let scope = self.scope;
        if scope == FetchScope::All {
            return self.reconciler.apply(event, now);
        }
        match event {
            SyncEvent::Created(node) if !scope.contains(&node) => {
                debug!(id = node.id, "create outside scope");
                self.reconciler.apply(SyncEvent::Deleted(node.id), now)
            }
            SyncEvent::Updated { id, fields } => {
                if self.reconciler.get(id).is_none() {
                    if fields.keys().any(|k| FetchScope::depends_on(k)) {
                        debug!(id, "update may enter scope");
                        self.reconciler.schedule_refetch(now);
                    }
                    return Applied::Unchanged;
                }
                let applied = self.reconciler.apply(SyncEvent::Updated { id, fields }, now);
                if self.reconciler.get(id).is_some_and(|n| !scope.contains(n)) {
                    debug!(id, "update left scope");
                    return self.reconciler.apply(SyncEvent::Deleted(id), now);
                }
                applied
            }
            event => self.reconciler.apply(event, now),
        }
    }

    fn refetch(&mut self, now: Instant) -> bool {
        match self.source.fetch(self.scope) {
            Ok(nodes) => {
                info!(count = nodes.len(), "re-fetched");
                self.reconciler.replace_all(nodes);
                true
            }
            Err(e) => {
                warn!(error = %e, "re-fetch failed");
                self.reconciler.defer_refetch(now);
                false
            }
        }
    }
}
