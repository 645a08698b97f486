use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use crate::model::event::{Envelope, EventKind};

/// What a transport hands back on `poll()`, in arrival order.
///
/// Connection status changes travel through the same queue as events so the
/// session sees them interleaved exactly as they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportMessage {
    /// Connection attempt `attempt` is live
    Opened { attempt: u64 },
    /// Connection attempt `attempt` ended
    Closed { attempt: u64, reason: String },
    /// A subscribed event envelope
    Event(Envelope),
    /// A message that could not be decoded as an envelope
    Malformed(String),
}

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("event source unavailable: {0}")]
    Unavailable(String),
    #[error("could not watch {path}: {source}")]
    Watch {
        path: std::path::PathBuf,
        source: notify::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Push channel delivering mutation events.
///
/// Implementations must keep at most one live connection: `connect` drops
/// whatever connection was live before, and every `Opened`/`Closed` message
/// carries the attempt number it belongs to so late notifications from a
/// superseded attempt can be discarded.
pub trait Transport {
    fn connect(&mut self, attempt: u64) -> Result<(), TransportError>;
    fn disconnect(&mut self);
    fn subscribe(&mut self, kinds: &[EventKind]);
    fn unsubscribe(&mut self, kinds: &[EventKind]);
    /// Non-blocking; returns everything queued since the last call
    fn poll(&mut self) -> Vec<TransportMessage>;
}

/// Event-type subscription set shared by transport implementations
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    kinds: HashSet<EventKind>,
}

impl Subscriptions {
    pub fn add(&mut self, kinds: &[EventKind]) {
        self.kinds.extend(kinds.iter().copied());
    }

    pub fn remove(&mut self, kinds: &[EventKind]) {
        for k in kinds {
            self.kinds.remove(k);
        }
    }

    /// Whether an envelope should be delivered. Envelopes with an unknown
    /// type tag are let through so the session can report them.
    pub fn wants(&self, envelope: &Envelope) -> bool {
        match envelope.event_kind() {
            Some(kind) => self.kinds.contains(&kind),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// In-process channel transport
// ---------------------------------------------------------------------------

enum Wire {
    Envelope(Envelope),
    Raw(String),
    Drop(String),
}

/// Sending half of a `ChannelTransport`; may live on another thread.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Wire>,
    available: Arc<AtomicBool>,
}

impl ChannelPublisher {
    pub fn publish(&self, envelope: Envelope) {
        let _ = self.tx.send(Wire::Envelope(envelope));
    }

    /// Deliver an undecoded message as-is
    pub fn publish_raw(&self, text: &str) {
        let _ = self.tx.send(Wire::Raw(text.to_string()));
    }

    /// Sever the live connection (the subscriber sees `Closed`)
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.tx.send(Wire::Drop(reason.to_string()));
    }

    /// Make future `connect` calls fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

/// Transport fed by an in-process channel.
///
/// Messages published while no connection is live are lost, as they would
/// be on a real socket.
pub struct ChannelTransport {
    rx: mpsc::Receiver<Wire>,
    available: Arc<AtomicBool>,
    live: Option<u64>,
    queue: Vec<TransportMessage>,
    subscriptions: Subscriptions,
}

impl ChannelTransport {
    pub fn new() -> (ChannelTransport, ChannelPublisher) {
        let (tx, rx) = mpsc::channel();
        let available = Arc::new(AtomicBool::new(true));
        (
            ChannelTransport {
                rx,
                available: available.clone(),
                live: None,
                queue: Vec::new(),
                subscriptions: Subscriptions::default(),
            },
            ChannelPublisher { tx, available },
        )
    }
}

impl Transport for ChannelTransport {
    fn connect(&mut self, attempt: u64) -> Result<(), TransportError> {
        self.disconnect();
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("channel closed to new connections".into()));
        }
        // Anything sent before this connection existed is gone
        while self.rx.try_recv().is_ok() {}
        self.live = Some(attempt);
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
        while let Ok(wire) = self.rx.try_recv() {
            let Some(attempt) = self.live else { continue };
            match wire {
                Wire::Envelope(env) => {
                    if self.subscriptions.wants(&env) {
                        self.queue.push(TransportMessage::Event(env));
                    }
                }
                Wire::Raw(text) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(env) if self.subscriptions.wants(&env) => {
                        self.queue.push(TransportMessage::Event(env))
                    }
                    Ok(_) => {}
                    Err(_) => self.queue.push(TransportMessage::Malformed(text)),
                },
                Wire::Drop(reason) => {
                    self.live = None;
                    self.queue.push(TransportMessage::Closed { attempt, reason });
                }
            }
        }
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::SyncEvent;

    #[test]
    fn delivers_only_subscribed_kinds_while_live() {
        let (mut transport, publisher) = ChannelTransport::new();
        transport.subscribe(&[EventKind::TaskDeleted]);

        publisher.publish(SyncEvent::Deleted(1).to_envelope());
        transport.connect(1).unwrap();
        publisher.publish(SyncEvent::Deleted(2).to_envelope());
        publisher.publish(SyncEvent::ClearAll.to_envelope());

        let msgs = transport.poll();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], TransportMessage::Opened { attempt: 1 });
        let TransportMessage::Event(env) = &msgs[1] else {
            panic!("expected event");
        };
        assert_eq!(env.data["id"], 2);
    }

    #[test]
    fn drop_and_refuse() {
        let (mut transport, publisher) = ChannelTransport::new();
        transport.connect(1).unwrap();
        publisher.drop_connection("server restart");
        let msgs = transport.poll();
        assert_eq!(
            msgs.last(),
            Some(&TransportMessage::Closed {
                attempt: 1,
                reason: "server restart".into()
            })
        );

        publisher.set_available(false);
        assert!(transport.connect(2).is_err());
        publisher.set_available(true);
        assert!(transport.connect(3).is_ok());
    }

    #[test]
    fn raw_garbage_is_reported() {
        let (mut transport, publisher) = ChannelTransport::new();
        transport.subscribe(&EventKind::MUTATIONS);
        transport.connect(1).unwrap();
        publisher.publish_raw("{not json");
        let msgs = transport.poll();
        assert_eq!(msgs[1], TransportMessage::Malformed("{not json".into()));
    }
}
