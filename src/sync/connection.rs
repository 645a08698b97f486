use std::time::{Duration, Instant};

use serde::Serialize;

use crate::model::config::SyncConfig;

/// Transport connection status as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Fixed-delay retry with an attempt ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        RetryPolicy {
            delay: config.retry_delay(),
            max_attempts: config.max_retry_attempts,
        }
    }
}

/// Connection state machine.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected -> ...`
///
/// Every connect attempt gets a fresh attempt number; open/close
/// notifications for any other number are stale and ignored. After a drop,
/// a retry is scheduled `delay` later unless `max_attempts` consecutive
/// retries have already been spent. A successful open resets the count;
/// after exhaustion only `reset_retries` (manual reconnect) starts again.
#[derive(Debug, Clone)]
pub struct Connection {
    policy: RetryPolicy,
    status: ConnectionStatus,
    attempt: u64,
    retries: u32,
    next_retry: Option<Instant>,
    ever_connected: bool,
}

impl Connection {
    pub fn new(policy: RetryPolicy) -> Self {
        Connection {
            policy,
            status: ConnectionStatus::Disconnected,
            attempt: 0,
            retries: 0,
            next_retry: None,
            ever_connected: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Number of the most recent connect attempt
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Automatic retries spent since the last successful open
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn next_retry(&self) -> Option<Instant> {
        self.next_retry
    }

    /// Disconnected with no retry left
    pub fn exhausted(&self) -> bool {
        self.status == ConnectionStatus::Disconnected
            && self.next_retry.is_none()
            && self.retries >= self.policy.max_attempts
    }

    /// Start a new attempt, superseding any earlier one
    pub fn begin_attempt(&mut self) -> u64 {
        self.attempt += 1;
        self.status = ConnectionStatus::Connecting;
        self.next_retry = None;
        self.attempt
    }

    /// Attempt `attempt` opened. Returns `Some(true)` when this is a
    /// reconnect after an earlier live connection, `None` if stale.
    pub fn opened(&mut self, attempt: u64) -> Option<bool> {
        if attempt != self.attempt {
            return None;
        }
        let reconnect = self.ever_connected;
        self.status = ConnectionStatus::Connected;
        self.retries = 0;
        self.next_retry = None;
        self.ever_connected = true;
        Some(reconnect)
    }

    /// Attempt `attempt` closed or failed. Returns false if stale.
    pub fn closed(&mut self, attempt: u64, now: Instant) -> bool {
        if attempt != self.attempt {
            return false;
        }
        self.status = ConnectionStatus::Disconnected;
        if self.retries < self.policy.max_attempts {
            self.retries += 1;
            self.next_retry = Some(now + self.policy.delay);
        } else {
            self.next_retry = None;
        }
        true
    }

    /// Deliberate disconnect: no retry is scheduled
    pub fn stopped(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.next_retry = None;
    }

    pub fn retry_due(&self, now: Instant) -> bool {
        self.status == ConnectionStatus::Disconnected && self.next_retry.is_some_and(|t| now >= t)
    }

    /// Manual reconnect: forget spent retries
    pub fn reset_retries(&mut self) {
        self.retries = 0;
    }
}
