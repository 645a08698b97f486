use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::node::{Node, NodeId};

/// Message type tags carried in the `type` field of an event envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    ScheduleCleared,
    MonthlyTaskCreated,
    DailyWorkCreated,
    Connection,
    Subscription,
    Pong,
}

impl EventKind {
    /// Tags that mutate the node list
    pub const MUTATIONS: [EventKind; 4] = [
        EventKind::TaskCreated,
        EventKind::TaskUpdated,
        EventKind::TaskDeleted,
        EventKind::ScheduleCleared,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task_created",
            EventKind::TaskUpdated => "task_updated",
            EventKind::TaskDeleted => "task_deleted",
            EventKind::ScheduleCleared => "schedule_cleared",
            EventKind::MonthlyTaskCreated => "monthly_task_created",
            EventKind::DailyWorkCreated => "daily_work_created",
            EventKind::Connection => "connection",
            EventKind::Subscription => "subscription",
            EventKind::Pong => "pong",
        }
    }

    pub fn parse(s: &str) -> Option<EventKind> {
        serde_json::from_value(Value::String(s.to_string())).ok()
    }
}

/// Broadcast envelope as written to the event journal:
/// `{"type": "task_updated", "event": "tasks", "data": {...}, "timestamp": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// Subscription channel (`tasks`, `daily_works`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Envelope {
            kind: kind.as_str().to_string(),
            event: Some("tasks".to_string()),
            data,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.kind)
    }
}

/// A decoded mutation ready for the reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Created(Node),
    /// Partial field set; must contain `id`
    Updated {
        id: NodeId,
        fields: Map<String, Value>,
    },
    Deleted(NodeId),
    ClearAll,
    /// Recognized but irrelevant to the node list
    Ignored(EventKind),
}

/// Why an envelope could not be turned into a `SyncEvent`
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown event type \"{0}\"")]
    UnknownKind(String),
    #[error("{kind} payload has no integer \"id\"")]
    MissingId { kind: &'static str },
    #[error("{kind} payload is not an object")]
    NotAnObject { kind: &'static str },
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncEvent {
    /// Decode one journal line
    pub fn from_json_line(line: &str) -> Result<SyncEvent, DecodeError> {
        let envelope: Envelope = serde_json::from_str(line)?;
        SyncEvent::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<SyncEvent, DecodeError> {
        let kind = envelope
            .event_kind()
            .ok_or_else(|| DecodeError::UnknownKind(envelope.kind.clone()))?;
        let name = kind.as_str();
        match kind {
            EventKind::TaskCreated => serde_json::from_value(envelope.data)
                .map(SyncEvent::Created)
                .map_err(|source| DecodeError::InvalidPayload { kind: name, source }),
            EventKind::TaskUpdated => {
                let Value::Object(fields) = envelope.data else {
                    return Err(DecodeError::NotAnObject { kind: name });
                };
                let id = payload_id(&fields).ok_or(DecodeError::MissingId { kind: name })?;
                Ok(SyncEvent::Updated { id, fields })
            }
            EventKind::TaskDeleted => {
                let Value::Object(fields) = envelope.data else {
                    return Err(DecodeError::NotAnObject { kind: name });
                };
                payload_id(&fields)
                    .map(SyncEvent::Deleted)
                    .ok_or(DecodeError::MissingId { kind: name })
            }
            EventKind::ScheduleCleared => Ok(SyncEvent::ClearAll),
            other => Ok(SyncEvent::Ignored(other)),
        }
    }

    /// Encode back into a journal envelope
    pub fn to_envelope(&self) -> Envelope {
        match self {
            SyncEvent::Created(node) => Envelope::new(
                EventKind::TaskCreated,
                serde_json::to_value(node).unwrap_or(Value::Null),
            ),
            SyncEvent::Updated { id, fields } => {
                let mut data = fields.clone();
                data.insert("id".to_string(), Value::from(*id));
                Envelope::new(EventKind::TaskUpdated, Value::Object(data))
            }
            SyncEvent::Deleted(id) => {
                Envelope::new(EventKind::TaskDeleted, serde_json::json!({ "id": id }))
            }
            SyncEvent::ClearAll => Envelope::new(
                EventKind::ScheduleCleared,
                serde_json::json!({ "message": "schedule cleared" }),
            ),
            SyncEvent::Ignored(kind) => Envelope::new(*kind, Value::Null),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::Created(_) => EventKind::TaskCreated,
            SyncEvent::Updated { .. } => EventKind::TaskUpdated,
            SyncEvent::Deleted(_) => EventKind::TaskDeleted,
            SyncEvent::ClearAll => EventKind::ScheduleCleared,
            SyncEvent::Ignored(kind) => *kind,
        }
    }
}

fn payload_id(fields: &Map<String, Value>) -> Option<NodeId> {
    fields.get("id").and_then(Value::as_i64)
}
