//! Wire protocol message types
//!
//! Every frame is a JSON object:
//!
//! ```json
//! {"type": "question_created", "payload": {"id": 5, "text": "Q?"}, "timestamp": "2024-05-01T10:00:00Z"}
//! {"type": "question_deleted", "payload": {"id": 5}, "seq": 42}
//! {"type": "user_activity", "payload": {"id": "a1", "actorId": 3, "action": "edit", ...}}
//! ```
//!
//! `seq` is optional. When the broadcaster attaches it, it is a monotonic
//! per-connection counter used to drop replays exactly.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};
use crate::reconcile::Entity;

/// Frame types this client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    QuestionCreated,
    QuestionUpdated,
    QuestionDeleted,
    UserActivity,
    /// Legacy alias of `user_activity`
    Activity,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::QuestionCreated,
        MessageKind::QuestionUpdated,
        MessageKind::QuestionDeleted,
        MessageKind::UserActivity,
        MessageKind::Activity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuestionCreated => "question_created",
            Self::QuestionUpdated => "question_updated",
            Self::QuestionDeleted => "question_deleted",
            Self::UserActivity => "user_activity",
            Self::Activity => "activity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

impl Frame {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: None,
            seq: None,
        }
    }

    /// Frame stamped with an ISO-8601 send time
    pub fn stamped(kind: impl Into<String>, payload: Value, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(at.to_rfc3339()),
            ..Self::new(kind, payload)
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Parse and validate a raw text frame.
    ///
    /// The frame must be a JSON object with a non-empty string `type`. A
    /// `payload`, when present and not null, must be an object.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| SyncError::MalformedFrame {
            message: format!("invalid JSON: {}", e),
        })?;

        let Value::Object(mut fields) = value else {
            return Err(SyncError::MalformedFrame {
                message: "frame is not a JSON object".to_string(),
            });
        };

        match fields.get("type") {
            Some(Value::String(kind)) if !kind.is_empty() => {}
            Some(_) => {
                return Err(SyncError::MalformedFrame {
                    message: "'type' must be a non-empty string".to_string(),
                })
            }
            None => {
                return Err(SyncError::MalformedFrame {
                    message: "missing 'type'".to_string(),
                })
            }
        }

        match fields.get("payload") {
            None | Some(Value::Object(_)) => {}
            Some(Value::Null) => {
                fields.remove("payload");
            }
            Some(_) => {
                return Err(SyncError::MalformedFrame {
                    message: "'payload' must be an object".to_string(),
                })
            }
        }

        serde_json::from_value(Value::Object(fields)).map_err(|e| SyncError::MalformedFrame {
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SyncError::MalformedFrame {
            message: format!("serialization failed: {}", e),
        })
    }

    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.kind)
    }

    /// Send time, if the frame carries a parseable timestamp
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(|e| SyncError::payload(&self.kind, e))
    }
}

/// Stable identifier of an entity (numeric or string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Str(id)
    }
}

/// A trivia question as broadcast by the server.
///
/// Only the fields the client looks at are typed; everything else the
/// server sends is kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: EntityId,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<EntityId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    pub fn new(id: impl Into<EntityId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category_id: None,
            level_id: None,
            extra: Map::new(),
        }
    }
}

impl Entity for Question {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Payload of `question_deleted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedPayload {
    pub id: EntityId,
}

/// What an admin did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Edit,
    Delete,
    View,
    Export,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::View => "view",
            Self::Export => "export",
        }
    }
}

/// What the action was performed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEntityType {
    Question,
    Category,
    Setting,
}

impl ActivityEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Category => "category",
            Self::Setting => "setting",
        }
    }
}

/// One line of the activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: EntityId,
    pub actor_id: EntityId,
    #[serde(default)]
    pub actor_name: String,
    #[serde(default)]
    pub actor_role: String,
    pub action: ActivityAction,
    pub entity_type: ActivityEntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub details: String,
    /// `None` when the timestamp was missing or could not be parsed
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 as well as offset-less `YYYY-MM-DD[T ]HH:MM:SS[.fff]`,
/// which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::String(raw) => parse_timestamp(raw),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    if parsed.is_none() && !value.is_null() {
        tracing::debug!("Unparseable activity timestamp: {}", value);
    }
    Ok(parsed)
}
