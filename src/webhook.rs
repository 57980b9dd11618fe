//! Todoist webhook payloads.
//!
//! Envelope:
//!
//! ```json
//! {
//!   "event_name": "item:completed",
//!   "user_id": "2671355",
//!   "event_data": { "id": "2995104339", "user_id": "2671355", ... },
//!   "initiator": { "id": "2671355", ... },
//!   "version": "9"
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Webhook payload version this service understands
pub const API_VERSION: &str = "9";

/// Header carrying base64(HMAC-SHA256(client_secret, body))
pub const SIGNATURE_HEADER: &str = "x-todoist-hmac-sha256";

/// Accept ids sent either as strings or as numbers.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn default_version() -> String {
    API_VERSION.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Initiator {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

/// Task ("item") fields read by the sync engine
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Comment ("note") fields read by the sync engine
#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(deserialize_with = "id_string")]
    pub posted_uid: String,
    #[serde(deserialize_with = "id_string")]
    pub item_id: String,
}

/// Raw webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event_name: String,
    pub event_data: serde_json::Value,
    pub initiator: Initiator,
    #[serde(default = "default_version")]
    pub version: String,
}

/// Event names handled by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteAdded,
    ItemUpdated,
    ItemCompleted,
    ItemUncompleted,
    ItemDeleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NoteAdded => "note:added",
            EventKind::ItemUpdated => "item:updated",
            EventKind::ItemCompleted => "item:completed",
            EventKind::ItemUncompleted => "item:uncompleted",
            EventKind::ItemDeleted => "item:deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "note:added" => Ok(EventKind::NoteAdded),
            "item:updated" => Ok(EventKind::ItemUpdated),
            "item:completed" => Ok(EventKind::ItemCompleted),
            "item:uncompleted" => Ok(EventKind::ItemUncompleted),
            "item:deleted" => Ok(EventKind::ItemDeleted),
            other => Err(Error::InvalidEvent(format!("unknown event_name '{other}'"))),
        }
    }
}

/// A validated event ready for dispatch
#[derive(Debug, Clone)]
pub enum InboundEvent {
    CommentAdded(Note),
    TaskUpdated(Task),
    TaskCompleted(Task),
    TaskUncompleted(Task),
    TaskDeleted(Task),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::CommentAdded(_) => EventKind::NoteAdded,
            InboundEvent::TaskUpdated(_) => EventKind::ItemUpdated,
            InboundEvent::TaskCompleted(_) => EventKind::ItemCompleted,
            InboundEvent::TaskUncompleted(_) => EventKind::ItemUncompleted,
            InboundEvent::TaskDeleted(_) => EventKind::ItemDeleted,
        }
    }

    /// Task the event is about
    pub fn task_id(&self) -> &str {
        match self {
            InboundEvent::CommentAdded(note) => &note.item_id,
            InboundEvent::TaskUpdated(task)
            | InboundEvent::TaskCompleted(task)
            | InboundEvent::TaskUncompleted(task)
            | InboundEvent::TaskDeleted(task) => &task.id,
        }
    }

    /// User owning the resource the event is about
    pub fn owner_id(&self) -> &str {
        match self {
            InboundEvent::CommentAdded(note) => &note.posted_uid,
            InboundEvent::TaskUpdated(task)
            | InboundEvent::TaskCompleted(task)
            | InboundEvent::TaskUncompleted(task)
            | InboundEvent::TaskDeleted(task) => &task.user_id,
        }
    }
}

/// Outcome of envelope validation
#[derive(Debug, Clone)]
pub enum Accepted {
    Process(InboundEvent),
    /// Well formed, but initiated by someone other than the owner
    Ignored { kind: EventKind, reason: String },
}

impl WebhookEnvelope {
    /// Parse a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|err| Error::InvalidEvent(format!("malformed payload: {err}")))
    }

    /// Check version and event name, decode the event data, and check that
    /// the initiator owns the resource.
    pub fn validate(self) -> Result<Accepted> {
        if self.version != API_VERSION {
            return Err(Error::InvalidEvent(format!(
                "expecting version = {API_VERSION}, got {}",
                self.version
            )));
        }
        let kind: EventKind = self.event_name.parse()?;
        let event = match kind {
            EventKind::NoteAdded => InboundEvent::CommentAdded(decode(self.event_data, kind)?),
            EventKind::ItemUpdated => InboundEvent::TaskUpdated(decode(self.event_data, kind)?),
            EventKind::ItemCompleted => InboundEvent::TaskCompleted(decode(self.event_data, kind)?),
            EventKind::ItemUncompleted => {
                InboundEvent::TaskUncompleted(decode(self.event_data, kind)?)
            }
            EventKind::ItemDeleted => InboundEvent::TaskDeleted(decode(self.event_data, kind)?),
        };

        if event.owner_id() != self.initiator.id {
            return Ok(Accepted::Ignored {
                kind,
                reason: format!(
                    "initiator {} is not the owner {} of task {}",
                    self.initiator.id,
                    event.owner_id(),
                    event.task_id()
                ),
            });
        }
        Ok(Accepted::Process(event))
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: serde_json::Value, kind: EventKind) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|err| Error::InvalidEvent(format!("invalid event_data for {kind}: {err}")))
}

/// Signature Todoist sends for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = new_mac(secret)?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify the `X-Todoist-Hmac-SHA256` header value for `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| Error::InvalidSignature)?;
    let mut mac = new_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::InvalidSignature)
}

fn new_mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| Error::InvalidConfig(format!("webhook secret: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_name: &str, data: serde_json::Value, initiator: &str) -> WebhookEnvelope {
        serde_json::from_value(json!({
            "event_name": event_name,
            "user_id": "2671355",
            "event_data": data,
            "initiator": { "id": initiator, "email": "alice@example.com" },
            "version": "9",
        }))
        .unwrap()
    }

    fn task_data() -> serde_json::Value {
        json!({
            "id": "2995104339",
            "user_id": "2671355",
            "content": "Buy Milk",
            "description": "",
            "checked": false,
            "is_deleted": false,
            "project_id": "2203306141"
        })
    }

    #[test]
    fn parses_event_names() {
        assert_eq!("note:added".parse::<EventKind>().unwrap(), EventKind::NoteAdded);
        assert_eq!("item:deleted".parse::<EventKind>().unwrap(), EventKind::ItemDeleted);
        assert!(matches!(
            "project:added".parse::<EventKind>(),
            Err(Error::InvalidEvent(_))
        ));
    }

    #[test]
    fn accepts_owner_events() {
        let accepted = envelope("item:completed", task_data(), "2671355")
            .validate()
            .unwrap();
        match accepted {
            Accepted::Process(InboundEvent::TaskCompleted(task)) => {
                assert_eq!(task.id, "2995104339");
                assert_eq!(task.content, "Buy Milk");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ignores_foreign_initiator() {
        let accepted = envelope("item:completed", task_data(), "999").validate().unwrap();
        assert!(matches!(
            accepted,
            Accepted::Ignored {
                kind: EventKind::ItemCompleted,
                ..
            }
        ));
    }

    #[test]
    fn decodes_notes_with_numeric_ids() {
        let data = json!({
            "id": 123,
            "content": "existio: +walk",
            "posted_uid": 2671355,
            "item_id": "2995104339",
            "item": task_data()
        });
        match envelope("note:added", data, "2671355").validate().unwrap() {
            Accepted::Process(event) => {
                assert_eq!(event.kind(), EventKind::NoteAdded);
                assert_eq!(event.task_id(), "2995104339");
                assert_eq!(event.owner_id(), "2671355");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_version_and_bad_data() {
        let mut env = envelope("item:completed", task_data(), "2671355");
        env.version = "8".to_string();
        assert!(matches!(env.validate(), Err(Error::InvalidEvent(_))));

        let env = envelope("item:completed", json!({ "content": "x" }), "2671355");
        assert!(matches!(env.validate(), Err(Error::InvalidEvent(_))));

        assert!(matches!(
            WebhookEnvelope::parse(b"{not json"),
            Err(Error::InvalidEvent(_))
        ));
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"event_name":"item:completed"}"#;
        let signature = sign("secret", body).unwrap();
        assert!(verify_signature("secret", body, &signature).is_ok());
        assert!(matches!(
            verify_signature("other", body, &signature),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("secret", body, "not base64!"),
            Err(Error::InvalidSignature)
        ));
    }
}
