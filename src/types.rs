use std::fmt;

use serde::{Deserialize, Serialize};

/// Shared secret used to sign and verify webhook requests.
///
/// It is an opaque byte string. The `Debug` output is redacted so the
/// secret cannot end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct BotSecret(Vec<u8>);

impl BotSecret {
    /// Minimum length Nextcloud recommends for bot secrets.
    pub const RECOMMENDED_MIN_LEN: usize = 40;

    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the secret is shorter than the recommended minimum.
    pub fn is_weak(&self) -> bool {
        self.0.len() < Self::RECOMMENDED_MIN_LEN
    }
}

impl fmt::Debug for BotSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BotSecret(<{} bytes redacted>)", self.0.len())
    }
}

/// A Nextcloud Talk bot event, in its Activity Streams shape.
///
/// Field order is fixed by this definition, which keeps the serialized
/// bytes stable for signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalkEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub actor: Actor,
    pub object: MessageObject,
    pub target: Target,
}

/// Who triggered the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub display_name: String,
}

/// The chat message the event is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub content: String,
    pub media_type: String,
}

/// The conversation (room) the message was posted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
}

impl TalkEvent {
    /// Room token used by the built-in test message.
    pub const TEST_ROOM_TOKEN: &'static str = "testtoken123";

    /// The fixed chat message sent by the probe client.
    pub fn test_message() -> Self {
        Self {
            kind: "Create".to_string(),
            actor: Actor {
                kind: "users".to_string(),
                id: "testuser1".to_string(),
                display_name: "Test User 1".to_string(),
            },
            object: MessageObject {
                kind: "comment".to_string(),
                id: "1".to_string(),
                name: "Test User 1".to_string(),
                content: "Hello Bot! What can you do?".to_string(),
                media_type: "text/markdown".to_string(),
            },
            target: Target {
                kind: "room".to_string(),
                id: Self::TEST_ROOM_TOKEN.to_string(),
                name: "Test Room".to_string(),
            },
        }
    }

    /// Compact JSON bytes; these are the exact bytes that get signed.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Envelope returned by the echo server after a successful verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub status: u16,
    pub text: String,
    pub received_payload: serde_json::Value,
}

impl EchoResponse {
    pub fn ok(received_payload: serde_json::Value) -> Self {
        Self {
            status: 200,
            text: "OK".to_string(),
            received_payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let value = serde_json::to_value(TalkEvent::test_message()).unwrap();
        assert_eq!(value["type"], "Create");
        assert_eq!(value["actor"]["displayName"], "Test User 1");
        assert_eq!(value["object"]["mediaType"], "text/markdown");
        assert_eq!(value["target"]["id"], TalkEvent::TEST_ROOM_TOKEN);
    }

    #[test]
    fn test_body_is_compact_and_ordered() {
        let body = String::from_utf8(TalkEvent::test_message().to_body().unwrap()).unwrap();
        assert!(body.starts_with(r#"{"type":"Create","actor":{"type":"users""#));
        assert!(!body.contains('\n'));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = BotSecret::new("super-secret-value");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("18 bytes"));
    }

    #[test]
    fn test_weak_secret() {
        assert!(BotSecret::new("short").is_weak());
        assert!(!BotSecret::new("x".repeat(40)).is_weak());
    }

    #[test]
    fn test_echo_envelope() {
        let echo = EchoResponse::ok(serde_json::json!({"a": 1}));
        let value = serde_json::to_value(echo).unwrap();
        assert_eq!(value["status"], 200);
        assert_eq!(value["text"], "OK");
        assert_eq!(value["received_payload"]["a"], 1);
    }
}
