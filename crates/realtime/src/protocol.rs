//! Wire protocol for the realtime channel.
//!
//! Frames are JSON text messages tagged by an `event` field. The client
//! sends `subscribe`/`unsubscribe`/`heartbeat`; the server sends
//! `subscribed` acks and `insert` events carrying the new row.

use serde::{Deserialize, Serialize};

/// A subscription topic: a table plus an optional equality filter.
///
/// Rendered as `table` or `table:column=eq.value`, which is also the
/// routing key used on both sides of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    table: String,
    filter: Option<(String, String)>,
}

impl Topic {
    /// Subscribe to every insert on a table.
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Subscribe to inserts where `column` equals `value`.
    #[must_use]
    pub fn filtered(
        table: impl Into<String>,
        column: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            table: table.into(),
            filter: Some((column.into(), value.to_string())),
        }
    }

    /// The table this topic watches.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Render the routing key.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.filter {
            Some((column, value)) => format!("{}:{column}=eq.{value}", self.table),
            None => self.table.clone(),
        }
    }
}

/// A row-insert event delivered over the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertEvent {
    /// Table the row was inserted into.
    pub table: String,
    /// The inserted row as JSON.
    pub record: serde_json::Value,
}

/// All frames exchanged over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireMessage {
    /// Client asks to join a topic.
    Subscribe {
        /// Topic routing key.
        topic: String,
    },
    /// Client leaves a topic.
    Unsubscribe {
        /// Topic routing key.
        topic: String,
    },
    /// Keepalive; the server echoes it back.
    Heartbeat,
    /// Server acknowledges a join.
    Subscribed {
        /// Topic routing key.
        topic: String,
    },
    /// Server delivers an inserted row.
    Insert {
        /// Topic routing key the row matched.
        topic: String,
        /// Table the row was inserted into.
        table: String,
        /// The inserted row as JSON.
        record: serde_json::Value,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_key_unfiltered() {
        assert_eq!(Topic::table("chat_rooms").key(), "chat_rooms");
    }

    #[test]
    fn test_topic_key_filtered() {
        let topic = Topic::filtered("chat_messages", "room_id", "42");
        assert_eq!(topic.key(), "chat_messages:room_id=eq.42");
    }

    #[test]
    fn test_wire_message_roundtrip() {
        let msg = WireMessage::Subscribe {
            topic: "orders".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"event\":\"subscribe\""));
        let back: WireMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, WireMessage::Subscribe { topic } if topic == "orders"));
    }

    #[test]
    fn test_insert_frame_parses() {
        let json = r#"{"event":"insert","topic":"chat_messages:room_id=eq.1","table":"chat_messages","record":{"content":"hi"}}"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();
        match msg {
            WireMessage::Insert { table, record, .. } => {
                assert_eq!(table, "chat_messages");
                assert_eq!(record["content"], "hi");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
