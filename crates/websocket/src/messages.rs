use serde::{Deserialize, Serialize};
use uuid::Uuid;

use events::EventEnvelope;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { filter: Option<SubscriptionFilter> },
    Unsubscribe,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event { envelope: EventEnvelope },
    Subscribed { filter: Option<SubscriptionFilter> },
    Unsubscribed,
    Pong,
    /// Events were dropped because this connection fell behind.
    Lagged { missed: u64 },
    Error { message: String },
}

/// Rooms a connection listens to. `None` means every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SubscriptionFilter {
    pub session_ids: Option<Vec<Uuid>>,
}

impl SubscriptionFilter {
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        match &self.session_ids {
            Some(ids) => ids.contains(&envelope.event.session_id()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::Event;
    use tempo_core::SessionStatus;

    fn started(session_id: Uuid) -> EventEnvelope {
        EventEnvelope::new(Event::SessionStarted {
            session_id,
            status: SessionStatus::Active,
        })
    }

    #[test]
    fn test_client_message_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));

        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"subscribe","filter":{{"session_ids":["{}"]}}}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::Subscribe { filter: Some(filter) } => {
                assert_eq!(filter.session_ids, Some(vec![id]));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_server_message_serialize() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let json = serde_json::to_string(&ServerMessage::Lagged { missed: 3 }).unwrap();
        assert!(json.contains(r#""missed":3"#));
    }

    #[test]
    fn test_event_message_carries_kind() {
        let session_id = Uuid::new_v4();
        let msg = ServerMessage::Event {
            envelope: started(session_id),
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["envelope"]["event"]["type"], "session.started");
        assert_eq!(value["envelope"]["event"]["session_id"], session_id.to_string());
    }

    #[test]
    fn test_filter_without_ids_matches_all() {
        let filter = SubscriptionFilter::default();
        assert!(filter.matches(&started(Uuid::new_v4())));
    }

    #[test]
    fn test_filter_matches_only_its_rooms() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let filter = SubscriptionFilter {
            session_ids: Some(vec![a, b]),
        };

        assert!(filter.matches(&started(a)));
        assert!(filter.matches(&started(b)));
        assert!(!filter.matches(&started(Uuid::new_v4())));
    }
}
