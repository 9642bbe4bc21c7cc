use serde::{Deserialize, Serialize};

use crate::events::StoreEvent;

/// One line of an event log: an id plus the tagged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    #[serde(flatten)]
    pub event: StoreEvent,
}

impl EventMessage {
    pub fn new(event: StoreEvent) -> Self {
        Self {
            id: generate_id(),
            event,
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default() + "\n"
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

fn generate_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:x}", nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BlocklistSet, EventKind};

    #[test]
    fn test_line_is_newline_terminated_and_decodes() {
        let msg = EventMessage::new(StoreEvent::BlocklistSet(BlocklistSet {
            blocklist: vec!["x@s.whatsapp.net".into()],
        }));
        let line = msg.to_line();
        assert!(line.ends_with('\n'));

        let decoded = EventMessage::from_line(&line).unwrap();
        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.event.kind(), EventKind::BlocklistSet);
    }

    #[test]
    fn test_from_line_rejects_unknown_event() {
        assert!(EventMessage::from_line(r#"{"id": "1", "type": "presence.update", "payload": {}}"#).is_err());
    }
}
