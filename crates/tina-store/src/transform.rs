//! Conversion of event payloads into store-native records.
//!
//! 64-bit wire integers become `Integer`, binary buffers become `Blob`, opaque
//! JSON is kept verbatim as text. Fields that were not mentioned never reach
//! the record, so partial updates leave the stored columns alone. Explicit
//! nulls are dropped as well unless `remove_nullable` is off, in which case
//! they clear the column.

use tina_core::{Binary, ChatData, ContactData, GroupMetadataData, Long, Nullable, Participant};
use tina_db::{DbValue, Record};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    remove_nullable: bool,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl Transformer {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            remove_nullable: config.remove_nullable,
        }
    }

    pub fn chat(&self, data: &ChatData) -> Record {
        let mut r = self.fields(&data.id);
        r.put("name", &data.name, text);
        r.put("display_name", &data.display_name, text);
        r.put("unread_count", &data.unread_count, long);
        r.put("unread_mention_count", &data.unread_mention_count, long);
        r.put("conversation_timestamp", &data.conversation_timestamp, long);
        r.put("last_message_recv_timestamp", &data.last_message_recv_timestamp, long);
        r.put("archived", &data.archived, boolean);
        r.put("pinned", &data.pinned, long);
        r.put("mute_end_time", &data.mute_end_time, long);
        r.put("read_only", &data.read_only, boolean);
        r.put("marked_as_unread", &data.marked_as_unread, boolean);
        r.put("ephemeral_expiration", &data.ephemeral_expiration, long);
        r.put("tc_token", &data.tc_token, blob);
        r.put("disappearing_mode", &data.disappearing_mode, |v| {
            DbValue::Text(v.to_string())
        });
        r.record
    }

    pub fn contact(&self, data: &ContactData) -> Record {
        let mut r = self.fields(&data.id);
        r.put("lid", &data.lid, text);
        r.put("name", &data.name, text);
        r.put("notify", &data.notify, text);
        r.put("verified_name", &data.verified_name, text);
        r.put("img_url", &data.img_url, text);
        r.put("status", &data.status, text);
        r.record
    }

    pub fn group(&self, data: &GroupMetadataData) -> Result<Record> {
        let mut r = self.fields(&data.id);
        r.put("owner", &data.owner, text);
        r.put("subject", &data.subject, text);
        r.put("subject_owner", &data.subject_owner, text);
        r.put("subject_time", &data.subject_time, long);
        r.put("creation", &data.creation, long);
        r.put("description", &data.desc, text);
        r.put("desc_owner", &data.desc_owner, text);
        r.put("desc_id", &data.desc_id, text);
        r.put("is_restricted", &data.restrict, boolean);
        r.put("is_announce", &data.announce, boolean);
        r.put("size", &data.size, long);
        r.put("ephemeral_duration", &data.ephemeral_duration, long);

        match &data.participants {
            Nullable::Absent => {}
            Nullable::Null => r.null("participants"),
            Nullable::Value(list) => r.record.set("participants", participants(list)?),
        }
        Ok(r.record)
    }

    fn fields(&self, id: &str) -> Fields {
        Fields {
            record: Record::new(id),
            remove_nullable: self.remove_nullable,
        }
    }
}

/// Encode a participant list for the embedded JSON column.
pub fn participants(list: &[Participant]) -> Result<DbValue> {
    serde_json::to_string(list)
        .map(DbValue::Text)
        .map_err(|source| StoreError::Encode {
            field: "participants",
            source,
        })
}

struct Fields {
    record: Record,
    remove_nullable: bool,
}

impl Fields {
    fn put<T>(&mut self, column: &'static str, value: &Nullable<T>, convert: impl FnOnce(&T) -> DbValue) {
        match value {
            Nullable::Absent => {}
            Nullable::Null => self.null(column),
            Nullable::Value(v) => self.record.set(column, convert(v)),
        }
    }

    fn null(&mut self, column: &'static str) {
        if !self.remove_nullable {
            self.record.set(column, DbValue::Null);
        }
    }
}

fn text(v: &String) -> DbValue {
    DbValue::Text(v.clone())
}

fn long(v: &Long) -> DbValue {
    DbValue::Integer(v.value())
}

fn boolean(v: &bool) -> DbValue {
    DbValue::Bool(*v)
}

fn blob(v: &Binary) -> DbValue {
    DbValue::Blob(v.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep_nulls() -> Transformer {
        Transformer::new(&StoreConfig {
            remove_nullable: false,
        })
    }

    #[test]
    fn test_absent_fields_are_not_in_record() {
        let record = Transformer::default().chat(&ChatData::new("1@s.whatsapp.net"));
        assert_eq!(record.id, "1@s.whatsapp.net");
        assert!(record.is_empty());
    }

    #[test]
    fn test_special_types_are_converted() {
        let chat: ChatData = serde_json::from_str(
            r#"{
                "id": "1@s.whatsapp.net",
                "conversationTimestamp": {"low": 10, "high": 0, "unsigned": true},
                "tcToken": "AQID",
                "archived": true,
                "disappearingMode": {"initiator": 0}
            }"#,
        )
        .unwrap();

        let record = Transformer::default().chat(&chat);
        assert_eq!(record.get("conversation_timestamp"), Some(&DbValue::Integer(10)));
        assert_eq!(record.get("tc_token"), Some(&DbValue::Blob(vec![1, 2, 3])));
        assert_eq!(record.get("archived"), Some(&DbValue::Bool(true)));
        assert_eq!(
            record.get("disappearing_mode"),
            Some(&DbValue::Text(r#"{"initiator":0}"#.to_string()))
        );
    }

    #[test]
    fn test_nulls_dropped_by_default() {
        let contact: ContactData =
            serde_json::from_str(r#"{"id": "c", "name": null, "notify": "Ana"}"#).unwrap();

        let record = Transformer::default().contact(&contact);
        assert_eq!(record.get("name"), None);
        assert_eq!(record.get("notify"), Some(&DbValue::Text("Ana".into())));
    }

    #[test]
    fn test_nulls_clear_when_configured() {
        let contact: ContactData =
            serde_json::from_str(r#"{"id": "c", "name": null}"#).unwrap();

        let record = keep_nulls().contact(&contact);
        assert_eq!(record.get("name"), Some(&DbValue::Null));
        assert_eq!(record.get("status"), None);
    }

    #[test]
    fn test_group_participants_untouched_unless_present() {
        let transformer = Transformer::default();

        let mut group = GroupMetadataData::new("g@g.us");
        group.subject = Nullable::Value("Friends".into());
        let record = transformer.group(&group).unwrap();
        assert_eq!(record.get("participants"), None);
        assert_eq!(record.get("subject"), Some(&DbValue::Text("Friends".into())));

        group.participants = Nullable::Value(vec![Participant::member("p1")]);
        let record = transformer.group(&group).unwrap();
        let Some(DbValue::Text(json)) = record.get("participants") else {
            panic!("participants not encoded");
        };
        let decoded: Vec<Participant> = serde_json::from_str(json).unwrap();
        assert_eq!(decoded, vec![Participant::member("p1")]);
    }
}
