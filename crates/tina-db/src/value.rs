use sqlx::{QueryBuilder, Sqlite};

/// Mirrored entity tables. Every one is keyed by `(session_id, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Chats,
    Contacts,
    GroupMetadata,
    Blocklist,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Chats => "chats",
            Table::Contacts => "contacts",
            Table::GroupMetadata => "group_metadata",
            Table::Blocklist => "blocklist",
        }
    }

    /// Writable columns besides the key.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Chats => &[
                "name",
                "display_name",
                "unread_count",
                "unread_mention_count",
                "conversation_timestamp",
                "last_message_recv_timestamp",
                "archived",
                "pinned",
                "mute_end_time",
                "read_only",
                "marked_as_unread",
                "ephemeral_expiration",
                "tc_token",
                "disappearing_mode",
            ],
            Table::Contacts => &[
                "lid",
                "name",
                "notify",
                "verified_name",
                "img_url",
                "status",
            ],
            Table::GroupMetadata => &[
                "owner",
                "subject",
                "subject_owner",
                "subject_time",
                "creation",
                "description",
                "desc_owner",
                "desc_id",
                "is_restricted",
                "is_announce",
                "size",
                "ephemeral_duration",
                "participants",
            ],
            Table::Blocklist => &[],
        }
    }

    pub(crate) fn has_updated_at(self) -> bool {
        !matches!(self, Table::Blocklist)
    }
}

/// A value in one of the types sqlite stores natively.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

impl DbValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DbValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn push_to(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            DbValue::Null => {
                qb.push("NULL");
            }
            DbValue::Integer(v) => {
                qb.push_bind(*v);
            }
            DbValue::Bool(v) => {
                qb.push_bind(*v);
            }
            DbValue::Text(v) => {
                qb.push_bind(v.clone());
            }
            DbValue::Blob(v) => {
                qb.push_bind(v.clone());
            }
        }
    }
}

/// Column values for one row, keyed by entity id.
///
/// Columns that are not present are left untouched by updates and upserts.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    fields: Vec<(&'static str, DbValue)>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Set a column, replacing an earlier value for it.
    pub fn set(&mut self, column: &'static str, value: DbValue) {
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: &'static str, value: DbValue) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&DbValue> {
        self.fields.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(&'static str, DbValue)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_set_replaces_existing_column() {
        let mut record = Record::new("1@s.whatsapp.net").with("name", DbValue::Text("a".into()));
        record.set("name", DbValue::Text("b".into()));

        assert_eq!(record.fields().len(), 1);
        assert_eq!(record.get("name"), Some(&DbValue::Text("b".into())));
    }
}
