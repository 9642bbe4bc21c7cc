use serde::{Deserialize, Serialize};
use tina_core::Participant;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub pk_id: i64,
    pub session_id: String,
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub unread_count: Option<i64>,
    pub unread_mention_count: Option<i64>,
    pub conversation_timestamp: Option<i64>,
    pub last_message_recv_timestamp: Option<i64>,
    pub archived: Option<bool>,
    pub pinned: Option<i64>,
    pub mute_end_time: Option<i64>,
    pub read_only: Option<bool>,
    pub marked_as_unread: Option<bool>,
    pub ephemeral_expiration: Option<i64>,
    pub tc_token: Option<Vec<u8>>,
    pub disappearing_mode: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub pk_id: i64,
    pub session_id: String,
    pub id: String,
    pub lid: Option<String>,
    pub name: Option<String>,
    pub notify: Option<String>,
    pub verified_name: Option<String>,
    pub img_url: Option<String>,
    pub status: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupMetadata {
    pub pk_id: i64,
    pub session_id: String,
    pub id: String,
    pub owner: Option<String>,
    pub subject: Option<String>,
    pub subject_owner: Option<String>,
    pub subject_time: Option<i64>,
    pub creation: Option<i64>,
    pub description: Option<String>,
    pub desc_owner: Option<String>,
    pub desc_id: Option<String>,
    pub is_restricted: Option<bool>,
    pub is_announce: Option<bool>,
    pub size: Option<i64>,
    pub ephemeral_duration: Option<i64>,
    pub participants: Option<String>,
    pub updated_at: i64,
}

impl GroupMetadata {
    /// Decode the embedded participant list. A missing list is empty.
    pub fn participant_list(&self) -> serde_json::Result<Vec<Participant>> {
        match self.participants.as_deref() {
            Some(json) => serde_json::from_str(json),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlocklistEntry {
    pub pk_id: i64,
    pub session_id: String,
    pub id: String,
}
