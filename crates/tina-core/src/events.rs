use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::{Binary, Long, Nullable};

/// Events emitted by the protocol client for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StoreEvent {
    #[serde(rename = "messaging-history.set")]
    HistorySet(HistorySet),

    #[serde(rename = "chats.upsert")]
    ChatsUpsert(Vec<ChatData>),
    #[serde(rename = "chats.update")]
    ChatsUpdate(Vec<ChatData>),
    #[serde(rename = "chats.delete")]
    ChatsDelete(Vec<String>),

    #[serde(rename = "contacts.upsert")]
    ContactsUpsert(Vec<ContactData>),
    #[serde(rename = "contacts.update")]
    ContactsUpdate(Vec<ContactData>),

    #[serde(rename = "groups.upsert")]
    GroupsUpsert(Vec<GroupMetadataData>),
    #[serde(rename = "groups.update")]
    GroupsUpdate(Vec<GroupMetadataData>),
    #[serde(rename = "group-participants.update")]
    GroupParticipantsUpdate(ParticipantsUpdate),

    #[serde(rename = "blocklist.set")]
    BlocklistSet(BlocklistSet),
    #[serde(rename = "blocklist.update")]
    BlocklistUpdate(BlocklistUpdate),
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::HistorySet(_) => EventKind::HistorySet,
            StoreEvent::ChatsUpsert(_) => EventKind::ChatsUpsert,
            StoreEvent::ChatsUpdate(_) => EventKind::ChatsUpdate,
            StoreEvent::ChatsDelete(_) => EventKind::ChatsDelete,
            StoreEvent::ContactsUpsert(_) => EventKind::ContactsUpsert,
            StoreEvent::ContactsUpdate(_) => EventKind::ContactsUpdate,
            StoreEvent::GroupsUpsert(_) => EventKind::GroupsUpsert,
            StoreEvent::GroupsUpdate(_) => EventKind::GroupsUpdate,
            StoreEvent::GroupParticipantsUpdate(_) => EventKind::GroupParticipantsUpdate,
            StoreEvent::BlocklistSet(_) => EventKind::BlocklistSet,
            StoreEvent::BlocklistUpdate(_) => EventKind::BlocklistUpdate,
        }
    }
}

/// Event names, as the protocol client spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    HistorySet,
    ChatsUpsert,
    ChatsUpdate,
    ChatsDelete,
    ContactsUpsert,
    ContactsUpdate,
    GroupsUpsert,
    GroupsUpdate,
    GroupParticipantsUpdate,
    BlocklistSet,
    BlocklistUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::HistorySet,
        EventKind::ChatsUpsert,
        EventKind::ChatsUpdate,
        EventKind::ChatsDelete,
        EventKind::ContactsUpsert,
        EventKind::ContactsUpdate,
        EventKind::GroupsUpsert,
        EventKind::GroupsUpdate,
        EventKind::GroupParticipantsUpdate,
        EventKind::BlocklistSet,
        EventKind::BlocklistUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::HistorySet => "messaging-history.set",
            EventKind::ChatsUpsert => "chats.upsert",
            EventKind::ChatsUpdate => "chats.update",
            EventKind::ChatsDelete => "chats.delete",
            EventKind::ContactsUpsert => "contacts.upsert",
            EventKind::ContactsUpdate => "contacts.update",
            EventKind::GroupsUpsert => "groups.upsert",
            EventKind::GroupsUpdate => "groups.update",
            EventKind::GroupParticipantsUpdate => "group-participants.update",
            EventKind::BlocklistSet => "blocklist.set",
            EventKind::BlocklistUpdate => "blocklist.update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bulk history sync. `is_latest` marks the snapshot as authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySet {
    #[serde(default)]
    pub chats: Vec<ChatData>,
    #[serde(default)]
    pub contacts: Vec<ContactData>,
    #[serde(default)]
    pub is_latest: bool,
}

/// A chat record. Full on upsert/set, partial on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    pub id: String,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub display_name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub unread_count: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub unread_mention_count: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub conversation_timestamp: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub last_message_recv_timestamp: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub archived: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub pinned: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub mute_end_time: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub read_only: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub marked_as_unread: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub ephemeral_expiration: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub tc_token: Nullable<Binary>,
    /// Opaque to the store, persisted as JSON.
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub disappearing_mode: Nullable<serde_json::Value>,
}

impl ChatData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactData {
    pub id: String,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub lid: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub notify: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub verified_name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub img_url: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub status: Nullable<String>,
}

impl ContactData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadataData {
    pub id: String,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub owner: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub subject: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub subject_owner: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub subject_time: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub creation: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub desc: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub desc_owner: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub desc_id: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub restrict: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub announce: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub size: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub ephemeral_duration: Nullable<Long>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub participants: Nullable<Vec<Participant>>,
}

impl GroupMetadataData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
}

impl Participant {
    pub fn member(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
            is_super_admin: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsUpdate {
    pub id: String,
    pub action: ParticipantAction,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocklistSet {
    pub blocklist: Vec<String>,
}

/// `"add"` blocks; every other value unblocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlocklistAction {
    Add,
    Remove,
}

impl From<String> for BlocklistAction {
    fn from(value: String) -> Self {
        if value == "add" {
            BlocklistAction::Add
        } else {
            BlocklistAction::Remove
        }
    }
}

impl From<BlocklistAction> for String {
    fn from(value: BlocklistAction) -> Self {
        match value {
            BlocklistAction::Add => "add".to_string(),
            BlocklistAction::Remove => "remove".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistUpdate {
    pub blocklist: Vec<String>,
    #[serde(rename = "type")]
    pub action: BlocklistAction,
}
