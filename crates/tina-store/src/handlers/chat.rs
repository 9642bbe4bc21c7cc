use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tina_core::{ChatData, EventKind, StoreEvent};
use tina_db::{DbError, DbValue, Record, Table, TinaDb, query};

use crate::context::StoreContext;
use crate::error::Result;
use crate::outcome::{BatchReport, ChatSetReport, ItemOutcome};
use crate::sequencer::KeySequencer;
use crate::subscription::Reconciler;
use crate::transform::Transformer;

use super::log_report;

const EVENTS: &[EventKind] = &[
    EventKind::HistorySet,
    EventKind::ChatsUpsert,
    EventKind::ChatsUpdate,
    EventKind::ChatsDelete,
];

pub struct ChatHandler {
    session_id: String,
    db: Arc<TinaDb>,
    transformer: Transformer,
    sequencer: KeySequencer,
}

impl ChatHandler {
    pub fn new(context: &StoreContext, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            db: context.db.clone(),
            transformer: context.transformer(),
            sequencer: context.sequencer.clone(),
        }
    }

    /// History sync. With `is_latest` every stored chat of the session is
    /// replaced; otherwise only chats not stored yet are inserted. Runs in one
    /// transaction.
    pub async fn set(&self, chats: &[ChatData], is_latest: bool) -> Result<ChatSetReport> {
        let mut seen = HashSet::new();
        let records: Vec<Record> = chats
            .iter()
            .filter(|chat| seen.insert(chat.id.as_str()))
            .map(|chat| self.transformer.chat(chat))
            .collect();

        let mut tx = self.db.begin_immediate().await?;

        let deleted = if is_latest {
            query::delete_many(&mut tx, Table::Chats, &self.session_id, None).await?
        } else {
            0
        };

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let existing: HashSet<String> = query::find_ids(&mut tx, Table::Chats, &self.session_id, &ids)
            .await?
            .into_iter()
            .collect();
        let fresh: Vec<Record> = records
            .into_iter()
            .filter(|r| !existing.contains(&r.id))
            .collect();

        let added = query::create_many(&mut tx, Table::Chats, &self.session_id, &fresh, false).await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok(ChatSetReport { deleted, added })
    }

    /// Create or overwrite each chat. Items are independent and run concurrently.
    pub async fn upsert(&self, chats: &[ChatData]) -> BatchReport {
        let results = join_all(chats.iter().map(|chat| {
            let record = self.transformer.chat(chat);
            async move { (chat.id.as_str(), self.upsert_record(&record).await) }
        }))
        .await;

        let mut report = BatchReport::default();
        for (id, result) in results {
            report.record(id, result.map(|()| ItemOutcome::Applied));
        }
        report
    }

    async fn upsert_record(&self, record: &Record) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        query::upsert(&mut conn, Table::Chats, &self.session_id, record).await?;
        Ok(())
    }

    /// Apply partial updates one at a time. The unread counter is merged
    /// with the stored value, see [`merge_unread_count`].
    pub async fn update(&self, updates: &[ChatData]) -> BatchReport {
        let mut report = BatchReport::default();
        for update in updates {
            let result = self.update_one(update).await;
            report.record(&update.id, result);
        }
        report
    }

    async fn update_one(&self, update: &ChatData) -> Result<ItemOutcome> {
        let _guard = self
            .sequencer
            .lock(Table::Chats.name(), &self.session_id, &update.id)
            .await;

        let mut record = self.transformer.chat(update);
        let mut tx = self.db.begin_immediate().await?;

        let Some(stored) = query::chat_unread_count(&mut tx, &self.session_id, &update.id).await?
        else {
            return Ok(ItemOutcome::NotFound);
        };

        if let Some(delta) = record.get("unread_count").and_then(DbValue::as_integer) {
            record.set(
                "unread_count",
                DbValue::Integer(merge_unread_count(stored, delta)),
            );
        }

        match query::update(&mut tx, Table::Chats, &self.session_id, &record).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(ItemOutcome::NotFound),
            Err(e) => return Err(e.into()),
        }
        tx.commit().await.map_err(DbError::from)?;

        Ok(ItemOutcome::Applied)
    }

    /// Delete chats of this session. Unknown ids are ignored.
    pub async fn delete(&self, ids: &[String]) -> Result<u64> {
        let mut conn = self.db.acquire().await?;
        Ok(query::delete_many(&mut conn, Table::Chats, &self.session_id, Some(ids)).await?)
    }
}

/// A positive delta accumulates onto the stored counter; zero or a negative
/// value replaces it.
pub fn merge_unread_count(stored: Option<i64>, delta: i64) -> i64 {
    if delta > 0 {
        stored.unwrap_or(0).saturating_add(delta)
    } else {
        delta
    }
}

#[async_trait]
impl Reconciler for ChatHandler {
    fn name(&self) -> &'static str {
        "chats"
    }

    fn events(&self) -> &'static [EventKind] {
        EVENTS
    }

    async fn handle(&self, event: &StoreEvent) {
        let session_id = self.session_id.as_str();

        match event {
            StoreEvent::HistorySet(set) => match self.set(&set.chats, set.is_latest).await {
                Ok(report) => tracing::info!(
                    session_id,
                    chats_added = report.added,
                    chats_deleted = report.deleted,
                    is_latest = set.is_latest,
                    "Synced chats"
                ),
                Err(e) => tracing::error!(
                    session_id,
                    error = %e,
                    chats = set.chats.len(),
                    "An error occurred during chats set"
                ),
            },
            StoreEvent::ChatsUpsert(chats) => {
                let report = self.upsert(chats).await;
                log_report(session_id, "chats.upsert", &report, chats);
            }
            StoreEvent::ChatsUpdate(updates) => {
                let report = self.update(updates).await;
                log_report(session_id, "chats.update", &report, updates);
            }
            StoreEvent::ChatsDelete(ids) => match self.delete(ids).await {
                Ok(deleted) => tracing::debug!(session_id, deleted, "Deleted chats"),
                Err(e) => tracing::error!(
                    session_id,
                    error = %e,
                    payload = ?ids,
                    "An error occurred during chats delete"
                ),
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::handlers::testing::{SESSION, context, context_with};
    use tina_core::{Long, Nullable};

    fn chat(id: &str) -> ChatData {
        let mut chat = ChatData::new(id);
        chat.name = Nullable::Value(format!("chat {id}"));
        chat
    }

    fn unread(id: &str, count: i64) -> ChatData {
        let mut chat = ChatData::new(id);
        chat.unread_count = Nullable::Value(Long(count));
        chat
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_unread_count() {
        assert_eq!(merge_unread_count(Some(5), 3), 8);
        assert_eq!(merge_unread_count(None, 3), 3);
        assert_eq!(merge_unread_count(Some(5), 0), 0);
        assert_eq!(merge_unread_count(Some(5), -1), -1);
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_payload() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);

        let mut second = chat("a");
        second.name = Nullable::Value("renamed".into());

        assert!(handler.upsert(&[chat("a")]).await.is_clean());
        assert!(handler.upsert(&[second]).await.is_clean());

        let chats = ctx.db.list_chats(SESSION).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].name.as_deref(), Some("renamed"));
    }

    #[tokio::test]
    async fn test_set_latest_replaces_previous_chats() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);
        handler.upsert(&[chat("old"), chat("kept")]).await;

        let report = handler.set(&[chat("kept"), chat("new")], true).await.unwrap();
        assert_eq!(report, ChatSetReport { deleted: 2, added: 2 });

        let stored: Vec<String> = ctx
            .db
            .list_chats(SESSION)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert!(!stored.contains(&"old".to_string()));
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_set_without_latest_only_inserts_missing() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);
        handler.upsert(&[unread("a", 4)]).await;

        let report = handler
            .set(&[unread("a", 0), chat("b"), chat("b")], false)
            .await
            .unwrap();
        assert_eq!(report, ChatSetReport { deleted: 0, added: 1 });

        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, Some(4));
        assert_eq!(ctx.db.list_chats(SESSION).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_accumulates_positive_delta() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);
        handler.upsert(&[unread("a", 5)]).await;

        let report = handler.update(&[unread("a", 3)]).await;
        assert_eq!(report.applied, 1);
        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, Some(8));

        handler.update(&[unread("a", 0)]).await;
        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, Some(0));
    }

    #[tokio::test]
    async fn test_update_without_counter_keeps_it() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);
        handler.upsert(&[unread("a", 5)]).await;

        let mut rename = ChatData::new("a");
        rename.name = Nullable::Value("work".into());
        handler.update(&[rename]).await;

        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, Some(5));
        assert_eq!(a.name.as_deref(), Some("work"));
    }

    #[tokio::test]
    async fn test_update_explicit_null_clears_when_nulls_kept() {
        let ctx = context_with(StoreConfig {
            remove_nullable: false,
        })
        .await;
        let handler = ChatHandler::new(&ctx, SESSION);
        handler.upsert(&[unread("a", 5)]).await;

        let mut clear = ChatData::new("a");
        clear.unread_count = Nullable::Null;
        handler.update(&[clear]).await;

        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, None);
    }

    #[tokio::test]
    async fn test_update_missing_chat_is_not_found_and_writes_nothing() {
        let ctx = context().await;
        let handler = ChatHandler::new(&ctx, SESSION);

        let report = handler.update(&[unread("ghost", 1), unread("ghost2", 2)]).await;
        assert_eq!(report.not_found, ids(&["ghost", "ghost2"]));
        assert!(report.failed.is_empty());
        assert!(ctx.db.list_chats(SESSION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_same_chat_do_not_lose_increments() {
        let ctx = context().await;
        let handler = Arc::new(ChatHandler::new(&ctx, SESSION));
        handler.upsert(&[unread("a", 0)]).await;

        let one = [unread("a", 1)];
        let two = [unread("a", 2)];
        let (r1, r2) = futures::join!(handler.update(&one), handler.update(&two));
        assert_eq!(r1.applied + r2.applied, 2);

        let a = ctx.db.get_chat(SESSION, "a").await.unwrap().unwrap();
        assert_eq!(a.unread_count, Some(3));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_session_scoped() {
        let ctx = context().await;
        ctx.db.create_session("other", None).await.unwrap();
        let handler = ChatHandler::new(&ctx, SESSION);
        let other = ChatHandler::new(&ctx, "other");
        handler.upsert(&[chat("a")]).await;
        other.upsert(&[chat("a")]).await;

        assert_eq!(handler.delete(&ids(&["a", "missing"])).await.unwrap(), 1);
        assert_eq!(handler.delete(&ids(&["a"])).await.unwrap(), 0);
        assert_eq!(ctx.db.list_chats("other").await.unwrap().len(), 1);
    }
}
