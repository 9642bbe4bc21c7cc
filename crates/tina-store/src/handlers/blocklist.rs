use std::sync::Arc;

use async_trait::async_trait;
use tina_core::{BlocklistAction, EventKind, StoreEvent};
use tina_db::{DbError, Record, Table, TinaDb, query};

use crate::context::StoreContext;
use crate::error::Result;
use crate::subscription::Reconciler;

const EVENTS: &[EventKind] = &[EventKind::BlocklistSet, EventKind::BlocklistUpdate];

pub struct BlocklistHandler {
    session_id: String,
    db: Arc<TinaDb>,
}

impl BlocklistHandler {
    pub fn new(context: &StoreContext, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            db: context.db.clone(),
        }
    }

    /// Block every listed id. Already blocked ids are skipped and nothing is
    /// ever unblocked here. Returns the number of new entries.
    pub async fn set(&self, ids: &[String]) -> Result<u64> {
        let rows: Vec<Record> = ids.iter().map(Record::new).collect();
        let mut tx = self.db.begin().await?;
        let added = query::create_many(&mut tx, Table::Blocklist, &self.session_id, &rows, true).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(added)
    }

    /// Returns the number of rows inserted or deleted.
    pub async fn update(&self, ids: &[String], action: BlocklistAction) -> Result<u64> {
        match action {
            BlocklistAction::Add => self.set(ids).await,
            BlocklistAction::Remove => {
                let mut conn = self.db.acquire().await?;
                Ok(query::delete_many(&mut conn, Table::Blocklist, &self.session_id, Some(ids)).await?)
            }
        }
    }
}

#[async_trait]
impl Reconciler for BlocklistHandler {
    fn name(&self) -> &'static str {
        "blocklist"
    }

    fn events(&self) -> &'static [EventKind] {
        EVENTS
    }

    async fn handle(&self, event: &StoreEvent) {
        let session_id = self.session_id.as_str();

        match event {
            StoreEvent::BlocklistSet(set) => match self.set(&set.blocklist).await {
                Ok(added) => tracing::debug!(session_id, added, "Set blocklist"),
                Err(e) => tracing::error!(
                    session_id,
                    error = %e,
                    payload = ?set,
                    "An error occurred during blocklist set"
                ),
            },
            StoreEvent::BlocklistUpdate(update) => {
                match self.update(&update.blocklist, update.action).await {
                    Ok(changed) => tracing::debug!(
                        session_id,
                        changed,
                        action = ?update.action,
                        "Updated blocklist"
                    ),
                    Err(e) => tracing::error!(
                        session_id,
                        error = %e,
                        payload = ?update,
                        "An error occurred during blocklist update"
                    ),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{SESSION, context};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn blocked(handler: &BlocklistHandler) -> Vec<String> {
        let mut ids: Vec<String> = handler
            .db
            .list_blocklist(SESSION)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_set_skips_existing_and_never_deletes() {
        let ctx = context().await;
        let handler = BlocklistHandler::new(&ctx, SESSION);

        assert_eq!(handler.set(&ids(&["a", "b"])).await.unwrap(), 2);
        assert_eq!(handler.set(&ids(&["b", "c"])).await.unwrap(), 1);
        assert_eq!(blocked(&handler).await, ids(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_update_add_then_remove() {
        let ctx = context().await;
        let handler = BlocklistHandler::new(&ctx, SESSION);

        handler.update(&ids(&["x"]), BlocklistAction::Add).await.unwrap();
        handler.update(&ids(&["x"]), BlocklistAction::Add).await.unwrap();
        assert_eq!(blocked(&handler).await, ids(&["x"]));

        let removed = handler
            .update(&ids(&["x", "unknown"]), BlocklistAction::Remove)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(blocked(&handler).await.is_empty());
    }
}
