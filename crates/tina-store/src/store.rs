use std::sync::Arc;

use tina_core::StoreEvent;
use tokio::task::JoinHandle;

use crate::context::StoreContext;
use crate::error::Result;
use crate::handlers::{BlocklistHandler, ChatHandler, ContactHandler, GroupMetadataHandler};
use crate::subscription::{Listener, Reconciler};

/// Mirror of one session: owns a reconciler per entity kind and their
/// subscriptions to the shared event emitter.
pub struct Store {
    session_id: String,
    context: StoreContext,
    chats: Arc<ChatHandler>,
    contacts: Arc<ContactHandler>,
    groups: Arc<GroupMetadataHandler>,
    blocklist: Arc<BlocklistHandler>,
    listeners: Vec<Listener>,
}

impl Store {
    /// Ensure the session row exists, build the reconcilers and start
    /// listening.
    pub async fn new(context: StoreContext, session_id: impl Into<String>) -> Result<Self> {
        let mut store = Self::detached(context, session_id).await?;
        store.listen();
        Ok(store)
    }

    /// Like [`Store::new`] but without subscribing; events only arrive
    /// through [`Store::apply`] until [`Store::listen`] is called.
    pub async fn detached(context: StoreContext, session_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        context.db.create_session(&session_id, None).await?;

        let chats = Arc::new(ChatHandler::new(&context, &session_id));
        let contacts = Arc::new(ContactHandler::new(&context, &session_id));
        let groups = Arc::new(GroupMetadataHandler::new(&context, &session_id));
        let blocklist = Arc::new(BlocklistHandler::new(&context, &session_id));

        let listeners = vec![
            Listener::new(chats.clone()),
            Listener::new(contacts.clone()),
            Listener::new(groups.clone()),
            Listener::new(blocklist.clone()),
        ];

        tracing::info!(session_id = %session_id, "Store ready");

        Ok(Self {
            session_id,
            context,
            chats,
            contacts,
            groups,
            blocklist,
            listeners,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    pub fn chats(&self) -> &ChatHandler {
        &self.chats
    }

    pub fn contacts(&self) -> &ContactHandler {
        &self.contacts
    }

    pub fn groups(&self) -> &GroupMetadataHandler {
        &self.groups
    }

    pub fn blocklist(&self) -> &BlocklistHandler {
        &self.blocklist
    }

    /// Subscribe every reconciler. Returns how many were newly subscribed.
    pub fn listen(&mut self) -> usize {
        let emitter = &self.context.emitter;
        let started = self
            .listeners
            .iter_mut()
            .map(|listener| listener.listen(emitter))
            .filter(|started| *started)
            .count();
        tracing::debug!(session_id = %self.session_id, started, "Listening for events");
        started
    }

    /// Detach every reconciler now. An event already being handled keeps
    /// running; await the returned handles to wait for it.
    pub fn unlisten(&mut self) -> Vec<JoinHandle<()>> {
        let handles: Vec<_> = self
            .listeners
            .iter_mut()
            .filter_map(Listener::unlisten)
            .collect();
        tracing::debug!(session_id = %self.session_id, stopped = handles.len(), "Stopped listening");
        handles
    }

    /// Detach, finish everything already queued and wait for it.
    pub async fn close(&mut self) {
        for listener in &mut self.listeners {
            listener.close().await;
        }
        tracing::debug!(session_id = %self.session_id, "Store closed");
    }

    pub fn is_listening(&self) -> bool {
        self.listeners.iter().any(Listener::is_listening)
    }

    /// Run `event` through every reconciler that consumes it, in place of the
    /// subscription queue.
    pub async fn apply(&self, event: &StoreEvent) {
        let kind = event.kind();
        for reconciler in self.reconcilers() {
            if reconciler.events().contains(&kind) {
                reconciler.handle(event).await;
            }
        }
    }

    fn reconcilers(&self) -> impl Iterator<Item = &Arc<dyn Reconciler>> {
        self.listeners.iter().map(Listener::reconciler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tina_core::{BlocklistSet, EventEmitter, EventKind};
    use tina_db::TinaDb;

    async fn context() -> StoreContext {
        StoreContext::new(
            TinaDb::in_memory().await.unwrap(),
            EventEmitter::new(),
            StoreConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_new_creates_session_and_listens() {
        let ctx = context().await;
        let mut store = Store::new(ctx.clone(), "s1").await.unwrap();

        assert!(store.is_listening());
        assert_eq!(ctx.db.get_session("s1").await.unwrap().id, "s1");
        assert_eq!(ctx.emitter.listener_count(EventKind::HistorySet), 2);
        assert_eq!(ctx.emitter.listener_count(EventKind::BlocklistUpdate), 1);

        assert_eq!(store.listen(), 0);
        assert_eq!(ctx.emitter.listener_count(EventKind::ChatsUpsert), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_unlisten_detaches_all_reconcilers() {
        let ctx = context().await;
        let mut store = Store::new(ctx.clone(), "s1").await.unwrap();

        let handles = store.unlisten();
        assert_eq!(handles.len(), 4);
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!store.is_listening());
        assert!(store.unlisten().is_empty());
        for kind in EventKind::ALL {
            assert_eq!(ctx.emitter.listener_count(kind), 0);
        }
    }

    #[tokio::test]
    async fn test_apply_without_subscription() {
        let ctx = context().await;
        let store = Store::detached(ctx.clone(), "s1").await.unwrap();
        assert!(!store.is_listening());

        store
            .apply(&StoreEvent::BlocklistSet(BlocklistSet {
                blocklist: vec!["a".into()],
            }))
            .await;

        assert_eq!(ctx.db.list_blocklist("s1").await.unwrap().len(), 1);
    }
}
