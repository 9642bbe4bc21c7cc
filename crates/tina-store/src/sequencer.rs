//! Per-key sequencing for read-modify-write handlers.
//!
//! Holders of the same `(scope, session, id)` key run one at a time in the
//! order they asked; distinct keys never wait on each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Key = (&'static str, String, String);

#[derive(Clone, Default)]
pub struct KeySequencer {
    locks: Arc<DashMap<Key, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for KeySequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySequencer")
            .field("held", &self.locks.len())
            .finish()
    }
}

impl KeySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, scope: &'static str, session_id: &str, id: &str) -> KeyGuard {
        let key = (scope, session_id.to_string(), id.to_string());
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;

        KeyGuard {
            key,
            locks: self.locks.clone(),
            _guard: guard,
        }
    }
}

pub struct KeyGuard {
    key: Key,
    locks: Arc<DashMap<Key, Arc<Mutex<()>>>>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // One reference lives in the map and one in this guard; any more
        // means another task is waiting for the key.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let sequencer = KeySequencer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let sequencer = sequencer.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _guard = sequencer.lock("chats", "s", "a").await;
                log.lock().await.push("first:start");
                tokio::time::sleep(Duration::from_millis(50)).await;
                log.lock().await.push("first:end");
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = {
            let sequencer = sequencer.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _guard = sequencer.lock("chats", "s", "a").await;
                log.lock().await.push("second");
            })
        };

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(*log.lock().await, vec!["first:start", "first:end", "second"]);
        assert!(sequencer.locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let sequencer = KeySequencer::new();
        let _a = sequencer.lock("chats", "s", "a").await;

        let other = tokio::time::timeout(
            Duration::from_millis(100),
            sequencer.lock("chats", "s", "b"),
        )
        .await;
        assert!(other.is_ok());

        let other_session = tokio::time::timeout(
            Duration::from_millis(100),
            sequencer.lock("chats", "t", "a"),
        )
        .await;
        assert!(other_session.is_ok());
    }
}
