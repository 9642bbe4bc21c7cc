mod blocklist;
mod chat;
mod contact;
mod group_metadata;

pub use blocklist::BlocklistHandler;
pub use chat::{ChatHandler, merge_unread_count};
pub use contact::ContactHandler;
pub use group_metadata::{GroupMetadataHandler, apply_participant_action};

use std::fmt::Debug;

use crate::outcome::BatchReport;

/// Log a batch outcome: missing rows at info, failures at error.
fn log_report(session_id: &str, operation: &'static str, report: &BatchReport, payload: &dyn Debug) {
    for id in &report.not_found {
        tracing::info!(session_id, operation, id = %id, "Got update for non existent record");
    }
    for (id, error) in &report.failed {
        tracing::error!(
            session_id,
            operation,
            id = %id,
            error = %error,
            payload = ?payload,
            "Store operation failed"
        );
    }
    tracing::debug!(session_id, operation, applied = report.applied, "Batch applied");
}

#[cfg(test)]
pub(crate) mod testing {
    use tina_core::EventEmitter;
    use tina_db::TinaDb;

    use crate::config::StoreConfig;
    use crate::context::StoreContext;

    pub const SESSION: &str = "session-1";

    pub async fn context() -> StoreContext {
        context_with(StoreConfig::default()).await
    }

    pub async fn context_with(config: StoreConfig) -> StoreContext {
        let db = TinaDb::in_memory().await.unwrap();
        db.create_session(SESSION, None).await.unwrap();
        StoreContext::new(db, EventEmitter::new(), config)
    }
}
