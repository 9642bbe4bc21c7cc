mod config;
mod context;
mod error;
mod handlers;
mod outcome;
mod sequencer;
mod store;
mod subscription;
pub mod transform;

pub use config::StoreConfig;
pub use context::StoreContext;
pub use error::{Result, StoreError};
pub use handlers::{
    BlocklistHandler, ChatHandler, ContactHandler, GroupMetadataHandler, apply_participant_action,
    merge_unread_count,
};
pub use outcome::{BatchReport, ChatSetReport, ContactSetReport, ItemOutcome};
pub use sequencer::{KeyGuard, KeySequencer};
pub use store::Store;
pub use subscription::{Listener, Reconciler, Subscription};
pub use transform::Transformer;

pub use tina_core::{EventEmitter, EventKind, StoreEvent};
pub use tina_db::TinaDb;
