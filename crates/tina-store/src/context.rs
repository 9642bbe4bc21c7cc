use std::sync::Arc;

use tina_core::EventEmitter;
use tina_db::TinaDb;

use crate::config::StoreConfig;
use crate::sequencer::KeySequencer;
use crate::transform::Transformer;

/// Shared collaborators, built once and handed to every store.
#[derive(Clone)]
pub struct StoreContext {
    pub db: Arc<TinaDb>,
    pub emitter: EventEmitter,
    pub sequencer: KeySequencer,
    pub config: StoreConfig,
}

impl StoreContext {
    pub fn new(db: TinaDb, emitter: EventEmitter, config: StoreConfig) -> Self {
        Self {
            db: Arc::new(db),
            emitter,
            sequencer: KeySequencer::new(),
            config,
        }
    }

    pub fn transformer(&self) -> Transformer {
        Transformer::new(&self.config)
    }
}
