//! Registration of reconcilers against the event source.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tina_core::{EventEmitter, EventKind, ListenerId, StoreEvent};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Merges one entity kind's events into the mirror.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Event kinds this reconciler consumes.
    fn events(&self) -> &'static [EventKind];

    /// Apply one event. Failures are logged here and never returned, so one
    /// bad event cannot stop the listener.
    async fn handle(&self, event: &StoreEvent);
}

/// A live registration. Dropping it detaches the listener.
pub struct Subscription {
    emitter: EventEmitter,
    listener: ListenerId,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Register `reconciler` and start consuming its events in order.
    pub fn start(emitter: &EventEmitter, reconciler: Arc<dyn Reconciler>) -> Self {
        let (listener, mut rx) = emitter.on(reconciler.events());
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let name = reconciler.name();

        let task = tokio::spawn(async move {
            tracing::debug!(reconciler = name, "Listening");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        let handled = AssertUnwindSafe(reconciler.handle(&event))
                            .catch_unwind()
                            .await;
                        if handled.is_err() {
                            tracing::error!(
                                reconciler = name,
                                event = %event.kind(),
                                "Handler panicked; continuing with the next event"
                            );
                        }
                    }
                }
            }
            tracing::debug!(reconciler = name, "Stopped listening");
        });

        Self {
            emitter: emitter.clone(),
            listener,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Detach now. Queued events are discarded; an event already being
    /// handled runs to completion on its own. Await the returned handle for
    /// an exact stop.
    pub fn release(mut self) -> Option<JoinHandle<()>> {
        self.detach();
        self.task.take()
    }

    /// Stop receiving new events, finish the ones already queued, and wait.
    pub async fn close(mut self) {
        self.emitter.off(self.listener);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Listener task failed");
            }
        }
    }

    fn detach(&mut self) {
        self.emitter.off(self.listener);
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A reconciler plus its optional live subscription.
///
/// `listen` and `unlisten` are idempotent: listening twice registers once,
/// and unlistening while detached does nothing.
pub struct Listener {
    reconciler: Arc<dyn Reconciler>,
    subscription: Option<Subscription>,
}

impl Listener {
    pub fn new(reconciler: Arc<dyn Reconciler>) -> Self {
        Self {
            reconciler,
            subscription: None,
        }
    }

    pub fn reconciler(&self) -> &Arc<dyn Reconciler> {
        &self.reconciler
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Returns `false` when already listening.
    pub fn listen(&mut self, emitter: &EventEmitter) -> bool {
        if self.subscription.is_some() {
            return false;
        }
        self.subscription = Some(Subscription::start(emitter, self.reconciler.clone()));
        true
    }

    pub fn unlisten(&mut self) -> Option<JoinHandle<()>> {
        self.subscription.take().and_then(Subscription::release)
    }

    pub async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close().await;
        }
    }
}
