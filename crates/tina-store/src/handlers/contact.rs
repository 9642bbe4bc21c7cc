use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tina_core::{ContactData, EventKind, StoreEvent};
use tina_db::{Record, Table, TinaDb, query};

use crate::context::StoreContext;
use crate::error::Result;
use crate::outcome::{BatchReport, ContactSetReport, ItemOutcome};
use crate::subscription::Reconciler;
use crate::transform::Transformer;

use super::log_report;

const EVENTS: &[EventKind] = &[
    EventKind::HistorySet,
    EventKind::ContactsUpsert,
    EventKind::ContactsUpdate,
];

pub struct ContactHandler {
    session_id: String,
    db: Arc<TinaDb>,
    transformer: Transformer,
}

impl ContactHandler {
    pub fn new(context: &StoreContext, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            db: context.db.clone(),
            transformer: context.transformer(),
        }
    }

    /// Make the stored contacts match `contacts`: every incoming contact is
    /// upserted and every stored contact missing from the list is deleted,
    /// whether or not the sync is flagged as the latest. An empty list
    /// therefore clears the session's contacts.
    ///
    /// The upserts and the deletion run side by side without a shared
    /// transaction, so a failure in one leaves the other applied.
    pub async fn set(&self, contacts: &[ContactData]) -> Result<ContactSetReport> {
        let ids: Vec<String> = contacts.iter().map(|c| c.id.clone()).collect();
        let stale = {
            let mut conn = self.db.acquire().await?;
            query::find_ids_not_in(&mut conn, Table::Contacts, &self.session_id, &ids).await?
        };

        let (upserted, deleted) = futures::join!(self.upsert(contacts), self.delete_stale(&stale));

        if let Some((_, error)) = upserted.failed.into_iter().next() {
            return Err(error);
        }
        Ok(ContactSetReport {
            deleted: deleted?,
            upserted: upserted.applied,
        })
    }

    async fn delete_stale(&self, stale: &[String]) -> Result<u64> {
        if stale.is_empty() {
            return Ok(0);
        }
        let mut conn = self.db.acquire().await?;
        Ok(query::delete_many(&mut conn, Table::Contacts, &self.session_id, Some(stale)).await?)
    }

    pub async fn upsert(&self, contacts: &[ContactData]) -> BatchReport {
        let results = join_all(contacts.iter().map(|contact| {
            let record = self.transformer.contact(contact);
            async move { (contact.id.as_str(), self.upsert_record(&record).await) }
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
        query::upsert(&mut conn, Table::Contacts, &self.session_id, record).await?;
        Ok(())
    }

    /// Overwrite only the fields each update mentions.
    pub async fn update(&self, updates: &[ContactData]) -> BatchReport {
        let mut report = BatchReport::default();
        for update in updates {
            let record = self.transformer.contact(update);
            let result = self.update_record(&record).await;
            report.record(&update.id, result);
        }
        report
    }

    async fn update_record(&self, record: &Record) -> Result<ItemOutcome> {
        let mut conn = self.db.acquire().await?;
        match query::update(&mut conn, Table::Contacts, &self.session_id, record).await {
            Ok(()) => Ok(ItemOutcome::Applied),
            Err(e) if e.is_not_found() => Ok(ItemOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Reconciler for ContactHandler {
    fn name(&self) -> &'static str {
        "contacts"
    }

    fn events(&self) -> &'static [EventKind] {
        EVENTS
    }

    async fn handle(&self, event: &StoreEvent) {
        let session_id = self.session_id.as_str();

        match event {
            StoreEvent::HistorySet(set) => match self.set(&set.contacts).await {
                Ok(report) => tracing::info!(
                    session_id,
                    contacts_upserted = report.upserted,
                    contacts_deleted = report.deleted,
                    "Synced contacts"
                ),
                Err(e) => tracing::error!(
                    session_id,
                    error = %e,
                    contacts = set.contacts.len(),
                    "An error occurred during contacts set"
                ),
            },
            StoreEvent::ContactsUpsert(contacts) => {
                let report = self.upsert(contacts).await;
                log_report(session_id, "contacts.upsert", &report, contacts);
            }
            StoreEvent::ContactsUpdate(updates) => {
                let report = self.update(updates).await;
                log_report(session_id, "contacts.update", &report, updates);
            }
            _ => {}
        }
    }
}
