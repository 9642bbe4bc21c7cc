use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tina_core::{EventKind, GroupMetadataData, Participant, ParticipantAction, StoreEvent};
use tina_db::{DbError, Record, Table, TinaDb, query};

use crate::context::StoreContext;
use crate::error::Result;
use crate::outcome::{BatchReport, ItemOutcome};
use crate::sequencer::KeySequencer;
use crate::subscription::Reconciler;
use crate::transform::{self, Transformer};

use super::log_report;

const EVENTS: &[EventKind] = &[
    EventKind::GroupsUpsert,
    EventKind::GroupsUpdate,
    EventKind::GroupParticipantsUpdate,
];

pub struct GroupMetadataHandler {
    session_id: String,
    db: Arc<TinaDb>,
    transformer: Transformer,
    sequencer: KeySequencer,
}

impl GroupMetadataHandler {
    pub fn new(context: &StoreContext, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            db: context.db.clone(),
            transformer: context.transformer(),
            sequencer: context.sequencer.clone(),
        }
    }

    pub async fn upsert(&self, groups: &[GroupMetadataData]) -> BatchReport {
        let results = join_all(groups.iter().map(|group| async move {
            let result = match self.transformer.group(group) {
                Ok(record) => self.upsert_record(&record).await,
                Err(e) => Err(e),
            };
            (group.id.as_str(), result)
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
        query::upsert(&mut conn, Table::GroupMetadata, &self.session_id, record).await?;
        Ok(())
    }

    /// Partial overwrite. The participant list is only replaced when the
    /// update carries one.
    pub async fn update(&self, updates: &[GroupMetadataData]) -> BatchReport {
        let mut report = BatchReport::default();
        for update in updates {
            let result = self.update_one(update).await;
            report.record(&update.id, result);
        }
        report
    }

    async fn update_one(&self, update: &GroupMetadataData) -> Result<ItemOutcome> {
        let record = self.transformer.group(update)?;
        // A concurrent participant update reads and rewrites the same row.
        let _guard = self
            .sequencer
            .lock(Table::GroupMetadata.name(), &self.session_id, &update.id)
            .await;

        let mut conn = self.db.acquire().await?;
        match query::update(&mut conn, Table::GroupMetadata, &self.session_id, &record).await {
            Ok(()) => Ok(ItemOutcome::Applied),
            Err(e) if e.is_not_found() => Ok(ItemOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a membership transition to the stored participant list as one
    /// read-then-write, serialized per group.
    pub async fn update_participants(
        &self,
        id: &str,
        action: ParticipantAction,
        participants: &[String],
    ) -> Result<ItemOutcome> {
        let _guard = self
            .sequencer
            .lock(Table::GroupMetadata.name(), &self.session_id, id)
            .await;

        let mut tx = self.db.begin_immediate().await?;
        let Some(mut current) = query::group_participants(&mut tx, &self.session_id, id).await?
        else {
            return Ok(ItemOutcome::NotFound);
        };

        apply_participant_action(&mut current, action, participants);

        let record = Record::new(id).with("participants", transform::participants(&current)?);
        query::update(&mut tx, Table::GroupMetadata, &self.session_id, &record).await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok(ItemOutcome::Applied)
    }
}

/// In-place membership transition.
///
/// `add` appends plain members for ids not present yet. `promote` and
/// `demote` flip `is_admin` on listed members and leave `is_super_admin`
/// alone. `remove` drops every listed id.
pub fn apply_participant_action(
    current: &mut Vec<Participant>,
    action: ParticipantAction,
    ids: &[String],
) {
    match action {
        ParticipantAction::Add => {
            let mut present: HashSet<String> = current.iter().map(|p| p.id.clone()).collect();
            for id in ids {
                if present.insert(id.clone()) {
                    current.push(Participant::member(id.clone()));
                }
            }
        }
        ParticipantAction::Promote | ParticipantAction::Demote => {
            let listed: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let is_admin = action == ParticipantAction::Promote;
            for participant in current.iter_mut() {
                if listed.contains(participant.id.as_str()) {
                    participant.is_admin = is_admin;
                }
            }
        }
        ParticipantAction::Remove => {
            let listed: HashSet<&str> = ids.iter().map(String::as_str).collect();
            current.retain(|p| !listed.contains(p.id.as_str()));
        }
    }
}

#[async_trait]
impl Reconciler for GroupMetadataHandler {
    fn name(&self) -> &'static str {
        "group_metadata"
    }

    fn events(&self) -> &'static [EventKind] {
        EVENTS
    }

    async fn handle(&self, event: &StoreEvent) {
        let session_id = self.session_id.as_str();

        match event {
            StoreEvent::GroupsUpsert(groups) => {
                let report = self.upsert(groups).await;
                log_report(session_id, "groups.upsert", &report, groups);
            }
            StoreEvent::GroupsUpdate(updates) => {
                let report = self.update(updates).await;
                log_report(session_id, "groups.update", &report, updates);
            }
            StoreEvent::GroupParticipantsUpdate(update) => {
                match self
                    .update_participants(&update.id, update.action, &update.participants)
                    .await
                {
                    Ok(ItemOutcome::Applied) => tracing::debug!(
                        session_id,
                        id = %update.id,
                        action = ?update.action,
                        "Updated group participants"
                    ),
                    Ok(ItemOutcome::NotFound) => tracing::info!(
                        session_id,
                        id = %update.id,
                        "Got participants update for non existent group"
                    ),
                    Err(e) => tracing::error!(
                        session_id,
                        error = %e,
                        payload = ?update,
                        "An error occurred during group participants update"
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
    use tina_core::Nullable;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn group(id: &str, members: &[&str]) -> GroupMetadataData {
        let mut group = GroupMetadataData::new(id);
        group.subject = Nullable::Value("family".into());
        group.participants = Nullable::Value(members.iter().map(|m| Participant::member(*m)).collect());
        group
    }

    async fn members(ctx: &StoreContext, id: &str) -> Vec<Participant> {
        ctx.db
            .get_group(SESSION, id)
            .await
            .unwrap()
            .unwrap()
            .participant_list()
            .unwrap()
    }

    #[test]
    fn test_add_skips_existing_members() {
        let mut list = vec![Participant::member("a")];
        apply_participant_action(&mut list, ParticipantAction::Add, &ids(&["a", "b", "b"]));
        let got: Vec<&str> = list.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn test_demote_keeps_super_admin_flag() {
        let mut list = vec![Participant {
            id: "a".into(),
            is_admin: true,
            is_super_admin: true,
        }];
        apply_participant_action(&mut list, ParticipantAction::Demote, &ids(&["a"]));
        assert!(!list[0].is_admin);
        assert!(list[0].is_super_admin);
    }

    #[tokio::test]
    async fn test_participant_transitions() {
        let ctx = context().await;
        let handler = GroupMetadataHandler::new(&ctx, SESSION);
        assert!(handler.upsert(&[group("g", &["a"])]).await.is_clean());

        let add = handler
            .update_participants("g", ParticipantAction::Add, &ids(&["b"]))
            .await
            .unwrap();
        assert_eq!(add, ItemOutcome::Applied);
        handler
            .update_participants("g", ParticipantAction::Promote, &ids(&["a"]))
            .await
            .unwrap();
        handler
            .update_participants("g", ParticipantAction::Remove, &ids(&["b"]))
            .await
            .unwrap();

        assert_eq!(
            members(&ctx, "g").await,
            vec![Participant {
                id: "a".into(),
                is_admin: true,
                is_super_admin: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_participants_of_missing_group_are_ignored() {
        let ctx = context().await;
        let handler = GroupMetadataHandler::new(&ctx, SESSION);

        let outcome = handler
            .update_participants("ghost", ParticipantAction::Add, &ids(&["a"]))
            .await
            .unwrap();
        assert_eq!(outcome, ItemOutcome::NotFound);
        assert!(ctx.db.list_groups(SESSION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_leaves_participants_alone() {
        let ctx = context().await;
        let handler = GroupMetadataHandler::new(&ctx, SESSION);
        handler.upsert(&[group("g", &["a", "b"])]).await;

        let mut update = GroupMetadataData::new("g");
        update.desc = Nullable::Value("weekend plans".into());
        update.announce = Nullable::Value(true);
        let report = handler.update(&[update, GroupMetadataData::new("missing")]).await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.not_found, ids(&["missing"]));

        let stored = ctx.db.get_group(SESSION, "g").await.unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("weekend plans"));
        assert_eq!(stored.is_announce, Some(true));
        assert_eq!(stored.subject.as_deref(), Some("family"));
        assert_eq!(members(&ctx, "g").await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let ctx = context().await;
        let handler = GroupMetadataHandler::new(&ctx, SESSION);
        handler.upsert(&[group("g", &[])]).await;

        let b = ids(&["b"]);
        let c = ids(&["c"]);
        let (first, second) = futures::join!(
            handler.update_participants("g", ParticipantAction::Add, &b),
            handler.update_participants("g", ParticipantAction::Add, &c),
        );
        first.unwrap();
        second.unwrap();

        let mut got: Vec<String> = members(&ctx, "g").await.into_iter().map(|p| p.id).collect();
        got.sort();
        assert_eq!(got, ids(&["b", "c"]));
    }
}
