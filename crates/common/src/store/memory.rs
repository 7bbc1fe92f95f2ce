//! In-memory store
//!
//! Mirrors the Postgres repository's semantics, including cascades and sort
//! order (`NULLS LAST`, id as tie-break), behind a single lock so every
//! multi-row write is atomic.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::api::Pagination;
use crate::catalog::{CatalogItem, CatalogKind, CatalogPatch, CatalogQuery, SortField, SortOrder};
use crate::clients::{resolve_links, AggregatePlan, ClientAggregate, ClientPatch, LinkedRecord};
use crate::db::models::{
    Client, ClientBehavior, ClientIntervention, ClientInterventionBehavior,
    ClientReplacementProgram, ClientReplacementProgramBehavior, SessionAbc, SessionNote,
    TherapySession,
};
use crate::errors::Result;
use crate::notes::NotesUpdate;
use crate::sessions::{SessionRecord, SessionWithAbcs};

#[derive(Default)]
struct Tables {
    catalog: HashMap<CatalogKind, Vec<CatalogItem>>,
    clients: Vec<Client>,
    behaviors: Vec<ClientBehavior>,
    interventions: Vec<ClientIntervention>,
    programs: Vec<ClientReplacementProgram>,
    intervention_links: Vec<ClientInterventionBehavior>,
    program_links: Vec<ClientReplacementProgramBehavior>,
    sessions: Vec<TherapySession>,
    abcs: Vec<SessionAbc>,
    notes: Vec<SessionNote>,
}

impl Tables {
    fn with_abcs(&self, session: TherapySession) -> SessionWithAbcs {
        let mut abcs: Vec<SessionAbc> = self
            .abcs
            .iter()
            .filter(|abc| abc.session_id == session.id)
            .cloned()
            .collect();
        abcs.sort_by_key(|abc| abc.sequence_order);

        SessionWithAbcs { session, abcs }
    }

    fn aggregate(&self, client: Client) -> ClientAggregate {
        let behaviors = self
            .behaviors
            .iter()
            .filter(|b| b.client_id == client.id)
            .cloned()
            .collect();

        let replacement_programs = self
            .programs
            .iter()
            .filter(|p| p.client_id == client.id)
            .map(|p| LinkedRecord {
                id: p.id,
                name: p.name.clone(),
                description: p.description.clone(),
                behavior_ids: self
                    .program_links
                    .iter()
                    .filter(|l| l.client_replacement_program_id == p.id)
                    .map(|l| l.client_behavior_id)
                    .collect(),
                created_at: p.created_at.into(),
            })
            .collect();

        let interventions = self
            .interventions
            .iter()
            .filter(|i| i.client_id == client.id)
            .map(|i| LinkedRecord {
                id: i.id,
                name: i.name.clone(),
                description: i.description.clone(),
                behavior_ids: self
                    .intervention_links
                    .iter()
                    .filter(|l| l.client_intervention_id == i.id)
                    .map(|l| l.client_behavior_id)
                    .collect(),
                created_at: i.created_at.into(),
            })
            .collect();

        ClientAggregate {
            client,
            behaviors,
            replacement_programs,
            interventions,
        }
    }

    fn remove_session(&mut self, id: Uuid) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        self.abcs.retain(|abc| abc.session_id != id);
        self.notes.retain(|n| n.session_id != id);
        self.sessions.len() != before
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Same ordering as `ORDER BY <col> <dir> NULLS LAST, id ASC`
fn compare(a: &CatalogItem, b: &CatalogItem, query: &CatalogQuery) -> Ordering {
    let primary = match query.sort {
        SortField::Name => directed(a.name.cmp(&b.name), query.order),
        SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at), query.order),
        SortField::Category => match (&a.category, &b.category) {
            (Some(x), Some(y)) => directed(x.cmp(y), query.order),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };

    primary.then_with(|| a.id.cmp(&b.id))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_catalog(
        &self,
        kind: CatalogKind,
        organization_id: Uuid,
        query: &CatalogQuery,
    ) -> Result<(Vec<CatalogItem>, u64)> {
        let tables = self.tables.read().await;

        let mut visible: Vec<&CatalogItem> = tables
            .catalog
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|item| item.ownership().is_visible_to(organization_id))
                    .filter(|item| query.matches(item))
                    .collect()
            })
            .unwrap_or_default();
        visible.sort_by(|a, b| compare(a, b, query));

        let total = visible.len() as u64;
        let offset = Pagination::offset(query.page, query.limit);
        let page = visible
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn find_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<CatalogItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .catalog
            .get(&kind)
            .and_then(|rows| rows.iter().find(|item| item.id == id))
            .cloned())
    }

    async fn insert_catalog(&self, kind: CatalogKind, item: CatalogItem) -> Result<CatalogItem> {
        let mut tables = self.tables.write().await;
        tables.catalog.entry(kind).or_default().push(item.clone());
        Ok(item)
    }

    async fn update_catalog(
        &self,
        kind: CatalogKind,
        id: Uuid,
        owner: Uuid,
        patch: &CatalogPatch,
        actor: Uuid,
    ) -> Result<Option<CatalogItem>> {
        let mut tables = self.tables.write().await;
        let Some(item) = tables
            .catalog
            .get_mut(&kind)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|item| item.id == id && item.organization_id == Some(owner))
            })
        else {
            return Ok(None);
        };

        patch.apply(item);
        item.updated_by = Some(actor);
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid, owner: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.catalog.get_mut(&kind) else {
            return Ok(false);
        };

        let before = rows.len();
        rows.retain(|item| !(item.id == id && item.organization_id == Some(owner)));
        Ok(rows.len() != before)
    }

    async fn create_client_aggregate(&self, plan: AggregatePlan) -> Result<ClientAggregate> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        let client = Client {
            id: Uuid::new_v4(),
            organization_id: plan.organization_id,
            first_name: plan.first_name,
            last_name: plan.last_name,
            notes: plan.notes,
            is_active: true,
            created_by: plan.created_by,
            created_at: now.into(),
            updated_at: now.into(),
        };
        tables.clients.push(client.clone());

        let mut behavior_ids = Vec::with_capacity(plan.behaviors.len());
        for behavior in plan.behaviors {
            let id = Uuid::new_v4();
            tables.behaviors.push(ClientBehavior {
                id,
                client_id: client.id,
                name: behavior.name,
                description: behavior.description,
                baseline: behavior.baseline,
                behavior_type: behavior.behavior_type.into(),
                topographies: json!(behavior.topographies),
                created_at: now.into(),
            });
            behavior_ids.push(id);
        }

        for program in plan.replacement_programs {
            let id = Uuid::new_v4();
            tables.programs.push(ClientReplacementProgram {
                id,
                client_id: client.id,
                name: program.name,
                description: program.description,
                created_at: now.into(),
            });
            for behavior_id in resolve_links(&program.behavior_indices, &behavior_ids) {
                tables.program_links.push(ClientReplacementProgramBehavior {
                    id: Uuid::new_v4(),
                    client_replacement_program_id: id,
                    client_behavior_id: behavior_id,
                });
            }
        }

        for intervention in plan.interventions {
            let id = Uuid::new_v4();
            tables.interventions.push(ClientIntervention {
                id,
                client_id: client.id,
                name: intervention.name,
                description: intervention.description,
                created_at: now.into(),
            });
            for behavior_id in resolve_links(&intervention.behavior_indices, &behavior_ids) {
                tables.intervention_links.push(ClientInterventionBehavior {
                    id: Uuid::new_v4(),
                    client_intervention_id: id,
                    client_behavior_id: behavior_id,
                });
            }
        }

        Ok(tables.aggregate(client))
    }

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>> {
        let tables = self.tables.read().await;
        Ok(tables.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn list_clients(&self, organization_id: Uuid, active: Option<bool>) -> Result<Vec<Client>> {
        let tables = self.tables.read().await;
        let mut clients: Vec<Client> = tables
            .clients
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .filter(|c| active.map_or(true, |a| c.is_active == a))
            .cloned()
            .collect();
        clients.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(clients)
    }

    async fn load_client_aggregate(&self, client: Client) -> Result<ClientAggregate> {
        let tables = self.tables.read().await;
        Ok(tables.aggregate(client))
    }

    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> Result<Option<Client>> {
        let mut tables = self.tables.write().await;
        let Some(client) = tables.clients.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        patch.apply(client);
        client.updated_at = Utc::now().into();
        Ok(Some(client.clone()))
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.clients.len();
        tables.clients.retain(|c| c.id != id);
        if tables.clients.len() == before {
            return Ok(false);
        }

        let behavior_ids: Vec<Uuid> = tables
            .behaviors
            .iter()
            .filter(|b| b.client_id == id)
            .map(|b| b.id)
            .collect();
        tables.behaviors.retain(|b| b.client_id != id);
        tables.programs.retain(|p| p.client_id != id);
        tables.interventions.retain(|i| i.client_id != id);
        tables
            .program_links
            .retain(|l| !behavior_ids.contains(&l.client_behavior_id));
        tables
            .intervention_links
            .retain(|l| !behavior_ids.contains(&l.client_behavior_id));

        let session_ids: Vec<Uuid> = tables
            .sessions
            .iter()
            .filter(|s| s.client_id == id)
            .map(|s| s.id)
            .collect();
        for session_id in session_ids {
            tables.remove_session(session_id);
        }

        Ok(true)
    }

    async fn create_session(&self, record: SessionRecord) -> Result<SessionWithAbcs> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        let session = TherapySession {
            id: Uuid::new_v4(),
            client_id: record.client_id,
            user_id: record.user_id,
            session_date: record.session_date,
            start_time: record.start_time,
            end_time: record.end_time,
            location: record.location,
            status: record.status.into(),
            form_data: record.form_data,
            created_at: now.into(),
            updated_at: now.into(),
        };
        tables.sessions.push(session.clone());

        for row in record.abc_rows {
            tables.abcs.push(row.into_model(session.id, now));
        }

        Ok(tables.with_abcs(session))
    }

    async fn replace_session(&self, id: Uuid, record: SessionRecord) -> Result<Option<SessionWithAbcs>> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        let Some(session) = tables.sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        session.session_date = record.session_date;
        session.start_time = record.start_time;
        session.end_time = record.end_time;
        session.location = record.location;
        session.status = record.status.into();
        session.form_data = record.form_data;
        session.updated_at = now.into();
        let session = session.clone();

        tables.abcs.retain(|abc| abc.session_id != id);
        for row in record.abc_rows {
            tables.abcs.push(row.into_model(id, now));
        }

        Ok(Some(tables.with_abcs(session)))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionWithAbcs>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .map(|s| tables.with_abcs(s)))
    }

    async fn list_sessions(&self, client_id: Uuid) -> Result<Vec<SessionWithAbcs>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<TherapySession> = tables
            .sessions
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.session_date
                .cmp(&a.session_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(sessions.into_iter().map(|s| tables.with_abcs(s)).collect())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_session(id))
    }

    async fn insert_notes(&self, notes: SessionNote) -> Result<SessionNote> {
        let mut tables = self.tables.write().await;
        tables.notes.push(notes.clone());
        Ok(notes)
    }

    async fn latest_notes(&self, session_id: Uuid) -> Result<Option<SessionNote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .iter()
            .filter(|n| n.session_id == session_id)
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn update_notes(&self, id: Uuid, update: NotesUpdate) -> Result<Option<SessionNote>> {
        let mut tables = self.tables.write().await;
        let Some(notes) = tables.notes.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };

        notes.content = update.content;
        if let Some(metadata) = update.generated {
            notes.is_generated = true;
            notes.generation_metadata = metadata;
        }
        notes.updated_at = Utc::now().into();
        Ok(Some(notes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: Option<&str>, organization_id: Option<Uuid>) -> CatalogItem {
        let now = Utc::now();
        CatalogItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category: category.map(String::from),
            organization_id,
            steps: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_category_sort_keeps_nulls_last() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        for (name, category) in [("a", Some("Beta")), ("b", None), ("c", Some("Alpha"))] {
            store
                .insert_catalog(CatalogKind::Behavior, item(name, category, Some(org)))
                .await
                .unwrap();
        }

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let query = CatalogQuery {
                sort: SortField::Category,
                order,
                ..Default::default()
            };
            let (rows, _) = store.list_catalog(CatalogKind::Behavior, org, &query).await.unwrap();
            assert_eq!(rows.last().unwrap().name, "b");
        }
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let row = store
            .insert_catalog(CatalogKind::Antecedent, item("Demand", None, Some(org)))
            .await
            .unwrap();
        let patch = CatalogPatch {
            name: Some("Renamed".into()),
            ..Default::default()
        };

        let other = Uuid::new_v4();
        assert!(store
            .update_catalog(CatalogKind::Antecedent, row.id, other, &patch, other)
            .await
            .unwrap()
            .is_none());

        let actor = Uuid::new_v4();
        let updated = store
            .update_catalog(CatalogKind::Antecedent, row.id, org, &patch, actor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.updated_by, Some(actor));
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_latest_notes_prefers_newest() {
        let store = MemoryStore::new();
        let session_id = Uuid::new_v4();
        let older = Utc::now() - chrono::Duration::minutes(5);

        for (content, at) in [("old", older), ("new", Utc::now())] {
            store
                .insert_notes(SessionNote {
                    id: Uuid::new_v4(),
                    session_id,
                    content: content.into(),
                    is_generated: true,
                    generation_metadata: json!({}),
                    created_by: Uuid::new_v4(),
                    created_at: at.into(),
                    updated_at: at.into(),
                })
                .await
                .unwrap();
        }

        let latest = store.latest_notes(session_id).await.unwrap().unwrap();
        assert_eq!(latest.content, "new");
    }
}
