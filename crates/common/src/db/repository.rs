//! Repository pattern for database operations
//!
//! Postgres implementation of [`Store`]. Catalog tables share one shape and
//! are queried with raw SQL over the table name; everything else goes through
//! the SeaORM entities. Multi-statement writes run in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QueryResult, Set, Statement, TransactionTrait, Value,
};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::Pagination;
use crate::catalog::{
    like_pattern, visibility_sql, CatalogItem, CatalogKind, CatalogPatch, CatalogQuery,
    ProgramSteps,
};
use crate::clients::{resolve_links, AggregatePlan, ClientAggregate, ClientPatch, LinkedRecord};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::notes::NotesUpdate;
use crate::sessions::{SessionRecord, SessionWithAbcs};
use crate::store::Store;

/// WHERE clause and bound values shared by the count and page queries
struct CatalogFilter {
    clause: String,
    values: Vec<Value>,
}

impl CatalogFilter {
    fn new(organization_id: Uuid, query: &CatalogQuery) -> Self {
        let mut values: Vec<Value> = vec![organization_id.into()];
        let mut clause = visibility_sql("organization_id", values.len());

        if let Some(term) = query.search_term() {
            values.push(like_pattern(term).into());
            clause.push_str(&format!(" AND name ILIKE ${} ESCAPE '\\'", values.len()));
        }

        if let Some(category) = query.category_filter() {
            values.push(category.to_string().into());
            clause.push_str(&format!(" AND category = ${}", values.len()));
        }

        Self { clause, values }
    }
}

/// Selected columns; kinds without steps read a NULL in their place
fn catalog_columns(kind: CatalogKind) -> &'static str {
    if kind.has_steps() {
        "id, name, description, category, organization_id, steps, \
         created_by, updated_by, created_at, updated_at"
    } else {
        "id, name, description, category, organization_id, NULL::jsonb AS steps, \
         created_by, updated_by, created_at, updated_at"
    }
}

fn catalog_item(row: &QueryResult) -> Result<CatalogItem> {
    let steps = row
        .try_get::<Option<serde_json::Value>>("", "steps")?
        .map(ProgramSteps::from_storage)
        .transpose()?;

    Ok(CatalogItem {
        id: row.try_get("", "id")?,
        name: row.try_get("", "name")?,
        description: row.try_get("", "description")?,
        category: row.try_get("", "category")?,
        organization_id: row.try_get("", "organization_id")?,
        steps,
        created_by: row.try_get("", "created_by")?,
        updated_by: row.try_get("", "updated_by")?,
        created_at: row.try_get::<DateTime<Utc>>("", "created_at")?,
        updated_at: row.try_get::<DateTime<Utc>>("", "updated_at")?,
    })
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    async fn session_abcs<C: ConnectionTrait>(conn: &C, session_id: Uuid) -> Result<Vec<SessionAbc>> {
        SessionAbcEntity::find()
            .filter(SessionAbcColumn::SessionId.eq(session_id))
            .order_by_asc(SessionAbcColumn::SequenceOrder)
            .all(conn)
            .await
            .map_err(Into::into)
    }

    async fn insert_abcs<C: ConnectionTrait>(
        conn: &C,
        session_id: Uuid,
        record_rows: Vec<crate::sessions::AbcRow>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for row in record_rows {
            let abc = row.into_model(session_id, now);
            SessionAbcActiveModel {
                id: Set(abc.id),
                session_id: Set(abc.session_id),
                antecedent: Set(abc.antecedent),
                behavior: Set(abc.behavior),
                consequence: Set(abc.consequence),
                sequence_order: Set(abc.sequence_order),
                created_at: Set(abc.created_at),
            }
            .insert(conn)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for Repository {
    // ========================================================================
    // Health Check
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Catalog Operations
    // ========================================================================

    async fn list_catalog(
        &self,
        kind: CatalogKind,
        organization_id: Uuid,
        query: &CatalogQuery,
    ) -> Result<(Vec<CatalogItem>, u64)> {
        let filter = CatalogFilter::new(organization_id, query);

        let count_sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE {}",
            kind.table(),
            filter.clause
        );
        let total = self
            .read_conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &count_sql,
                filter.values.clone(),
            ))
            .await?
            .map(|row| row.try_get::<i64>("", "total"))
            .transpose()?
            .unwrap_or(0);

        let mut values = filter.values;
        let (limit, offset) = Pagination::sql_window(query.page, query.limit);
        values.push(limit.into());
        values.push(offset.into());

        let page_sql = format!(
            r#"
            SELECT {columns}
            FROM {table}
            WHERE {clause}
            ORDER BY {sort} {order} NULLS LAST, id ASC
            LIMIT ${limit} OFFSET ${offset}
            "#,
            columns = catalog_columns(kind),
            table = kind.table(),
            clause = filter.clause,
            sort = query.sort.column(),
            order = query.order.keyword(),
            limit = values.len() - 1,
            offset = values.len(),
        );

        let items = self
            .read_conn()
            .query_all(Statement::from_sql_and_values(DbBackend::Postgres, &page_sql, values))
            .await?
            .iter()
            .map(catalog_item)
            .collect::<Result<Vec<_>>>()?;

        Ok((items, total.max(0) as u64))
    }

    async fn find_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<CatalogItem>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            catalog_columns(kind),
            kind.table()
        );

        self.read_conn()
            .query_one(Statement::from_sql_and_values(DbBackend::Postgres, &sql, vec![id.into()]))
            .await?
            .map(|row| catalog_item(&row))
            .transpose()
    }

    async fn insert_catalog(&self, kind: CatalogKind, item: CatalogItem) -> Result<CatalogItem> {
        let mut values: Vec<Value> = vec![
            item.id.into(),
            item.name.into(),
            item.description.into(),
            item.category.into(),
            item.organization_id.into(),
            item.created_by.into(),
            item.updated_by.into(),
            item.created_at.into(),
            item.updated_at.into(),
        ];

        let (steps_column, steps_value) = if kind.has_steps() {
            let steps = item.steps.unwrap_or_default().to_storage();
            values.push(steps.into());
            (", steps", format!(", ${}", values.len()))
        } else {
            ("", String::new())
        };

        let sql = format!(
            r#"
            INSERT INTO {table} (
                id, name, description, category, organization_id,
                created_by, updated_by, created_at, updated_at{steps_column}
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9{steps_value})
            RETURNING {columns}
            "#,
            table = kind.table(),
            columns = catalog_columns(kind),
        );

        let row = self
            .write_conn()
            .query_one(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotInserted)?;

        catalog_item(&row)
    }

    async fn update_catalog(
        &self,
        kind: CatalogKind,
        id: Uuid,
        owner: Uuid,
        patch: &CatalogPatch,
        actor: Uuid,
    ) -> Result<Option<CatalogItem>> {
        let mut values: Vec<Value> = vec![id.into(), owner.into(), actor.into()];
        let mut sets = vec!["updated_by = $3".to_string(), "updated_at = NOW()".to_string()];

        if let Some(name) = &patch.name {
            values.push(name.clone().into());
            sets.push(format!("name = ${}", values.len()));
        }
        if let Some(description) = &patch.description {
            values.push(description.clone().into());
            sets.push(format!("description = ${}", values.len()));
        }
        if let Some(category) = &patch.category {
            values.push(category.clone().into());
            sets.push(format!("category = ${}", values.len()));
        }
        if let (true, Some(steps)) = (kind.has_steps(), &patch.steps) {
            values.push(steps.to_storage().into());
            sets.push(format!("steps = ${}", values.len()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = $1 AND organization_id = $2 RETURNING {}",
            kind.table(),
            sets.join(", "),
            catalog_columns(kind)
        );

        self.write_conn()
            .query_one(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .await?
            .map(|row| catalog_item(&row))
            .transpose()
    }

    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid, owner: Uuid) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND organization_id = $2",
            kind.table()
        );

        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![id.into(), owner.into()],
            ))
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Client Operations
    // ========================================================================

    async fn create_client_aggregate(&self, plan: AggregatePlan) -> Result<ClientAggregate> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let client = ClientActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(plan.organization_id),
            first_name: Set(plan.first_name),
            last_name: Set(plan.last_name),
            notes: Set(plan.notes),
            is_active: Set(true),
            created_by: Set(plan.created_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        // Behaviors first: association rows reference their new ids
        let mut behaviors = Vec::with_capacity(plan.behaviors.len());
        for behavior in plan.behaviors {
            let created = ClientBehaviorActiveModel {
                id: Set(Uuid::new_v4()),
                client_id: Set(client.id),
                name: Set(behavior.name),
                description: Set(behavior.description),
                baseline: Set(behavior.baseline),
                behavior_type: Set(behavior.behavior_type.into()),
                topographies: Set(json!(behavior.topographies)),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            behaviors.push(created);
        }
        let behavior_ids: Vec<Uuid> = behaviors.iter().map(|b| b.id).collect();

        let mut replacement_programs = Vec::with_capacity(plan.replacement_programs.len());
        for program in plan.replacement_programs {
            let created = ClientReplacementProgramActiveModel {
                id: Set(Uuid::new_v4()),
                client_id: Set(client.id),
                name: Set(program.name),
                description: Set(program.description),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;

            let linked = resolve_links(&program.behavior_indices, &behavior_ids);
            for behavior_id in &linked {
                ClientReplacementProgramBehaviorActiveModel {
                    id: Set(Uuid::new_v4()),
                    client_replacement_program_id: Set(created.id),
                    client_behavior_id: Set(*behavior_id),
                }
                .insert(&txn)
                .await?;
            }

            replacement_programs.push(LinkedRecord {
                id: created.id,
                name: created.name,
                description: created.description,
                behavior_ids: linked,
                created_at: created.created_at.into(),
            });
        }

        let mut interventions = Vec::with_capacity(plan.interventions.len());
        for intervention in plan.interventions {
            let created = ClientInterventionActiveModel {
                id: Set(Uuid::new_v4()),
                client_id: Set(client.id),
                name: Set(intervention.name),
                description: Set(intervention.description),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;

            let linked = resolve_links(&intervention.behavior_indices, &behavior_ids);
            for behavior_id in &linked {
                ClientInterventionBehaviorActiveModel {
                    id: Set(Uuid::new_v4()),
                    client_intervention_id: Set(created.id),
                    client_behavior_id: Set(*behavior_id),
                }
                .insert(&txn)
                .await?;
            }

            interventions.push(LinkedRecord {
                id: created.id,
                name: created.name,
                description: created.description,
                behavior_ids: linked,
                created_at: created.created_at.into(),
            });
        }

        txn.commit().await?;

        Ok(ClientAggregate {
            client,
            behaviors,
            replacement_programs,
            interventions,
        })
    }

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>> {
        ClientEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_clients(&self, organization_id: Uuid, active: Option<bool>) -> Result<Vec<Client>> {
        let mut query = ClientEntity::find().filter(ClientColumn::OrganizationId.eq(organization_id));
        if let Some(active) = active {
            query = query.filter(ClientColumn::IsActive.eq(active));
        }

        query
            .order_by_asc(ClientColumn::LastName)
            .order_by_asc(ClientColumn::FirstName)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn load_client_aggregate(&self, client: Client) -> Result<ClientAggregate> {
        let conn = self.read_conn();

        let behaviors = ClientBehaviorEntity::find()
            .filter(ClientBehaviorColumn::ClientId.eq(client.id))
            .order_by_asc(ClientBehaviorColumn::CreatedAt)
            .order_by_asc(ClientBehaviorColumn::Name)
            .all(conn)
            .await?;

        let programs = ClientReplacementProgramEntity::find()
            .filter(ClientReplacementProgramColumn::ClientId.eq(client.id))
            .order_by_asc(ClientReplacementProgramColumn::CreatedAt)
            .order_by_asc(ClientReplacementProgramColumn::Name)
            .all(conn)
            .await?;
        let program_links = ClientReplacementProgramBehaviorEntity::find()
            .filter(
                ClientReplacementProgramBehaviorColumn::ClientReplacementProgramId
                    .is_in(programs.iter().map(|p| p.id)),
            )
            .all(conn)
            .await?;

        let interventions = ClientInterventionEntity::find()
            .filter(ClientInterventionColumn::ClientId.eq(client.id))
            .order_by_asc(ClientInterventionColumn::CreatedAt)
            .order_by_asc(ClientInterventionColumn::Name)
            .all(conn)
            .await?;
        let intervention_links = ClientInterventionBehaviorEntity::find()
            .filter(
                ClientInterventionBehaviorColumn::ClientInterventionId
                    .is_in(interventions.iter().map(|i| i.id)),
            )
            .all(conn)
            .await?;

        let mut program_behaviors: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for link in program_links {
            program_behaviors
                .entry(link.client_replacement_program_id)
                .or_default()
                .push(link.client_behavior_id);
        }
        let mut intervention_behaviors: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for link in intervention_links {
            intervention_behaviors
                .entry(link.client_intervention_id)
                .or_default()
                .push(link.client_behavior_id);
        }

        Ok(ClientAggregate {
            client,
            behaviors,
            replacement_programs: programs
                .into_iter()
                .map(|p| LinkedRecord {
                    behavior_ids: program_behaviors.remove(&p.id).unwrap_or_default(),
                    id: p.id,
                    name: p.name,
                    description: p.description,
                    created_at: p.created_at.into(),
                })
                .collect(),
            interventions: interventions
                .into_iter()
                .map(|i| LinkedRecord {
                    behavior_ids: intervention_behaviors.remove(&i.id).unwrap_or_default(),
                    id: i.id,
                    name: i.name,
                    description: i.description,
                    created_at: i.created_at.into(),
                })
                .collect(),
        })
    }

    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> Result<Option<Client>> {
        let Some(existing) = ClientEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut client: ClientActiveModel = existing.into();
        if let Some(first_name) = &patch.first_name {
            client.first_name = Set(first_name.clone());
        }
        if let Some(last_name) = &patch.last_name {
            client.last_name = Set(last_name.clone());
        }
        if let Some(notes) = &patch.notes {
            client.notes = Set(Some(notes.clone()));
        }
        if let Some(is_active) = patch.is_active {
            client.is_active = Set(is_active);
        }
        client.updated_at = Set(Utc::now().into());

        Ok(Some(client.update(self.write_conn()).await?))
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool> {
        let result = ClientEntity::delete_by_id(id).exec(self.write_conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    async fn create_session(&self, record: SessionRecord) -> Result<SessionWithAbcs> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let session = TherapySessionActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(record.client_id),
            user_id: Set(record.user_id),
            session_date: Set(record.session_date),
            start_time: Set(record.start_time),
            end_time: Set(record.end_time),
            location: Set(record.location),
            status: Set(record.status.into()),
            form_data: Set(record.form_data),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        Self::insert_abcs(&txn, session.id, record.abc_rows, now).await?;
        let abcs = Self::session_abcs(&txn, session.id).await?;

        txn.commit().await?;

        Ok(SessionWithAbcs { session, abcs })
    }

    async fn replace_session(&self, id: Uuid, record: SessionRecord) -> Result<Option<SessionWithAbcs>> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let Some(existing) = TherapySessionEntity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let mut session: TherapySessionActiveModel = existing.into();
        session.session_date = Set(record.session_date);
        session.start_time = Set(record.start_time);
        session.end_time = Set(record.end_time);
        session.location = Set(record.location);
        session.status = Set(record.status.into());
        session.form_data = Set(record.form_data);
        session.updated_at = Set(now.into());
        let session = session.update(&txn).await?;

        SessionAbcEntity::delete_many()
            .filter(SessionAbcColumn::SessionId.eq(id))
            .exec(&txn)
            .await?;
        Self::insert_abcs(&txn, id, record.abc_rows, now).await?;
        let abcs = Self::session_abcs(&txn, id).await?;

        txn.commit().await?;

        Ok(Some(SessionWithAbcs { session, abcs }))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionWithAbcs>> {
        let Some(session) = TherapySessionEntity::find_by_id(id).one(self.read_conn()).await? else {
            return Ok(None);
        };

        let abcs = Self::session_abcs(self.read_conn(), id).await?;
        Ok(Some(SessionWithAbcs { session, abcs }))
    }

    async fn list_sessions(&self, client_id: Uuid) -> Result<Vec<SessionWithAbcs>> {
        let sessions = TherapySessionEntity::find()
            .filter(TherapySessionColumn::ClientId.eq(client_id))
            .order_by_desc(TherapySessionColumn::SessionDate)
            .order_by_desc(TherapySessionColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        let rows = SessionAbcEntity::find()
            .filter(SessionAbcColumn::SessionId.is_in(sessions.iter().map(|s| s.id)))
            .order_by_asc(SessionAbcColumn::SequenceOrder)
            .all(self.read_conn())
            .await?;

        let mut by_session: HashMap<Uuid, Vec<SessionAbc>> = HashMap::new();
        for row in rows {
            by_session.entry(row.session_id).or_default().push(row);
        }

        Ok(sessions
            .into_iter()
            .map(|session| SessionWithAbcs {
                abcs: by_session.remove(&session.id).unwrap_or_default(),
                session,
            })
            .collect())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let result = TherapySessionEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Notes Operations
    // ========================================================================

    async fn insert_notes(&self, notes: SessionNote) -> Result<SessionNote> {
        SessionNoteActiveModel {
            id: Set(notes.id),
            session_id: Set(notes.session_id),
            content: Set(notes.content),
            is_generated: Set(notes.is_generated),
            generation_metadata: Set(notes.generation_metadata),
            created_by: Set(notes.created_by),
            created_at: Set(notes.created_at),
            updated_at: Set(notes.updated_at),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    async fn latest_notes(&self, session_id: Uuid) -> Result<Option<SessionNote>> {
        SessionNoteEntity::find()
            .filter(SessionNoteColumn::SessionId.eq(session_id))
            .order_by_desc(SessionNoteColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_notes(&self, id: Uuid, update: NotesUpdate) -> Result<Option<SessionNote>> {
        let Some(existing) = SessionNoteEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut notes: SessionNoteActiveModel = existing.into();
        notes.content = Set(update.content);
        if let Some(metadata) = update.generated {
            notes.is_generated = Set(true);
            notes.generation_metadata = Set(metadata);
        }
        notes.updated_at = Set(Utc::now().into());

        Ok(Some(notes.update(self.write_conn()).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SortField, SortOrder};

    #[test]
    fn test_filter_starts_with_visibility() {
        let filter = CatalogFilter::new(Uuid::new_v4(), &CatalogQuery::default());
        assert_eq!(filter.clause, "(organization_id IS NULL OR organization_id = $1)");
        assert_eq!(filter.values.len(), 1);
    }

    #[test]
    fn test_filter_numbers_placeholders_in_order() {
        let query = CatalogQuery {
            search: Some("bang".into()),
            category: Some("Self-injury".into()),
            sort: SortField::Category,
            order: SortOrder::Desc,
            ..Default::default()
        };
        let filter = CatalogFilter::new(Uuid::new_v4(), &query);

        assert!(filter.clause.contains("name ILIKE $2 ESCAPE '\\'"));
        assert!(filter.clause.contains("category = $3"));
        assert_eq!(filter.values.len(), 3);
    }

    #[test]
    fn test_blank_search_adds_no_predicate() {
        let query = CatalogQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        let filter = CatalogFilter::new(Uuid::new_v4(), &query);
        assert!(!filter.clause.contains("ILIKE"));
    }

    #[test]
    fn test_columns_cover_steps() {
        assert!(catalog_columns(CatalogKind::ReplacementProgram).contains(", steps,"));
        assert!(catalog_columns(CatalogKind::Behavior).contains("NULL::jsonb AS steps"));
    }
}
