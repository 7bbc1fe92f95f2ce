//! Persistence boundary
//!
//! Domain services talk to a [`Store`]; the Postgres [`crate::db::Repository`]
//! is the production implementation and [`MemoryStore`] backs local runs and
//! tests. Catalog writes take the caller's organization as `owner` and only
//! touch rows that organization owns.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{CatalogItem, CatalogKind, CatalogPatch, CatalogQuery};
use crate::clients::{AggregatePlan, ClientAggregate, ClientPatch};
use crate::db::models::{Client, SessionNote};
use crate::errors::Result;
use crate::notes::NotesUpdate;
use crate::sessions::{SessionRecord, SessionWithAbcs};

#[async_trait]
pub trait Store: Send + Sync {
    /// Check the backing store is reachable
    async fn ping(&self) -> Result<()>;

    // Catalog

    /// One page of rows visible to `organization_id`, plus the visible total
    async fn list_catalog(
        &self,
        kind: CatalogKind,
        organization_id: Uuid,
        query: &CatalogQuery,
    ) -> Result<(Vec<CatalogItem>, u64)>;

    async fn find_catalog(&self, kind: CatalogKind, id: Uuid) -> Result<Option<CatalogItem>>;

    async fn insert_catalog(&self, kind: CatalogKind, item: CatalogItem) -> Result<CatalogItem>;

    /// `None` when no row with this id is owned by `owner`
    async fn update_catalog(
        &self,
        kind: CatalogKind,
        id: Uuid,
        owner: Uuid,
        patch: &CatalogPatch,
        actor: Uuid,
    ) -> Result<Option<CatalogItem>>;

    async fn delete_catalog(&self, kind: CatalogKind, id: Uuid, owner: Uuid) -> Result<bool>;

    // Clients

    /// Write a client with all children and associations atomically
    async fn create_client_aggregate(&self, plan: AggregatePlan) -> Result<ClientAggregate>;

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>>;

    async fn list_clients(&self, organization_id: Uuid, active: Option<bool>) -> Result<Vec<Client>>;

    async fn load_client_aggregate(&self, client: Client) -> Result<ClientAggregate>;

    async fn update_client(&self, id: Uuid, patch: &ClientPatch) -> Result<Option<Client>>;

    async fn delete_client(&self, id: Uuid) -> Result<bool>;

    // Sessions

    /// Insert a session and its ABC rows atomically
    async fn create_session(&self, record: SessionRecord) -> Result<SessionWithAbcs>;

    /// Overwrite session fields and replace the whole ABC set atomically
    async fn replace_session(&self, id: Uuid, record: SessionRecord) -> Result<Option<SessionWithAbcs>>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionWithAbcs>>;

    /// Sessions of a client, `session_date` descending
    async fn list_sessions(&self, client_id: Uuid) -> Result<Vec<SessionWithAbcs>>;

    async fn delete_session(&self, id: Uuid) -> Result<bool>;

    // Notes

    async fn insert_notes(&self, notes: SessionNote) -> Result<SessionNote>;

    /// Most recently created notes row of a session
    async fn latest_notes(&self, session_id: Uuid) -> Result<Option<SessionNote>>;

    async fn update_notes(&self, id: Uuid, update: NotesUpdate) -> Result<Option<SessionNote>>;
}
