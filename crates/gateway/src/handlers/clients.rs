//! Client aggregate handlers

use abcledger_common::{
    api::ApiResponse,
    auth::Caller,
    clients::{self, ClientAggregate, ClientListQuery, ClientPatch, NewClient},
    db::models::Client,
    errors::Result,
};
use axum::extract::State;
use uuid::Uuid;

use crate::{
    extract::{JsonBody, PathIds, QueryParams},
    handlers::catalog::Deleted,
    AppState,
};

/// List the caller organization's clients
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(query): QueryParams<ClientListQuery>,
) -> Result<ApiResponse<Vec<Client>>> {
    let clients = clients::list_clients(state.store.as_ref(), &caller, query).await?;
    Ok(ApiResponse::ok(clients))
}

/// Create a client with its behaviors, programs, interventions and links
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(request): JsonBody<NewClient>,
) -> Result<ApiResponse<ClientAggregate>> {
    let created = clients::create_client(state.store.as_ref(), &caller, request).await?;
    Ok(ApiResponse::created(created))
}

pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    PathIds(client_id): PathIds<Uuid>,
) -> Result<ApiResponse<ClientAggregate>> {
    let aggregate = clients::get_client(state.store.as_ref(), &caller, client_id).await?;
    Ok(ApiResponse::ok(aggregate))
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    PathIds(client_id): PathIds<Uuid>,
    JsonBody(patch): JsonBody<ClientPatch>,
) -> Result<ApiResponse<Client>> {
    let client = clients::update_client(state.store.as_ref(), &caller, client_id, patch).await?;
    Ok(ApiResponse::ok(client))
}

/// Hard delete; admins only
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    PathIds(client_id): PathIds<Uuid>,
) -> Result<ApiResponse<Deleted>> {
    clients::delete_client(state.store.as_ref(), &caller, client_id).await?;
    Ok(ApiResponse::ok(Deleted { id: client_id }))
}
