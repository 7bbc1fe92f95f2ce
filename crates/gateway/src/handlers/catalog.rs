//! Catalog handlers shared by antecedents, behaviors, interventions and
//! replacement programs. The route layer supplies the [`CatalogKind`].

use abcledger_common::{
    api::ApiResponse,
    auth::Caller,
    catalog::{self, CatalogItem, CatalogKind, CatalogPatch, CatalogQuery, NewCatalogItem},
    errors::Result,
};
use axum::{extract::State, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    extract::{JsonBody, PathIds, QueryParams},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}

/// List visible items with search, category filter, sort and paging
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    caller: Caller,
    QueryParams(query): QueryParams<CatalogQuery>,
) -> Result<ApiResponse<Vec<CatalogItem>>> {
    let page = catalog::list_items(state.store.as_ref(), kind, &caller, query).await?;
    Ok(ApiResponse::page(page))
}

/// Create an item owned by the caller's organization
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    caller: Caller,
    JsonBody(input): JsonBody<NewCatalogItem>,
) -> Result<ApiResponse<CatalogItem>> {
    let item = catalog::create_item(state.store.as_ref(), kind, &caller, input).await?;
    Ok(ApiResponse::created(item))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    caller: Caller,
    PathIds(id): PathIds<Uuid>,
) -> Result<ApiResponse<CatalogItem>> {
    let item = catalog::get_item(state.store.as_ref(), kind, &caller, id).await?;
    Ok(ApiResponse::ok(item))
}

/// Serves both PUT and PATCH; absent fields are left unchanged
pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    caller: Caller,
    PathIds(id): PathIds<Uuid>,
    JsonBody(patch): JsonBody<CatalogPatch>,
) -> Result<ApiResponse<CatalogItem>> {
    let item = catalog::update_item(state.store.as_ref(), kind, &caller, id, patch).await?;
    Ok(ApiResponse::ok(item))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    caller: Caller,
    PathIds(id): PathIds<Uuid>,
) -> Result<ApiResponse<Deleted>> {
    catalog::delete_item(state.store.as_ref(), kind, &caller, id).await?;
    Ok(ApiResponse::ok(Deleted { id }))
}
