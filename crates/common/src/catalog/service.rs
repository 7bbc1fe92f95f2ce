//! Catalog operations with the tenant access rules applied

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    check_steps_allowed, CatalogItem, CatalogKind, CatalogPatch, CatalogQuery, Mutation,
    NewCatalogItem, OwnershipViolation,
};
use crate::api::{Page, Pagination};
use crate::auth::Caller;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::store::Store;

fn violation_reason(violation: OwnershipViolation) -> &'static str {
    match violation {
        OwnershipViolation::GlobalResource => "global",
        OwnershipViolation::OtherOrganization => "other_organization",
    }
}

/// Load a row and check the caller may write to it
async fn writable(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    id: Uuid,
    mutation: Mutation,
) -> Result<CatalogItem> {
    let item = store
        .find_catalog(kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.singular(), id))?;

    if let Err(violation) = item.ownership().check_mutation(caller.organization_id) {
        metrics::record_ownership_denial(kind.table(), violation_reason(violation));
        warn!(
            kind = kind.table(),
            id = %id,
            organization_id = %caller.organization_id,
            reason = violation_reason(violation),
            "Catalog write refused"
        );
        return Err(violation.into_error(kind, mutation));
    }

    Ok(item)
}

pub async fn list_items(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    query: CatalogQuery,
) -> Result<Page<CatalogItem>> {
    query.validate()?;

    let (items, total) = store
        .list_catalog(kind, caller.organization_id, &query)
        .await?;

    debug!(
        kind = kind.table(),
        organization_id = %caller.organization_id,
        returned = items.len(),
        total = total,
        "Catalog listed"
    );

    Ok(Page {
        items,
        pagination: Pagination::new(query.page, query.limit, total),
    })
}

/// Global rows and the caller's own rows are readable; others are forbidden
pub async fn get_item(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    id: Uuid,
) -> Result<CatalogItem> {
    let item = store
        .find_catalog(kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.singular(), id))?;

    if !item.ownership().is_visible_to(caller.organization_id) {
        return Err(AppError::forbidden(format!(
            "You do not have access to this {}",
            kind.singular().to_lowercase()
        )));
    }

    Ok(item)
}

/// New rows always belong to the caller's organization
pub async fn create_item(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    input: NewCatalogItem,
) -> Result<CatalogItem> {
    input.validate()?;
    check_steps_allowed(kind, input.steps.as_ref())?;

    let now = Utc::now();
    let item = CatalogItem {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        description: input.description,
        category: input.category,
        organization_id: Some(caller.organization_id),
        steps: input
            .steps
            .or_else(|| kind.has_steps().then(Default::default)),
        created_by: Some(caller.user_id),
        updated_by: Some(caller.user_id),
        created_at: now,
        updated_at: now,
    };

    let created = store.insert_catalog(kind, item).await?;

    metrics::record_catalog_mutation(kind.table(), "create");
    info!(
        kind = kind.table(),
        id = %created.id,
        organization_id = %caller.organization_id,
        "Catalog item created"
    );

    Ok(created)
}

pub async fn update_item(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    id: Uuid,
    mut patch: CatalogPatch,
) -> Result<CatalogItem> {
    patch.validate()?;
    patch.check_category()?;
    patch.trim_name();
    check_steps_allowed(kind, patch.steps.as_ref())?;

    let existing = writable(store, kind, caller, id, Mutation::Update).await?;
    if patch.is_empty() {
        return Ok(existing);
    }

    let updated = store
        .update_catalog(kind, id, caller.organization_id, &patch, caller.user_id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.singular(), id))?;

    metrics::record_catalog_mutation(kind.table(), "update");
    info!(kind = kind.table(), id = %id, "Catalog item updated");

    Ok(updated)
}

pub async fn delete_item(
    store: &dyn Store,
    kind: CatalogKind,
    caller: &Caller,
    id: Uuid,
) -> Result<()> {
    writable(store, kind, caller, id, Mutation::Delete).await?;

    if !store.delete_catalog(kind, id, caller.organization_id).await? {
        return Err(AppError::not_found(kind.singular(), id));
    }

    metrics::record_catalog_mutation(kind.table(), "delete");
    info!(kind = kind.table(), id = %id, "Catalog item deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn global(name: &str) -> CatalogItem {
        let now = Utc::now();
        CatalogItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category: None,
            organization_id: None,
            steps: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn new_item(name: &str) -> NewCatalogItem {
        NewCatalogItem {
            name: name.to_string(),
            description: None,
            category: Some("Aggression".to_string()),
            steps: None,
        }
    }

    fn rename(name: &str) -> CatalogPatch {
        CatalogPatch {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_is_owned_by_caller() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());

        let item = create_item(&store, CatalogKind::Behavior, &caller, new_item("Hitting"))
            .await
            .unwrap();

        assert_eq!(item.organization_id, Some(caller.organization_id));
        assert_eq!(item.created_by, Some(caller.user_id));
        assert_eq!(item.updated_by, Some(caller.user_id));
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected_and_names_trimmed() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());

        let err = create_item(&store, CatalogKind::Behavior, &caller, new_item("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let row = create_item(&store, CatalogKind::Behavior, &caller, new_item(" Hitting "))
            .await
            .unwrap();
        assert_eq!(row.name, "Hitting");

        let err = update_item(&store, CatalogKind::Behavior, &caller, row.id, rename("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let renamed = update_item(&store, CatalogKind::Behavior, &caller, row.id, rename(" Kicking "))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Kicking");
    }

    #[tokio::test]
    async fn test_null_clears_category() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let row = create_item(&store, CatalogKind::Behavior, &caller, new_item("Hitting"))
            .await
            .unwrap();
        assert_eq!(row.category.as_deref(), Some("Aggression"));

        let patch = CatalogPatch {
            category: Some(None),
            ..Default::default()
        };
        let updated = update_item(&store, CatalogKind::Behavior, &caller, row.id, patch)
            .await
            .unwrap();
        assert_eq!(updated.category, None);
        assert_eq!(updated.name, "Hitting");
    }

    #[tokio::test]
    async fn test_global_rows_are_read_only() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let row = store
            .insert_catalog(CatalogKind::Behavior, global("Elopement"))
            .await
            .unwrap();

        let fetched = get_item(&store, CatalogKind::Behavior, &caller, row.id).await.unwrap();
        assert_eq!(fetched.name, "Elopement");

        let err = update_item(&store, CatalogKind::Behavior, &caller, row.id, rename("X"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Global behaviors cannot be modified");

        let err = delete_item(&store, CatalogKind::Behavior, &caller, row.id)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Global behaviors cannot be deleted");

        let unchanged = store.find_catalog(CatalogKind::Behavior, row.id).await.unwrap().unwrap();
        assert_eq!(unchanged, row);
    }

    #[tokio::test]
    async fn test_other_tenant_rows_are_forbidden() {
        let store = MemoryStore::new();
        let owner = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let intruder = Caller::new(Uuid::new_v4(), Uuid::new_v4());

        let row = create_item(&store, CatalogKind::Intervention, &owner, new_item("Blocking"))
            .await
            .unwrap();

        let err = get_item(&store, CatalogKind::Intervention, &intruder, row.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = update_item(&store, CatalogKind::Intervention, &intruder, row.id, rename("X"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You can only edit interventions that belong to your organization"
        );

        let err = delete_item(&store, CatalogKind::Intervention, &intruder, row.id)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You can only delete interventions that belong to your organization"
        );
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());

        let err = update_item(&store, CatalogKind::Antecedent, &caller, Uuid::new_v4(), rename("X"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_owner_update_keeps_ownership() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let editor = Caller::new(Uuid::new_v4(), caller.organization_id);

        let row = create_item(&store, CatalogKind::Antecedent, &caller, new_item("Demand"))
            .await
            .unwrap();
        let updated = update_item(&store, CatalogKind::Antecedent, &editor, row.id, rename("Demand placed"))
            .await
            .unwrap();

        assert_eq!(updated.name, "Demand placed");
        assert_eq!(updated.organization_id, row.organization_id);
        assert_eq!(updated.created_by, Some(caller.user_id));
        assert_eq!(updated.updated_by, Some(editor.user_id));
        assert_eq!(updated.category.as_deref(), Some("Aggression"));
    }

    #[tokio::test]
    async fn test_list_pagination_counts_visible_rows_only() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let other = Caller::new(Uuid::new_v4(), Uuid::new_v4());

        for name in ["Alpha", "Bravo", "Charlie"] {
            store.insert_catalog(CatalogKind::Behavior, global(name)).await.unwrap();
        }
        for name in ["Delta", "Echo"] {
            create_item(&store, CatalogKind::Behavior, &caller, new_item(name)).await.unwrap();
        }
        for name in ["Foxtrot", "Golf", "Hotel"] {
            create_item(&store, CatalogKind::Behavior, &other, new_item(name)).await.unwrap();
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let query = CatalogQuery {
                page,
                limit: 2,
                ..Default::default()
            };
            let result = list_items(&store, CatalogKind::Behavior, &caller, query).await.unwrap();
            assert_eq!(result.pagination.total, 5);
            assert_eq!(result.pagination.total_pages, 3);
            seen.extend(result.items.into_iter().map(|i| i.name));
        }

        assert_eq!(seen, vec!["Alpha", "Bravo", "Charlie", "Delta", "Echo"]);
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_limit() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let query = CatalogQuery {
            limit: 500,
            ..Default::default()
        };

        let err = list_items(&store, CatalogKind::Behavior, &caller, query).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_steps_rejected_outside_programs() {
        let store = MemoryStore::new();
        let caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        let mut input = new_item("Hitting");
        input.steps = Some(Default::default());

        let err = create_item(&store, CatalogKind::Behavior, &caller, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let program = create_item(&store, CatalogKind::ReplacementProgram, &caller, new_item("FCT"))
            .await
            .unwrap();
        assert!(program.steps.is_some());
    }
}
