//! Client records and their intake aggregate
//!
//! Creating a client writes the client row, its target behaviors, replacement
//! programs and interventions, and the association rows that link programs and
//! interventions to behaviors. Associations are submitted as indices into the
//! behaviors array of the same request; they are validated and planned before
//! anything is written and resolved to stored ids once the behaviors exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Caller;
use crate::catalog::{CatalogItem, CatalogKind};
use crate::db::models::{BehaviorType, Client, ClientBehavior};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::store::Store;

/// A target behavior submitted at intake
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewClientBehavior {
    /// Catalog behavior to copy name and description from
    pub template_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0.0, message = "baseline must not be negative"))]
    pub baseline: f64,

    #[serde(default, rename = "type")]
    pub behavior_type: BehaviorType,

    #[serde(default)]
    pub topographies: Vec<String>,
}

/// A replacement program or intervention submitted at intake
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewLinkedChild {
    pub template_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    /// Positions in the request's `behaviors` array
    #[serde(default)]
    pub behavior_indices: Vec<usize>,
}

/// Intake request body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    #[validate(
        length(min = 1, max = 100, message = "firstName must be 1-100 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub first_name: String,

    #[validate(
        length(min = 1, max = 100, message = "lastName must be 1-100 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub last_name: String,

    pub notes: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub behaviors: Vec<NewClientBehavior>,

    #[serde(default)]
    #[validate(nested)]
    pub replacement_programs: Vec<NewLinkedChild>,

    #[serde(default)]
    #[validate(nested)]
    pub interventions: Vec<NewLinkedChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBehavior {
    pub name: String,
    pub description: Option<String>,
    pub baseline: f64,
    pub behavior_type: BehaviorType,
    pub topographies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChild {
    pub name: String,
    pub description: Option<String>,
    /// In range and free of duplicates
    pub behavior_indices: Vec<usize>,
}

/// Validated intake, ready to be written in one transaction
#[derive(Debug, Clone)]
pub struct AggregatePlan {
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub notes: Option<String>,
    pub behaviors: Vec<PlannedBehavior>,
    pub replacement_programs: Vec<PlannedChild>,
    pub interventions: Vec<PlannedChild>,
}

/// Map planned indices onto the ids the behaviors were stored under
pub fn resolve_links(indices: &[usize], behavior_ids: &[Uuid]) -> Vec<Uuid> {
    indices
        .iter()
        .filter_map(|index| behavior_ids.get(*index).copied())
        .collect()
}

/// A program or intervention with the behaviors it targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub behavior_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A client with all of its intake children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAggregate {
    #[serde(flatten)]
    pub client: Client,
    pub behaviors: Vec<ClientBehavior>,
    pub replacement_programs: Vec<LinkedRecord>,
    pub interventions: Vec<LinkedRecord>,
}

/// Partial update body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientPatch {
    #[validate(
        length(min = 1, max = 100, message = "firstName must be 1-100 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub first_name: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "lastName must be 1-100 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub last_name: Option<String>,

    pub notes: Option<String>,

    pub is_active: Option<bool>,
}

impl ClientPatch {
    /// Surrounding whitespace is not part of a name
    pub fn trim_names(&mut self) {
        for name in [&mut self.first_name, &mut self.last_name].into_iter().flatten() {
            *name = name.trim().to_string();
        }
    }

    pub fn apply(&self, client: &mut Client) {
        if let Some(first_name) = &self.first_name {
            client.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            client.last_name = last_name.clone();
        }
        if let Some(notes) = &self.notes {
            client.notes = Some(notes.clone());
        }
        if let Some(is_active) = self.is_active {
            client.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientListQuery {
    pub active: Option<bool>,
}

/// Check indices against the behaviors array, dropping repeats
fn plan_indices(field: &str, indices: &[usize], behavior_count: usize) -> Result<Vec<usize>> {
    let mut planned = Vec::with_capacity(indices.len());
    for index in indices {
        if *index >= behavior_count {
            return Err(AppError::validation(
                field,
                format!(
                    "behavior index {} is out of range for {} behaviors",
                    index, behavior_count
                ),
            ));
        }
        if !planned.contains(index) {
            planned.push(*index);
        }
    }
    Ok(planned)
}

/// Look up a catalog template the caller is allowed to see
async fn template(
    store: &dyn Store,
    caller: &Caller,
    kind: CatalogKind,
    field: &str,
    template_id: Uuid,
) -> Result<CatalogItem> {
    match store.find_catalog(kind, template_id).await? {
        Some(item) if item.ownership().is_visible_to(caller.organization_id) => Ok(item),
        _ => Err(AppError::validation(
            field,
            format!("{} template not found", kind.singular()),
        )),
    }
}

/// Explicit values win over the template's
async fn resolve_name(
    store: &dyn Store,
    caller: &Caller,
    kind: CatalogKind,
    field: &str,
    template_id: Option<Uuid>,
    name: Option<String>,
    description: Option<String>,
) -> Result<(String, Option<String>)> {
    let item = match template_id {
        Some(id) => Some(template(store, caller, kind, &format!("{}.templateId", field), id).await?),
        None => None,
    };

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| item.as_ref().map(|t| t.name.clone()))
        .ok_or_else(|| AppError::validation(format!("{}.name", field), "name is required"))?;
    let description = description.or_else(|| item.and_then(|t| t.description));

    Ok((name, description))
}

async fn plan_children(
    store: &dyn Store,
    caller: &Caller,
    kind: CatalogKind,
    field: &str,
    children: Vec<NewLinkedChild>,
    behavior_count: usize,
) -> Result<Vec<PlannedChild>> {
    let mut planned = Vec::with_capacity(children.len());
    for (i, child) in children.into_iter().enumerate() {
        let path = format!("{}[{}]", field, i);
        let behavior_indices = plan_indices(
            &format!("{}.behaviorIndices", path),
            &child.behavior_indices,
            behavior_count,
        )?;
        let (name, description) = resolve_name(
            store,
            caller,
            kind,
            &path,
            child.template_id,
            child.name,
            child.description,
        )
        .await?;

        planned.push(PlannedChild {
            name,
            description,
            behavior_indices,
        });
    }
    Ok(planned)
}

/// Validate an intake request and turn it into a write plan
pub async fn plan_intake(
    store: &dyn Store,
    caller: &Caller,
    request: NewClient,
) -> Result<AggregatePlan> {
    request.validate()?;

    let behavior_count = request.behaviors.len();
    let mut behaviors = Vec::with_capacity(behavior_count);
    for (i, behavior) in request.behaviors.into_iter().enumerate() {
        let (name, description) = resolve_name(
            store,
            caller,
            CatalogKind::Behavior,
            &format!("behaviors[{}]", i),
            behavior.template_id,
            behavior.name,
            behavior.description,
        )
        .await?;

        behaviors.push(PlannedBehavior {
            name,
            description,
            baseline: behavior.baseline,
            behavior_type: behavior.behavior_type,
            topographies: behavior.topographies,
        });
    }

    let replacement_programs = plan_children(
        store,
        caller,
        CatalogKind::ReplacementProgram,
        "replacementPrograms",
        request.replacement_programs,
        behavior_count,
    )
    .await?;
    let interventions = plan_children(
        store,
        caller,
        CatalogKind::Intervention,
        "interventions",
        request.interventions,
        behavior_count,
    )
    .await?;

    Ok(AggregatePlan {
        organization_id: caller.organization_id,
        created_by: caller.user_id,
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        notes: request.notes,
        behaviors,
        replacement_programs,
        interventions,
    })
}

/// Load a client the caller's organization owns
pub async fn ensure_access(store: &dyn Store, caller: &Caller, client_id: Uuid) -> Result<Client> {
    let client = store
        .find_client(client_id)
        .await?
        .ok_or_else(|| AppError::not_found("Client", client_id))?;

    if client.organization_id != caller.organization_id {
        return Err(AppError::forbidden("You do not have access to this client"));
    }

    Ok(client)
}

pub async fn create_client(
    store: &dyn Store,
    caller: &Caller,
    request: NewClient,
) -> Result<ClientAggregate> {
    let plan = plan_intake(store, caller, request).await?;
    let created = store.create_client_aggregate(plan).await?;

    metrics::record_client_created(
        created.behaviors.len(),
        created.replacement_programs.len() + created.interventions.len(),
    );
    info!(
        client_id = %created.client.id,
        organization_id = %caller.organization_id,
        behaviors = created.behaviors.len(),
        replacement_programs = created.replacement_programs.len(),
        interventions = created.interventions.len(),
        "Client created"
    );

    Ok(created)
}

pub async fn list_clients(
    store: &dyn Store,
    caller: &Caller,
    query: ClientListQuery,
) -> Result<Vec<Client>> {
    store.list_clients(caller.organization_id, query.active).await
}

pub async fn get_client(store: &dyn Store, caller: &Caller, client_id: Uuid) -> Result<ClientAggregate> {
    let client = ensure_access(store, caller, client_id).await?;
    store.load_client_aggregate(client).await
}

pub async fn update_client(
    store: &dyn Store,
    caller: &Caller,
    client_id: Uuid,
    mut patch: ClientPatch,
) -> Result<Client> {
    patch.validate()?;
    patch.trim_names();
    ensure_access(store, caller, client_id).await?;

    let updated = store
        .update_client(client_id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Client", client_id))?;

    info!(client_id = %client_id, is_active = updated.is_active, "Client updated");
    Ok(updated)
}

/// Hard delete; children, sessions and notes cascade
pub async fn delete_client(store: &dyn Store, caller: &Caller, client_id: Uuid) -> Result<()> {
    caller.require_admin()?;
    ensure_access(store, caller, client_id).await?;

    if !store.delete_client(client_id).await? {
        return Err(AppError::not_found("Client", client_id));
    }

    info!(client_id = %client_id, "Client deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_indices_rejects_out_of_range() {
        let err = plan_indices("interventions[0].behaviorIndices", &[0, 2], 2).unwrap_err();
        match err {
            AppError::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("interventions[0].behaviorIndices"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plan_indices_drops_repeats() {
        assert_eq!(plan_indices("f", &[1, 0, 1], 2).unwrap(), vec![1, 0]);
        assert!(plan_indices("f", &[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_links_follows_indices() {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        assert_eq!(resolve_links(&[2, 0], &ids), vec![ids[2], ids[0]]);
    }

    #[test]
    fn test_intake_body_parses() {
        let body: NewClient = serde_json::from_value(json!({
            "firstName": "Ana",
            "lastName": "Reyes",
            "behaviors": [
                {"name": "Elopement", "baseline": 4, "type": "frequency", "topographies": ["runs from table"]},
                {"name": "Task refusal", "baseline": 60.5, "type": "percentage"}
            ],
            "replacementPrograms": [{"name": "FCT", "behaviorIndices": [0, 1]}],
            "interventions": [{"name": "Blocking", "behaviorIndices": [0]}]
        }))
        .unwrap();

        assert!(body.validate().is_ok());
        assert_eq!(body.behaviors[1].behavior_type, BehaviorType::Percentage);
        assert_eq!(body.replacement_programs[0].behavior_indices, vec![0, 1]);
    }

    #[test]
    fn test_negative_baseline_fails_validation() {
        let body: NewClient = serde_json::from_value(json!({
            "firstName": "Ana",
            "lastName": "Reyes",
            "behaviors": [{"name": "Elopement", "baseline": -1}]
        }))
        .unwrap();

        assert!(body.validate().is_err());
    }

    #[test]
    fn test_blank_names_fail_validation() {
        let body: NewClient = serde_json::from_value(json!({
            "firstName": "   ",
            "lastName": "Reyes"
        }))
        .unwrap();
        assert!(body.validate().is_err());

        let mut patch = ClientPatch {
            last_name: Some("\t".into()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        patch.last_name = Some("  Reyes ".into());
        assert!(patch.validate().is_ok());
        patch.trim_names();
        assert_eq!(patch.last_name.as_deref(), Some("Reyes"));
    }

    #[test]
    fn test_patch_apply() {
        let now = Utc::now();
        let mut client = Client {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
            notes: None,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: now.into(),
            updated_at: now.into(),
        };

        ClientPatch {
            is_active: Some(false),
            notes: Some("moved to clinic B".into()),
            ..Default::default()
        }
        .apply(&mut client);

        assert!(!client.is_active);
        assert_eq!(client.first_name, "Ana");
        assert_eq!(client.notes.as_deref(), Some("moved to clinic B"));
    }
}
