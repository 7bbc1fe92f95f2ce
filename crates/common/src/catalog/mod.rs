//! Shared catalog of antecedents, behaviors, interventions and replacement
//! programs.
//!
//! All four kinds have the same shape and the same access rules: rows are
//! either global defaults or owned by one organization (see [`scope`]).

mod scope;
mod service;
mod steps;

pub use scope::{like_pattern, visibility_sql, Mutation, Ownership, OwnershipViolation};
pub use service::{create_item, delete_item, get_item, list_items, update_item};
pub use steps::{ProgramStep, ProgramSteps};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, Result};

/// The four catalog resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Antecedent,
    Behavior,
    Intervention,
    ReplacementProgram,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 4] = [
        CatalogKind::Antecedent,
        CatalogKind::Behavior,
        CatalogKind::Intervention,
        CatalogKind::ReplacementProgram,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Antecedent => "antecedents",
            CatalogKind::Behavior => "behaviors",
            CatalogKind::Intervention => "interventions",
            CatalogKind::ReplacementProgram => "replacement_programs",
        }
    }

    /// URL segment under `/api`
    pub fn path_segment(&self) -> &'static str {
        match self {
            CatalogKind::ReplacementProgram => "replacement-programs",
            other => other.table(),
        }
    }

    /// Name used in not-found messages
    pub fn singular(&self) -> &'static str {
        match self {
            CatalogKind::Antecedent => "Antecedent",
            CatalogKind::Behavior => "Behavior",
            CatalogKind::Intervention => "Intervention",
            CatalogKind::ReplacementProgram => "Replacement program",
        }
    }

    /// Name used in ownership messages
    pub fn plural(&self) -> &'static str {
        match self {
            CatalogKind::Antecedent => "antecedents",
            CatalogKind::Behavior => "behaviors",
            CatalogKind::Intervention => "interventions",
            CatalogKind::ReplacementProgram => "replacement programs",
        }
    }

    pub fn has_steps(&self) -> bool {
        matches!(self, CatalogKind::ReplacementProgram)
    }
}

/// A catalog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// `None` marks a global default
    pub organization_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<ProgramSteps>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn ownership(&self) -> Ownership {
        Ownership::from_column(self.organization_id)
    }
}

const CATEGORY_MAX: usize = 100;

/// Create request body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCatalogItem {
    #[validate(
        length(min = 1, max = 255, message = "name must be 1-255 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub name: String,

    pub description: Option<String>,

    #[validate(length(max = 100, message = "category must be at most 100 characters"))]
    pub category: Option<String>,

    #[serde(default)]
    pub steps: Option<ProgramSteps>,
}

/// Partial update body. Fields left out keep their value; ownership is not
/// part of the patch and cannot be changed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPatch {
    #[validate(
        length(min = 1, max = 255, message = "name must be 1-255 characters"),
        custom(function = "crate::api::non_blank")
    )]
    pub name: Option<String>,

    /// `Some(None)` clears the column
    #[serde(default, deserialize_with = "crate::api::nullable")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "crate::api::nullable")]
    pub category: Option<Option<String>>,

    pub steps: Option<ProgramSteps>,
}

impl CatalogPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.steps.is_none()
    }

    /// Field rules the derive cannot express on a clearable column
    pub fn check_category(&self) -> Result<()> {
        match &self.category {
            Some(Some(category)) if category.chars().count() > CATEGORY_MAX => Err(
                AppError::validation("category", "category must be at most 100 characters"),
            ),
            _ => Ok(()),
        }
    }

    /// Surrounding whitespace is not part of a name
    pub fn trim_name(&mut self) {
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
        }
    }

    /// Apply to an in-memory row
    pub fn apply(&self, item: &mut CatalogItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(steps) = &self.steps {
            item.steps = Some(steps.clone());
        }
    }
}

/// Sortable columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Name,
    Category,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Category => "category",
            SortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

fn default_page() -> u64 { 1 }
fn default_limit() -> u64 { 10 }

/// List query string
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CatalogQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u64,

    pub search: Option<String>,

    pub category: Option<String>,

    #[serde(default)]
    pub sort: SortField,

    #[serde(default)]
    pub order: SortOrder,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            category: None,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

impl CatalogQuery {
    /// Search term with surrounding whitespace removed; blank means no search
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-process form of the search and category filters
    pub fn matches(&self, item: &CatalogItem) -> bool {
        let search_ok = self
            .search_term()
            .map(|term| item.name.to_lowercase().contains(&term.to_lowercase()))
            .unwrap_or(true);
        let category_ok = self
            .category_filter()
            .map(|category| item.category.as_deref() == Some(category))
            .unwrap_or(true);

        search_ok && category_ok
    }
}

/// Steps are only meaningful on replacement programs
fn check_steps_allowed(kind: CatalogKind, steps: Option<&ProgramSteps>) -> Result<()> {
    if steps.is_some() && !kind.has_steps() {
        return Err(AppError::validation(
            "steps",
            format!("{} do not have steps", kind.plural()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: Option<&str>) -> CatalogItem {
        let now = Utc::now();
        CatalogItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category: category.map(String::from),
            organization_id: None,
            steps: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_query_defaults() {
        let query: CatalogQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort, SortField::Name);
        assert_eq!(query.order, SortOrder::Asc);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_query_limit_bounds() {
        let query = CatalogQuery { limit: 101, ..Default::default() };
        assert!(query.validate().is_err());
        let query = CatalogQuery { page: 0, ..Default::default() };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_sort_field_parses_camel_case() {
        let query: CatalogQuery =
            serde_json::from_value(serde_json::json!({"sort": "createdAt", "order": "desc"})).unwrap();
        assert_eq!(query.sort.column(), "created_at");
        assert_eq!(query.order.keyword(), "DESC");
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let query = CatalogQuery {
            search: Some("  BANG ".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&item("Head banging", None)));
        assert!(!query.matches(&item("Elopement", None)));
    }

    #[test]
    fn test_category_filter_is_exact() {
        let query = CatalogQuery {
            category: Some("Self-injury".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&item("Head banging", Some("Self-injury"))));
        assert!(!query.matches(&item("Head banging", Some("Aggression"))));
        assert!(!query.matches(&item("Head banging", None)));
    }

    #[test]
    fn test_patch_ignores_ownership_fields() {
        let patch: CatalogPatch = serde_json::from_value(serde_json::json!({
            "name": "Renamed",
            "organizationId": Uuid::new_v4(),
        }))
        .unwrap();

        let mut row = item("Original", None);
        patch.apply(&mut row);
        assert_eq!(row.name, "Renamed");
        assert_eq!(row.organization_id, None);
    }

    #[test]
    fn test_patch_null_clears_but_absent_keeps() {
        let mut row = item("Head banging", Some("Self-injury"));
        row.description = Some("Hitting head on surfaces".to_string());

        let keep: CatalogPatch =
            serde_json::from_value(serde_json::json!({ "name": "Head hitting" })).unwrap();
        keep.apply(&mut row);
        assert_eq!(row.category.as_deref(), Some("Self-injury"));
        assert!(row.description.is_some());

        let clear: CatalogPatch = serde_json::from_value(serde_json::json!({
            "description": null,
            "category": null,
        }))
        .unwrap();
        assert!(!clear.is_empty());
        clear.apply(&mut row);
        assert_eq!(row.description, None);
        assert_eq!(row.category, None);
        assert_eq!(row.name, "Head hitting");
    }

    #[test]
    fn test_blank_names_fail_validation() {
        let input = NewCatalogItem {
            name: "   ".to_string(),
            description: None,
            category: None,
            steps: None,
        };
        assert!(input.validate().is_err());

        let patch = CatalogPatch {
            name: Some(" \t".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_patch_category_length() {
        let patch = CatalogPatch {
            category: Some(Some("x".repeat(101))),
            ..Default::default()
        };
        assert!(patch.check_category().is_err());

        let clear = CatalogPatch {
            category: Some(None),
            ..Default::default()
        };
        assert!(clear.check_category().is_ok());
    }

    #[test]
    fn test_steps_only_on_programs() {
        let steps = ProgramSteps::new();
        assert!(check_steps_allowed(CatalogKind::ReplacementProgram, Some(&steps)).is_ok());
        assert!(check_steps_allowed(CatalogKind::Behavior, Some(&steps)).is_err());
        assert!(check_steps_allowed(CatalogKind::Behavior, None).is_ok());
    }

    #[test]
    fn test_path_segments() {
        let segments: Vec<_> = CatalogKind::ALL.iter().map(|k| k.path_segment()).collect();
        assert_eq!(
            segments,
            vec!["antecedents", "behaviors", "interventions", "replacement-programs"]
        );
    }
}
