//! Ownership of catalog rows and the visibility rule shared by every query site.
//!
//! A catalog row with no organization is global: every tenant can read it and
//! no tenant can change it. A row owned by an organization is readable and
//! mutable by that organization only.

use uuid::Uuid;

use super::CatalogKind;
use crate::errors::AppError;

/// Who a catalog row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Global,
    Owned(Uuid),
}

/// Which write is being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Update,
    Delete,
}

/// Why a write against a catalog row was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipViolation {
    /// The row is a shared default
    GlobalResource,
    /// The row belongs to another organization
    OtherOrganization,
}

impl Ownership {
    pub fn from_column(organization_id: Option<Uuid>) -> Self {
        match organization_id {
            Some(org) => Ownership::Owned(org),
            None => Ownership::Global,
        }
    }

    /// Visibility rule, in-process form of [`visibility_sql`]
    pub fn is_visible_to(&self, organization_id: Uuid) -> bool {
        match self {
            Ownership::Global => true,
            Ownership::Owned(owner) => *owner == organization_id,
        }
    }

    /// Writes require a non-global row owned by the caller's organization
    pub fn check_mutation(&self, organization_id: Uuid) -> Result<(), OwnershipViolation> {
        match self {
            Ownership::Global => Err(OwnershipViolation::GlobalResource),
            Ownership::Owned(owner) if *owner == organization_id => Ok(()),
            Ownership::Owned(_) => Err(OwnershipViolation::OtherOrganization),
        }
    }
}

impl OwnershipViolation {
    /// Caller-facing error; the two violations keep distinct messages
    pub fn into_error(self, kind: CatalogKind, mutation: Mutation) -> AppError {
        let plural = kind.plural();
        let message = match (self, mutation) {
            (OwnershipViolation::GlobalResource, Mutation::Update) => {
                format!("Global {} cannot be modified", plural)
            }
            (OwnershipViolation::GlobalResource, Mutation::Delete) => {
                format!("Global {} cannot be deleted", plural)
            }
            (OwnershipViolation::OtherOrganization, Mutation::Update) => {
                format!("You can only edit {} that belong to your organization", plural)
            }
            (OwnershipViolation::OtherOrganization, Mutation::Delete) => {
                format!("You can only delete {} that belong to your organization", plural)
            }
        };

        AppError::forbidden(message)
    }
}

/// SQL form of the visibility rule. The list query and the count query must
/// both be built from this so totals match the visible rows.
pub fn visibility_sql(column: &str, placeholder: usize) -> String {
    format!("({column} IS NULL OR {column} = ${placeholder})")
}

/// Escape a user search term for use in an `ILIKE ... ESCAPE '\'` pattern
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
