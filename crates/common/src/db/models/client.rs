//! Client entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning organization; clients are never global
    pub organization_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub first_name: String,

    #[sea_orm(column_type = "Text")]
    pub last_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub is_active: bool,

    pub created_by: Uuid,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
