//! Target behavior recorded for one client

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a behavior is measured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorType {
    #[default]
    Frequency,
    Percentage,
}

impl From<BehaviorType> for String {
    fn from(kind: BehaviorType) -> Self {
        match kind {
            BehaviorType::Frequency => "frequency".to_string(),
            BehaviorType::Percentage => "percentage".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "client_behaviors")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub client_id: Uuid,

    /// Copied from the catalog at intake, not a live reference
    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub baseline: f64,

    #[sea_orm(column_type = "Text")]
    #[serde(rename = "type")]
    pub behavior_type: String,

    /// Ordered list of topography descriptions
    #[sea_orm(column_type = "JsonBinary")]
    pub topographies: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id",
        on_delete = "Cascade"
    )]
    Client,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
