//! Narrative notes for a therapy session

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_notes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub session_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Set when the content came from the narrative generator
    pub is_generated: bool,

    /// Model name, token usage and reasoning as reported by the generator
    #[sea_orm(column_type = "JsonBinary")]
    pub generation_metadata: Json,

    pub created_by: Uuid,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::therapy_session::Entity",
        from = "Column::SessionId",
        to = "super::therapy_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::therapy_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
