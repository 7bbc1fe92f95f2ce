//! Flattened antecedent/behavior/consequence row derived from a session form

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_abcs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub session_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub antecedent: String,

    #[sea_orm(column_type = "Text")]
    pub behavior: String,

    #[sea_orm(column_type = "Text")]
    pub consequence: String,

    /// 1-based position of the entry in the form
    pub sequence_order: i32,

    pub created_at: DateTimeWithTimeZone,
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
