//! Therapy session entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Draft,
    Submitted,
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Draft => "draft".to_string(),
            SessionStatus::Submitted => "submitted".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "therapy_sessions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub client_id: Uuid,

    /// Therapist who recorded the session
    pub user_id: Uuid,

    pub session_date: Date,

    /// Free-text clock strings as entered
    #[sea_orm(column_type = "Text")]
    pub start_time: String,

    #[sea_orm(column_type = "Text")]
    pub end_time: String,

    #[sea_orm(column_type = "Text")]
    pub location: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// The submitted form, stored verbatim
    #[sea_orm(column_type = "JsonBinary")]
    pub form_data: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
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
