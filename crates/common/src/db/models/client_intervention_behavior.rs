//! Link between a client's intervention and one of the same client's behaviors

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "client_intervention_behaviors")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub client_intervention_id: Uuid,

    pub client_behavior_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client_intervention::Entity",
        from = "Column::ClientInterventionId",
        to = "super::client_intervention::Column::Id",
        on_delete = "Cascade"
    )]
    Intervention,

    #[sea_orm(
        belongs_to = "super::client_behavior::Entity",
        from = "Column::ClientBehaviorId",
        to = "super::client_behavior::Column::Id",
        on_delete = "Cascade"
    )]
    Behavior,
}

impl ActiveModelBehavior for ActiveModel {}
