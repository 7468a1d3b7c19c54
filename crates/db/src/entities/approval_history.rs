//! `SeaORM` Entity for approval_history table (append-only).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub request_id: Uuid,
    pub step: i32,
    pub actor_kind: String,
    pub actor_id: Option<Uuid>,
    pub action: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub previous: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub new: Json,
    pub delegate_to: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::approval_requests::Entity",
        from = "Column::RequestId",
        to = "super::approval_requests::Column::Id"
    )]
    ApprovalRequests,
}

impl Related<super::approval_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
