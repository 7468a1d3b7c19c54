//! `SeaORM` Entity for approval_requests table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub rule_type: String,
    pub document_type: String,
    pub document_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub current_step: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub steps: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub progress: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub delegations: Json,
    pub submitted_by_kind: String,
    pub submitted_by: Option<Uuid>,
    pub submitted_at: DateTimeWithTimeZone,
    pub completed_by_kind: Option<String>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub due_at: Option<DateTimeWithTimeZone>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::approval_workflows::Entity",
        from = "Column::WorkflowId",
        to = "super::approval_workflows::Column::Id"
    )]
    ApprovalWorkflows,
    #[sea_orm(has_many = "super::approval_history::Entity")]
    ApprovalHistory,
}

impl Related<super::approval_workflows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalWorkflows.def()
    }
}

impl Related<super::approval_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
