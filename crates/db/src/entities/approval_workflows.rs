//! `SeaORM` Entity for approval_workflows table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_workflows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub document_type: String,
    pub rule_type: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub min_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub max_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub expiry_hours: Option<i32>,
    #[sea_orm(column_type = "JsonBinary")]
    pub steps: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::approval_requests::Entity")]
    ApprovalRequests,
}

impl Related<super::approval_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
