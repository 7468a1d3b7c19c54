//! `SeaORM` Entity for journal_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sub_scope_id: Option<Uuid>,
    pub fiscal_period_id: Uuid,
    pub entry_date: Date,
    pub kind: String,
    pub source_module: String,
    pub source_document: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub currency: String,
    pub base_currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 8)))")]
    pub exchange_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_credit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_base_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_base_credit: Decimal,
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_reason: Option<String>,
    pub reverses_entry_id: Option<Uuid>,
    pub reversed_by_entry_id: Option<Uuid>,
    pub approval_request_id: Option<Uuid>,
    pub version: i64,
    pub created_by_kind: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_by_kind: String,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTimeWithTimeZone,
    pub posted_by_kind: Option<String>,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
