//! `SeaORM` Entity for open_items table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "open_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub source_entry_id: Uuid,
    pub source_line_id: Uuid,
    pub subledger_kind: String,
    pub subledger_reference: String,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 8)))")]
    pub original_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub original_base_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub carrying_base_amount: Decimal,
    pub opened_on: Date,
    pub settled_at: Option<DateTimeWithTimeZone>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
