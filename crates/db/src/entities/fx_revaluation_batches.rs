//! `SeaORM` Entity for fx_revaluation_batches table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fx_revaluation_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: String,
    pub batch_key: String,
    pub revaluation_date: Date,
    pub method: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub scope: Json,
    pub fiscal_period_id: Uuid,
    pub base_currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_gain_loss: Decimal,
    pub status: String,
    pub journal_entry_id: Option<Uuid>,
    pub created_by_kind: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::fx_revaluation_entries::Entity")]
    FxRevaluationEntries,
}

impl Related<super::fx_revaluation_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FxRevaluationEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
