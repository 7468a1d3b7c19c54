//! `SeaORM` Entity for fx_revaluation_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fx_revaluation_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub batch_id: Uuid,
    pub open_item_id: Uuid,
    pub account_id: Uuid,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub original_base_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 8)))")]
    pub revaluation_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub revalued_base_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub gain_loss: Decimal,
    pub tag: String,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fx_revaluation_batches::Entity",
        from = "Column::BatchId",
        to = "super::fx_revaluation_batches::Column::Id",
        on_delete = "Cascade"
    )]
    FxRevaluationBatches,
}

impl Related<super::fx_revaluation_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FxRevaluationBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
