//! Junction between customer transactions and the lots that funded them.

use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, LotDraw, ResultEngine,
    util::{checked_mul, decimal_from_column, decimal_to_column, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotUsage {
    pub transaction_id: Uuid,
    pub lot_id: i64,
    pub quantity_used: Decimal,
    pub unit_cost: Decimal,
}

impl LotUsage {
    pub fn from_draw(transaction_id: Uuid, draw: &LotDraw) -> Self {
        Self {
            transaction_id,
            lot_id: draw.lot_id,
            quantity_used: draw.quantity_used,
            unit_cost: draw.unit_cost,
        }
    }

    pub fn cost(&self) -> ResultEngine<Decimal> {
        checked_mul(self.quantity_used, self.unit_cost, "lot usage cost")
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "lot_usages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub lot_id: i64,
    pub quantity_used: String,
    pub unit_cost: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sales::Entity",
        from = "Column::TransactionId",
        to = "super::sales::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transactions,
    #[sea_orm(
        belongs_to = "super::inventory::Entity",
        from = "Column::LotId",
        to = "super::inventory::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    InventoryLots,
}

impl Related<super::sales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LotUsage> for ActiveModel {
    fn from(usage: &LotUsage) -> Self {
        Self {
            transaction_id: ActiveValue::Set(usage.transaction_id.to_string()),
            lot_id: ActiveValue::Set(usage.lot_id),
            quantity_used: ActiveValue::Set(decimal_to_column(usage.quantity_used)),
            unit_cost: ActiveValue::Set(decimal_to_column(usage.unit_cost)),
        }
    }
}

impl TryFrom<Model> for LotUsage {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            lot_id: model.lot_id,
            quantity_used: decimal_from_column(&model.quantity_used, "quantity used")?,
            unit_cost: decimal_from_column(&model.unit_cost, "unit cost")?,
        })
    }
}
