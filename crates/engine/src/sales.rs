//! Customer transactions.
//!
//! A `CustomerTransaction` is written once, when a sale is finalized, together
//! with the [`LotUsage`](crate::LotUsage) rows that funded it. It keeps a
//! snapshot of the three rates in force so the sale can be audited after the
//! market rate moves.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, LotUsage,
    util::{decimal_from_column, decimal_to_column, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTransaction {
    pub id: Uuid,
    pub source_received: Decimal,
    pub suggested_target: Decimal,
    pub actual_target_paid: Decimal,
    pub market_rate_at_time: Decimal,
    pub owner_rate_at_time: Decimal,
    pub intermediary_rate_at_time: Decimal,
    /// Source-currency profit of the capital owner.
    pub owner_profit: Decimal,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Result of a finalized sale, as reported back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub transaction: CustomerTransaction,
    pub usages: Vec<LotUsage>,
    /// Target currency left in inventory after the sale.
    pub remaining: Decimal,
    /// `true` when `remaining` fell below the configured threshold.
    pub low_balance: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "customer_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub source_received: String,
    pub suggested_target: String,
    pub actual_target_paid: String,
    pub market_rate_at_time: String,
    pub owner_rate_at_time: String,
    pub intermediary_rate_at_time: String,
    pub owner_profit: String,
    pub recorded_at: DateTimeUtc,
    pub recorded_by: String,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::lot_usages::Entity")]
    LotUsages,
}

impl Related<super::lot_usages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LotUsages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CustomerTransaction> for ActiveModel {
    fn from(tx: &CustomerTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            source_received: ActiveValue::Set(decimal_to_column(tx.source_received)),
            suggested_target: ActiveValue::Set(decimal_to_column(tx.suggested_target)),
            actual_target_paid: ActiveValue::Set(decimal_to_column(tx.actual_target_paid)),
            market_rate_at_time: ActiveValue::Set(decimal_to_column(tx.market_rate_at_time)),
            owner_rate_at_time: ActiveValue::Set(decimal_to_column(tx.owner_rate_at_time)),
            intermediary_rate_at_time: ActiveValue::Set(decimal_to_column(
                tx.intermediary_rate_at_time,
            )),
            owner_profit: ActiveValue::Set(decimal_to_column(tx.owner_profit)),
            recorded_at: ActiveValue::Set(tx.recorded_at),
            recorded_by: ActiveValue::Set(tx.recorded_by.clone()),
            note: ActiveValue::Set(tx.note.clone()),
        }
    }
}

impl TryFrom<Model> for CustomerTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            source_received: decimal_from_column(&model.source_received, "source received")?,
            suggested_target: decimal_from_column(&model.suggested_target, "suggested target")?,
            actual_target_paid: decimal_from_column(&model.actual_target_paid, "target paid")?,
            market_rate_at_time: decimal_from_column(&model.market_rate_at_time, "market rate")?,
            owner_rate_at_time: decimal_from_column(&model.owner_rate_at_time, "owner rate")?,
            intermediary_rate_at_time: decimal_from_column(
                &model.intermediary_rate_at_time,
                "intermediary rate",
            )?,
            owner_profit: decimal_from_column(&model.owner_profit, "owner profit")?,
            recorded_by: model.recorded_by,
            recorded_at: model.recorded_at,
            note: model.note,
        })
    }
}
