//! Bulk intakes: source-currency capital converted into target-currency stock.
//!
//! Each intake creates exactly one [`InventoryLot`](crate::InventoryLot) whose
//! initial quantity is the amount received and whose unit cost is the inverse
//! of the rate applied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    util::{checked_div, checked_mul, decimal_from_column, decimal_to_column, ensure_positive},
};

/// A recorded purchase of target currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIntake {
    pub id: i64,
    pub source_amount: Decimal,
    pub rate_applied: Decimal,
    pub target_received: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    pub note: Option<String>,
}

/// Amounts of an intake computed before it is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntakeFigures {
    pub target_received: Decimal,
    pub unit_cost: Decimal,
}

impl IntakeFigures {
    /// Validate the inputs first so a zero rate never reaches the division.
    pub fn compute(source_amount: Decimal, rate_applied: Decimal) -> ResultEngine<Self> {
        ensure_positive(source_amount, "source amount")?;
        ensure_positive(rate_applied, "rate applied")?;
        Ok(Self {
            target_received: checked_mul(source_amount, rate_applied, "target received")?,
            unit_cost: checked_div(Decimal::ONE, rate_applied, "unit cost")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bulk_intakes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source_amount: String,
    pub rate_applied: String,
    pub target_received: String,
    pub recorded_at: DateTimeUtc,
    pub recorded_by: String,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::inventory::Entity")]
    InventoryLots,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn new_intake(
        source_amount: Decimal,
        rate_applied: Decimal,
        figures: IntakeFigures,
        recorded_by: &str,
        recorded_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: ActiveValue::NotSet,
            source_amount: ActiveValue::Set(decimal_to_column(source_amount)),
            rate_applied: ActiveValue::Set(decimal_to_column(rate_applied)),
            target_received: ActiveValue::Set(decimal_to_column(figures.target_received)),
            recorded_at: ActiveValue::Set(recorded_at),
            recorded_by: ActiveValue::Set(recorded_by.to_string()),
            note: ActiveValue::Set(note),
        }
    }
}

impl TryFrom<Model> for BulkIntake {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            source_amount: decimal_from_column(&model.source_amount, "source amount")?,
            rate_applied: decimal_from_column(&model.rate_applied, "rate applied")?,
            target_received: decimal_from_column(&model.target_received, "target received")?,
            recorded_at: model.recorded_at,
            recorded_by: model.recorded_by,
            note: model.note,
        })
    }
}
