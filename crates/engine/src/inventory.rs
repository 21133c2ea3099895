//! The module contains the lot-based inventory ledger.
//!
//! Target-currency stock is held in [`InventoryLot`]s, one per bulk intake.
//! Lots form an append-only arena ordered by their monotonic id and are never
//! removed: a depleted lot stays around with a zero remaining quantity so
//! past sales can still be traced back to their cost basis.
//!
//! Sales consume lots oldest first (FIFO):
//!
//! ```rust
//! use engine::InventoryLedger;
//! use rust_decimal_macros::dec;
//!
//! let mut ledger = InventoryLedger::default();
//! ledger.add_lot(1, dec!(100), dec!(0.10)).unwrap();
//! ledger.add_lot(2, dec!(100), dec!(0.20)).unwrap();
//!
//! let deduction = ledger.deduct(dec!(150)).unwrap();
//! assert_eq!(deduction.total_cost, dec!(20));
//! assert_eq!(ledger.total_remaining().unwrap(), dec!(50));
//! ```

use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    util::{
        checked_add, checked_div, checked_mul, checked_sum, decimal_from_column,
        decimal_to_column, ensure_positive,
    },
};

/// A batch of target currency bought at a single cost basis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    pub id: i64,
    pub bulk_intake_id: i64,
    pub remaining_quantity: Decimal,
    /// Source-currency cost of one target-currency unit.
    pub unit_cost: Decimal,
}

impl InventoryLot {
    /// Check the quantity/cost of a lot about to be created.
    pub fn validate_new(quantity: Decimal, unit_cost: Decimal) -> ResultEngine<()> {
        ensure_positive(quantity, "lot quantity")?;
        ensure_positive(unit_cost, "lot unit cost")
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_quantity <= Decimal::ZERO
    }

    /// Source-currency value of what is left in this lot.
    pub fn remaining_value(&self) -> ResultEngine<Decimal> {
        checked_mul(self.remaining_quantity, self.unit_cost, "lot value")
    }
}

/// Quantity taken from a single lot by a deduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: i64,
    pub quantity_used: Decimal,
    pub unit_cost: Decimal,
}

impl LotDraw {
    pub fn cost(&self) -> ResultEngine<Decimal> {
        checked_mul(self.quantity_used, self.unit_cost, "lot draw cost")
    }
}

/// Outcome of a FIFO deduction: the lots touched, oldest first, and the
/// source-currency cost of everything taken.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub usages: Vec<LotDraw>,
    pub total_cost: Decimal,
}

impl Deduction {
    /// Total target-currency quantity taken. Never above the amount that
    /// was requested, so it cannot overflow.
    pub fn quantity(&self) -> Decimal {
        self.usages.iter().map(|u| u.quantity_used).sum()
    }
}

/// Ordered collection of lots serving FIFO deductions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryLedger {
    lots: Vec<InventoryLot>,
}

impl InventoryLedger {
    /// Build a ledger from stored lots. Lots are ordered by id, so the result
    /// does not depend on the order the store returned them in.
    pub fn from_lots(mut lots: Vec<InventoryLot>) -> Self {
        lots.sort_by_key(|lot| lot.id);
        Self { lots }
    }

    pub fn lots(&self) -> &[InventoryLot] {
        &self.lots
    }

    pub fn lot(&self, id: i64) -> Option<&InventoryLot> {
        self.lots.iter().find(|lot| lot.id == id)
    }

    pub fn total_remaining(&self) -> ResultEngine<Decimal> {
        checked_sum(
            self.lots.iter().map(|lot| lot.remaining_quantity),
            "inventory total",
        )
    }

    /// Source-currency value of the stock still available.
    pub fn total_value(&self) -> ResultEngine<Decimal> {
        self.lots
            .iter()
            .filter(|lot| !lot.is_depleted())
            .try_fold(Decimal::ZERO, |acc, lot| {
                checked_add(acc, lot.remaining_value()?, "inventory value")
            })
    }

    /// Average target units held per source unit invested, `None` when the
    /// ledger is empty.
    pub fn average_rate(&self) -> ResultEngine<Option<Decimal>> {
        let value = self.total_value()?;
        if value.is_zero() {
            return Ok(None);
        }
        checked_div(self.total_remaining()?, value, "average rate").map(Some)
    }

    /// Append a new, full lot. Ids continue after the newest lot.
    pub fn add_lot(
        &mut self,
        bulk_intake_id: i64,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> ResultEngine<&InventoryLot> {
        InventoryLot::validate_new(quantity, unit_cost)?;
        let id = self.lots.last().map_or(1, |lot| lot.id + 1);
        self.lots.push(InventoryLot {
            id,
            bulk_intake_id,
            remaining_quantity: quantity,
            unit_cost,
        });
        Ok(&self.lots[self.lots.len() - 1])
    }

    /// Work out which lots would fund `amount` without touching them.
    pub fn plan_deduction(&self, amount: Decimal) -> ResultEngine<Deduction> {
        ensure_positive(amount, "deduction amount")?;

        let available = self.total_remaining()?;
        if available < amount {
            return Err(EngineError::InsufficientInventory {
                requested: amount,
                available,
            });
        }

        let mut deduction = Deduction::default();
        let mut still_needed = amount;
        for lot in self.lots.iter().filter(|lot| !lot.is_depleted()) {
            if still_needed <= Decimal::ZERO {
                break;
            }
            let take = lot.remaining_quantity.min(still_needed);
            let draw = LotDraw {
                lot_id: lot.id,
                quantity_used: take,
                unit_cost: lot.unit_cost,
            };
            deduction.total_cost =
                checked_add(deduction.total_cost, draw.cost()?, "deduction cost")?;
            deduction.usages.push(draw);
            still_needed -= take;
        }

        Ok(deduction)
    }

    /// Consume `amount` from the oldest lots first.
    ///
    /// Either the whole amount is taken or, on error, no lot is modified.
    pub fn deduct(&mut self, amount: Decimal) -> ResultEngine<Deduction> {
        let deduction = self.plan_deduction(amount)?;
        for draw in &deduction.usages {
            if let Some(lot) = self.lots.iter_mut().find(|lot| lot.id == draw.lot_id) {
                lot.remaining_quantity -= draw.quantity_used;
            }
        }
        tracing::debug!(
            %amount,
            lots = deduction.usages.len(),
            total_cost = %deduction.total_cost,
            "fifo deduction"
        );
        Ok(deduction)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "inventory_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bulk_intake_id: i64,
    pub remaining_quantity: String,
    pub unit_cost: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::intakes::Entity",
        from = "Column::BulkIntakeId",
        to = "super::intakes::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    BulkIntakes,
    #[sea_orm(has_many = "super::lot_usages::Entity")]
    LotUsages,
}

impl Related<super::intakes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BulkIntakes.def()
    }
}

impl Related<super::lot_usages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LotUsages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn new_lot(bulk_intake_id: i64, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            id: ActiveValue::NotSet,
            bulk_intake_id: ActiveValue::Set(bulk_intake_id),
            remaining_quantity: ActiveValue::Set(decimal_to_column(quantity)),
            unit_cost: ActiveValue::Set(decimal_to_column(unit_cost)),
        }
    }

    pub(crate) fn remaining(lot: &InventoryLot) -> Self {
        Self {
            id: ActiveValue::Set(lot.id),
            remaining_quantity: ActiveValue::Set(decimal_to_column(lot.remaining_quantity)),
            ..Default::default()
        }
    }
}

impl TryFrom<Model> for InventoryLot {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            bulk_intake_id: model.bulk_intake_id,
            remaining_quantity: decimal_from_column(&model.remaining_quantity, "lot quantity")?,
            unit_cost: decimal_from_column(&model.unit_cost, "lot unit cost")?,
        })
    }
}
