//! Market rates and the rates derived from them.
//!
//! A market rate is expressed in target-currency units per source-currency
//! unit. The owner and the intermediary each get a discounted rate, floored to
//! the nearest multiple of [`RATE_STEP`]:
//!
//! ```rust
//! use engine::rates::{intermediary_rate, owner_rate};
//! use rust_decimal_macros::dec;
//!
//! assert_eq!(owner_rate(dec!(15.5)), dec!(12.0));
//! assert_eq!(intermediary_rate(dec!(15.5)), dec!(11.5));
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    util::{decimal_from_column, decimal_to_column, ensure_positive},
};

/// Granularity of every derived rate.
pub const RATE_STEP: Decimal = dec!(0.5);
/// Share of the market rate granted to the capital owner.
pub const OWNER_MULTIPLIER: Decimal = dec!(0.8);
/// Share of the market rate granted to the intermediary.
pub const INTERMEDIARY_MULTIPLIER: Decimal = dec!(0.75);

/// Floor `value` to a multiple of `step`.
#[must_use]
pub fn step_floor(value: Decimal, step: Decimal) -> Decimal {
    match value.checked_div(step) {
        Some(steps) => steps.floor() * step,
        // Only whole numbers are representable this close to `Decimal::MAX`.
        None => value.floor(),
    }
}

fn discounted_rate(market: Decimal, multiplier: Decimal) -> Decimal {
    let base = market * multiplier;
    let floored = step_floor(base, RATE_STEP);
    // Never taken while RATE_STEP is 0.5: the floor remainder is always below
    // the step. Kept so rates match the ones already quoted to users.
    if base - floored > RATE_STEP {
        floored - RATE_STEP
    } else {
        floored
    }
}

/// Rate the owner's capital is valued at for a sale.
#[must_use]
pub fn owner_rate(market: Decimal) -> Decimal {
    discounted_rate(market, OWNER_MULTIPLIER)
}

/// Rate the intermediary quotes to customers.
#[must_use]
pub fn intermediary_rate(market: Decimal) -> Decimal {
    discounted_rate(market, INTERMEDIARY_MULTIPLIER)
}

/// A market rate together with the two rates derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRates {
    pub market: Decimal,
    pub owner: Decimal,
    pub intermediary: Decimal,
}

impl DerivedRates {
    pub fn from_market(market: Decimal) -> ResultEngine<Self> {
        ensure_positive(market, "market rate")?;
        Ok(Self {
            market,
            owner: owner_rate(market),
            intermediary: intermediary_rate(market),
        })
    }
}

/// One entry of the append-only market rate log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRate {
    pub id: i64,
    pub value: Decimal,
    pub recorded_at: DateTime<Utc>,
    /// User id of whoever entered the rate, or `system`.
    pub entered_by: String,
}

impl MarketRate {
    /// Derived owner/intermediary rates for this market rate.
    pub fn derived(&self) -> ResultEngine<DerivedRates> {
        DerivedRates::from_market(self.value)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "market_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub rate: String,
    pub recorded_at: DateTimeUtc,
    pub entered_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn new_entry(value: Decimal, entered_by: &str, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: ActiveValue::NotSet,
            rate: ActiveValue::Set(decimal_to_column(value)),
            recorded_at: ActiveValue::Set(recorded_at),
            entered_by: ActiveValue::Set(entered_by.to_string()),
        }
    }
}

impl TryFrom<Model> for MarketRate {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            value: decimal_from_column(&model.rate, "market rate")?,
            recorded_at: model.recorded_at,
            entered_by: model.entered_by,
        })
    }
}
