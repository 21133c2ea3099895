//! Command structs for engine operations.
//!
//! These types group parameters for write operations (intakes and sales),
//! keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DerivedRates, ResultEngine, util::checked_mul};

/// Rate used to convert a bulk intake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntakeRate {
    /// An explicit rate negotiated for this transfer.
    Fixed(Decimal),
    /// Whatever market rate was recorded last.
    Current,
}

/// Record a bulk intake.
#[derive(Clone, Debug)]
pub struct RecordIntakeCmd {
    pub source_amount: Decimal,
    pub rate: IntakeRate,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl RecordIntakeCmd {
    #[must_use]
    pub fn new(
        source_amount: Decimal,
        rate: IntakeRate,
        recorded_by: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_amount,
            rate,
            recorded_by: recorded_by.into(),
            recorded_at,
            note: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Figures shown to the intermediary before the payout is confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleQuote {
    pub source_received: Decimal,
    pub rates: DerivedRates,
    /// Target amount suggested to the customer at the intermediary rate.
    pub suggested: Decimal,
    /// Ceiling of what may be paid out, at the owner rate.
    pub owner_share: Decimal,
}

impl SaleQuote {
    pub fn new(source_received: Decimal, rates: DerivedRates) -> ResultEngine<Self> {
        Ok(Self {
            source_received,
            rates,
            suggested: checked_mul(source_received, rates.intermediary, "suggested target")?,
            owner_share: checked_mul(source_received, rates.owner, "owner share")?,
        })
    }

    /// Finalize with the suggested payout.
    #[must_use]
    pub fn accept(
        self,
        recorded_by: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> FinalizeSaleCmd {
        let suggested = self.suggested;
        self.into_finalize(suggested, recorded_by, recorded_at)
    }

    /// Finalize with a payout negotiated by the intermediary.
    #[must_use]
    pub fn into_finalize(
        self,
        actual_target_paid: Decimal,
        recorded_by: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> FinalizeSaleCmd {
        FinalizeSaleCmd {
            source_received: self.source_received,
            actual_target_paid,
            suggested_target: self.suggested,
            rates: self.rates,
            recorded_by: recorded_by.into(),
            recorded_at,
            note: None,
        }
    }
}

/// Finalize a sale once every input has been collected.
#[derive(Clone, Debug)]
pub struct FinalizeSaleCmd {
    pub source_received: Decimal,
    pub actual_target_paid: Decimal,
    pub suggested_target: Decimal,
    /// Rate snapshot taken when the sale was quoted.
    pub rates: DerivedRates,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl FinalizeSaleCmd {
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Target-currency amount the owner's capital covers for this sale.
    pub fn owner_share(&self) -> ResultEngine<Decimal> {
        checked_mul(self.source_received, self.rates.owner, "owner share")
    }
}
