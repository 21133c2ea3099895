//! Read-only summaries over the ledger and the transaction log.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, InventoryLedger};

/// Snapshot of the stock on hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_remaining: Decimal,
    /// Source-currency cost basis of the remaining stock.
    pub total_value: Decimal,
    /// Target units per source unit, `None` when nothing is left.
    pub average_rate: Option<Decimal>,
    pub open_lots: usize,
}

impl TryFrom<&InventoryLedger> for InventorySummary {
    type Error = EngineError;

    fn try_from(ledger: &InventoryLedger) -> Result<Self, Self::Error> {
        Ok(Self {
            total_remaining: ledger.total_remaining()?,
            total_value: ledger.total_value()?,
            average_rate: ledger.average_rate()?,
            open_lots: ledger.lots().iter().filter(|lot| !lot.is_depleted()).count(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitSummary {
    pub total_owner_profit: Decimal,
    pub transactions: u64,
}
