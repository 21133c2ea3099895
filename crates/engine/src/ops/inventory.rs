use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Deduction, EngineError, InventoryLedger, InventoryLot, InventorySummary, ResultEngine,
    inventory,
};

use super::{Engine, with_tx};

impl Engine {
    /// Every lot, depleted ones included, oldest first.
    pub async fn inventory_ledger(&self) -> ResultEngine<InventoryLedger> {
        with_tx!(self, |db_tx| self.load_ledger(&db_tx).await)
    }

    /// Totals used for the inventory report.
    pub async fn inventory_summary(&self) -> ResultEngine<InventorySummary> {
        let ledger = self.inventory_ledger().await?;
        InventorySummary::try_from(&ledger)
    }

    /// Deduct `amount` from the inventory, oldest lots first, outside of a
    /// sale (e.g. a write-off).
    ///
    /// The lots are read and updated inside one transaction under the write
    /// lock: on `InsufficientInventory` nothing is written.
    pub async fn deduct_inventory(&self, amount: Decimal) -> ResultEngine<Deduction> {
        let _guard = self.write_lock.lock().await;
        with_tx!(self, |db_tx| {
            let mut ledger = self.load_ledger(&db_tx).await?;
            let deduction = ledger.deduct(amount)?;
            self.persist_deduction(&db_tx, &ledger, &deduction).await?;
            Ok(deduction)
        })
    }

    pub(super) async fn load_ledger(
        &self,
        db_tx: &DatabaseTransaction,
    ) -> ResultEngine<InventoryLedger> {
        let lots = inventory::Entity::find()
            .order_by_asc(inventory::Column::Id)
            .all(db_tx)
            .await?
            .into_iter()
            .map(InventoryLot::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(InventoryLedger::from_lots(lots))
    }

    /// Write back the remaining quantity of every lot touched by `deduction`.
    pub(super) async fn persist_deduction(
        &self,
        db_tx: &DatabaseTransaction,
        ledger: &InventoryLedger,
        deduction: &Deduction,
    ) -> ResultEngine<()> {
        for draw in &deduction.usages {
            let lot = ledger
                .lot(draw.lot_id)
                .ok_or_else(|| EngineError::KeyNotFound(format!("lot {}", draw.lot_id)))?;
            inventory::ActiveModel::remaining(lot).update(db_tx).await?;
        }
        Ok(())
    }
}
