use rust_decimal::Decimal;
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CustomerTransaction, EngineError, FinalizeSaleCmd, LotUsage, Notification, ResultEngine,
    SaleQuote, SaleReceipt, lot_usages, sales,
    util::{ensure_non_negative, ensure_positive, normalize_optional_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Quote a sale at the latest market rate.
    ///
    /// The quote carries the rate snapshot that [`Engine::finalize_sale`]
    /// records, so a rate change between quoting and finalizing does not
    /// alter the sale. Markets low enough for a derived rate to floor to
    /// zero are rejected here, as finalizing would be.
    pub async fn quote_sale(&self, source_received: Decimal) -> ResultEngine<SaleQuote> {
        ensure_positive(source_received, "source amount received")?;
        let rates = self.current_rates().await?;
        ensure_positive(rates.owner, "owner rate")?;
        ensure_positive(rates.intermediary, "intermediary rate")?;
        SaleQuote::new(source_received, rates)
    }

    /// Finalize a sale.
    ///
    /// The owner's share (`source_received * owner rate`) is deducted from
    /// the inventory, oldest lots first, and the owner's profit is the amount
    /// received minus the cost basis of what was deducted.
    ///
    /// Fails with:
    /// - `InvalidAmount` for non-positive amounts or rates
    /// - `ExceedsOwnerShare` when the payout is above the owner's share
    /// - `InsufficientInventory` when the lots cannot cover the owner's share
    /// - `NegativeProfit` when the deducted lots cost more than was received
    ///
    /// Checks, deduction and inserts run in a single DB transaction under the
    /// write lock: on any error the ledger and the log are left untouched.
    pub async fn finalize_sale(&self, cmd: FinalizeSaleCmd) -> ResultEngine<SaleReceipt> {
        ensure_positive(cmd.source_received, "source amount received")?;
        ensure_non_negative(cmd.actual_target_paid, "target amount paid")?;
        ensure_non_negative(cmd.suggested_target, "suggested target amount")?;
        ensure_positive(cmd.rates.market, "market rate")?;
        ensure_positive(cmd.rates.owner, "owner rate")?;
        ensure_positive(cmd.rates.intermediary, "intermediary rate")?;

        let owner_share = cmd.owner_share()?;
        if cmd.actual_target_paid > owner_share {
            return Err(EngineError::ExceedsOwnerShare {
                paid: cmd.actual_target_paid,
                owner_share,
            });
        }

        let receipt = {
            let _guard = self.write_lock.lock().await;
            self.commit_sale(&cmd, owner_share).await?
        };

        tracing::info!(
            transaction_id = %receipt.transaction.id,
            source_received = %receipt.transaction.source_received,
            paid = %receipt.transaction.actual_target_paid,
            owner_profit = %receipt.transaction.owner_profit,
            remaining = %receipt.remaining,
            "sale finalized"
        );

        if self
            .owner_id
            .as_deref()
            .is_some_and(|owner| owner != receipt.transaction.recorded_by)
        {
            self.notify(Notification::SaleRecorded {
                recorded_by: receipt.transaction.recorded_by.clone(),
                source_received: receipt.transaction.source_received,
                actual_paid: receipt.transaction.actual_target_paid,
                suggested: receipt.transaction.suggested_target,
                owner_profit: receipt.transaction.owner_profit,
                remaining: receipt.remaining,
            });
        }
        if receipt.low_balance {
            self.notify(Notification::LowBalance {
                remaining: receipt.remaining,
                threshold: self.low_balance_threshold,
            });
        }

        Ok(receipt)
    }

    /// Steps of a sale that must happen atomically. Callers hold the write lock.
    async fn commit_sale(
        &self,
        cmd: &FinalizeSaleCmd,
        owner_share: Decimal,
    ) -> ResultEngine<SaleReceipt> {
        with_tx!(self, |db_tx| {
            let mut ledger = self.load_ledger(&db_tx).await?;
            let available = ledger.total_remaining()?;
            if available < owner_share {
                return Err(EngineError::InsufficientInventory {
                    requested: owner_share,
                    available,
                });
            }

            let deduction = ledger.deduct(owner_share)?;
            let owner_profit = cmd.source_received - deduction.total_cost;
            if owner_profit < Decimal::ZERO {
                return Err(EngineError::NegativeProfit(owner_profit));
            }
            self.persist_deduction(&db_tx, &ledger, &deduction).await?;

            let transaction = CustomerTransaction {
                id: Uuid::new_v4(),
                source_received: cmd.source_received,
                suggested_target: cmd.suggested_target,
                actual_target_paid: cmd.actual_target_paid,
                market_rate_at_time: cmd.rates.market,
                owner_rate_at_time: cmd.rates.owner,
                intermediary_rate_at_time: cmd.rates.intermediary,
                owner_profit,
                recorded_by: cmd.recorded_by.clone(),
                recorded_at: cmd.recorded_at,
                note: normalize_optional_text(cmd.note.as_deref()),
            };
            sales::ActiveModel::from(&transaction).insert(&db_tx).await?;

            let usages: Vec<LotUsage> = deduction
                .usages
                .iter()
                .map(|draw| LotUsage::from_draw(transaction.id, draw))
                .collect();
            if !usages.is_empty() {
                lot_usages::Entity::insert_many(usages.iter().map(lot_usages::ActiveModel::from))
                    .exec_without_returning(&db_tx)
                    .await?;
            }

            let remaining = available - owner_share;
            Ok(SaleReceipt {
                transaction,
                usages,
                remaining,
                low_balance: remaining < self.low_balance_threshold,
            })
        })
    }

    /// Administrative removal of a recorded sale.
    ///
    /// The transaction and its usage rows are deleted but the lots it
    /// consumed are **not** replenished, so the ledger no longer matches the
    /// log afterwards.
    pub async fn delete_sale(
        &self,
        transaction_id: Uuid,
        deleted_by: &str,
    ) -> ResultEngine<CustomerTransaction> {
        let _guard = self.write_lock.lock().await;
        with_tx!(self, |db_tx| {
            let model = sales::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
            let transaction = CustomerTransaction::try_from(model)?;

            lot_usages::Entity::delete_many()
                .filter(lot_usages::Column::TransactionId.eq(transaction_id.to_string()))
                .exec(&db_tx)
                .await?;
            sales::Entity::delete_by_id(transaction_id.to_string())
                .exec(&db_tx)
                .await?;

            tracing::warn!(
                %transaction_id,
                %deleted_by,
                target_paid = %transaction.actual_target_paid,
                "sale deleted, consumed lots were not restored"
            );
            Ok(transaction)
        })
    }
}
