use sea_orm::{
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    CustomerTransaction, EngineError, LotUsage, Notification, ProfitSummary, ResultEngine,
    lot_usages, sales,
    util::checked_add,
};

use super::{Engine, with_tx};

impl Engine {
    /// Owner profit accumulated over every recorded sale.
    pub async fn profit_summary(&self) -> ResultEngine<ProfitSummary> {
        with_tx!(self, |db_tx| {
            let models = sales::Entity::find().all(&db_tx).await?;
            let mut summary = ProfitSummary::default();
            for model in models {
                let transaction = CustomerTransaction::try_from(model)?;
                summary.total_owner_profit = checked_add(
                    summary.total_owner_profit,
                    transaction.owner_profit,
                    "total owner profit",
                )?;
                summary.transactions += 1;
            }
            Ok(summary)
        })
    }

    /// Compute the profit summary and push it to the notifier.
    pub async fn report_profit(&self) -> ResultEngine<ProfitSummary> {
        let summary = self.profit_summary().await?;
        self.notify(Notification::ProfitSummary {
            total_owner_profit: summary.total_owner_profit,
            transactions: summary.transactions,
        });
        Ok(summary)
    }

    /// Most recent sales first. Sales sharing a timestamp come back in
    /// reverse insertion order.
    pub async fn sales_history(&self, limit: u64) -> ResultEngine<Vec<CustomerTransaction>> {
        with_tx!(self, |db_tx| {
            sales::Entity::find()
                .order_by_desc(sales::Column::RecordedAt)
                .order_by_desc(Expr::cust("rowid"))
                .limit(limit)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(CustomerTransaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub async fn sale(&self, transaction_id: Uuid) -> ResultEngine<CustomerTransaction> {
        with_tx!(self, |db_tx| {
            let model = sales::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
            CustomerTransaction::try_from(model)
        })
    }

    /// Lots that funded a sale, oldest lot first.
    pub async fn sale_usages(&self, transaction_id: Uuid) -> ResultEngine<Vec<LotUsage>> {
        with_tx!(self, |db_tx| {
            lot_usages::Entity::find()
                .filter(lot_usages::Column::TransactionId.eq(transaction_id.to_string()))
                .order_by_asc(lot_usages::Column::LotId)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(LotUsage::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
