use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    DerivedRates, EngineError, MarketRate, ResultEngine, rates, util::ensure_positive,
};

use super::{Engine, with_tx};

impl Engine {
    /// Append a market rate to the log.
    ///
    /// `entered_by` is the user id of whoever entered it, or `system` for
    /// automated feeds.
    pub async fn record_market_rate(
        &self,
        value: Decimal,
        entered_by: &str,
        recorded_at: DateTime<Utc>,
    ) -> ResultEngine<MarketRate> {
        ensure_positive(value, "market rate")?;
        with_tx!(self, |db_tx| {
            let model = rates::ActiveModel::new_entry(value, entered_by, recorded_at)
                .insert(&db_tx)
                .await?;
            let rate = MarketRate::try_from(model)?;
            tracing::info!(rate = %rate.value, %entered_by, "market rate recorded");
            Ok(rate)
        })
    }

    /// The most recent market rate, if one was ever recorded.
    pub async fn latest_market_rate(&self) -> ResultEngine<Option<MarketRate>> {
        with_tx!(self, |db_tx| self.latest_market_rate_in(&db_tx).await)
    }

    /// Latest market rate with the owner and intermediary rates derived
    /// from it.
    pub async fn current_rates(&self) -> ResultEngine<DerivedRates> {
        self.latest_market_rate()
            .await?
            .ok_or(EngineError::NoRateAvailable)?
            .derived()
    }

    /// Market rates, newest first.
    pub async fn market_rate_history(&self, limit: u64) -> ResultEngine<Vec<MarketRate>> {
        with_tx!(self, |db_tx| {
            let models = rates::Entity::find()
                .order_by_desc(rates::Column::RecordedAt)
                .order_by_desc(rates::Column::Id)
                .limit(limit)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(MarketRate::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub(super) async fn latest_market_rate_in(
        &self,
        db_tx: &DatabaseTransaction,
    ) -> ResultEngine<Option<MarketRate>> {
        let model = rates::Entity::find()
            .order_by_desc(rates::Column::RecordedAt)
            .order_by_desc(rates::Column::Id)
            .one(db_tx)
            .await?;
        model.map(MarketRate::try_from).transpose()
    }
}
