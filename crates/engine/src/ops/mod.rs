use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use crate::{
    LogSink, NotificationSink, ResultEngine,
    notifications::{Notification, deliver},
    util::ensure_non_negative,
};

mod intakes;
mod inventory;
mod rates;
mod reports;
mod sales;

/// Inventory level (target currency) below which a low-balance notification
/// is raised after a sale.
pub const DEFAULT_LOW_BALANCE_THRESHOLD: Decimal = dec!(1000);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of every ledger operation.
///
/// Cloning is cheap and clones share the same write lock, so mutations issued
/// through any clone are serialized: a sale checks the inventory and deducts
/// from it without another writer slipping in between.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
    notifier: Arc<dyn NotificationSink>,
    owner_id: Option<String>,
    low_balance_threshold: Decimal,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn low_balance_threshold(&self) -> Decimal {
        self.low_balance_threshold
    }

    fn notify(&self, notification: Notification) {
        deliver(&self.notifier, notification);
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Option<Arc<dyn NotificationSink>>,
    owner_id: Option<String>,
    low_balance_threshold: Option<Decimal>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where notifications go. Defaults to [`LogSink`].
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    /// User id of the capital owner. Sales recorded by anyone else are
    /// reported to the notifier.
    pub fn owner_id(mut self, owner_id: impl Into<String>) -> EngineBuilder {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn low_balance_threshold(mut self, threshold: Decimal) -> EngineBuilder {
        self.low_balance_threshold = Some(threshold);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let low_balance_threshold = self
            .low_balance_threshold
            .unwrap_or(DEFAULT_LOW_BALANCE_THRESHOLD);
        ensure_non_negative(low_balance_threshold, "low balance threshold")?;

        Ok(Engine {
            database: self.database,
            write_lock: Arc::new(Mutex::new(())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogSink)),
            owner_id: self.owner_id,
            low_balance_threshold,
        })
    }
}
