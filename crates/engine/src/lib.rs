//! Bookkeeping core of a currency-exchange desk.
//!
//! The owner funds the desk with source currency, converted into
//! target-currency [`InventoryLot`]s by bulk intakes. The intermediary sells
//! that stock to customers; every sale is funded FIFO from the lots and the
//! owner's profit is measured against the lots' cost basis.
//!
//! All state lives in the database handed to [`Engine::builder`].

pub use commands::{FinalizeSaleCmd, IntakeRate, RecordIntakeCmd, SaleQuote};
pub use error::EngineError;
pub use intakes::{BulkIntake, IntakeFigures};
pub use inventory::{Deduction, InventoryLedger, InventoryLot, LotDraw};
pub use lot_usages::LotUsage;
pub use notifications::{LogSink, Notification, NotificationSink, NotifyError};
pub use ops::{DEFAULT_LOW_BALANCE_THRESHOLD, Engine, EngineBuilder};
pub use rates::{DerivedRates, MarketRate};
pub use reports::{InventorySummary, ProfitSummary};
pub use sales::{CustomerTransaction, SaleReceipt};

mod commands;
mod error;
mod intakes;
mod inventory;
mod lot_usages;
mod notifications;
mod ops;
pub mod rates;
mod reports;
mod sales;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
