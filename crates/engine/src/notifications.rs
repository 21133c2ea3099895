//! Outgoing notifications.
//!
//! The engine raises a [`Notification`] after a write has committed. Delivery
//! is fire-and-forget: a sink error is logged and never turns a committed
//! sale into a failure.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Inventory dropped below the configured threshold.
    LowBalance {
        remaining: Decimal,
        threshold: Decimal,
    },
    /// A sale was recorded by someone other than the owner.
    SaleRecorded {
        recorded_by: String,
        source_received: Decimal,
        actual_paid: Decimal,
        suggested: Decimal,
        owner_profit: Decimal,
        remaining: Decimal,
    },
    ProfitSummary {
        total_owner_profit: Decimal,
        transactions: u64,
    },
}

#[derive(Error, Debug)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Destination for engine notifications (a chat, a mailbox, a log...).
pub trait NotificationSink: fmt::Debug + Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Default sink: writes every notification to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::LowBalance {
                remaining,
                threshold,
            } => tracing::warn!(%remaining, %threshold, "inventory below threshold"),
            Notification::SaleRecorded {
                recorded_by,
                owner_profit,
                remaining,
                ..
            } => tracing::info!(
                %recorded_by,
                %owner_profit,
                %remaining,
                "sale recorded by intermediary"
            ),
            Notification::ProfitSummary {
                total_owner_profit,
                transactions,
            } => tracing::info!(%total_owner_profit, transactions, "profit summary"),
        }
        Ok(())
    }
}

pub(crate) fn deliver(sink: &Arc<dyn NotificationSink>, notification: Notification) {
    if let Err(err) = sink.notify(&notification) {
        tracing::warn!("failed to deliver {notification:?}: {err}");
    }
}
