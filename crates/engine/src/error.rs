//! The module contains the error the engine can throw.
//!
//! Every variant is recoverable: a failed operation leaves the ledger and the
//! transaction log exactly as they were before the call.
//!
//! - [`InsufficientInventory`] thrown when the lots cannot cover a deduction.
//! - [`ExceedsOwnerShare`] thrown when a payout is above the owner's share.
//! - [`NegativeProfit`] thrown when a sale would cost more than it earns.
//! - [`Storage`] wraps any database failure.
//!
//!  [`InsufficientInventory`]: EngineError::InsufficientInventory
//!  [`ExceedsOwnerShare`]: EngineError::ExceedsOwnerShare
//!  [`NegativeProfit`]: EngineError::NegativeProfit
//!  [`Storage`]: EngineError::Storage
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Payout {paid} exceeds owner share {owner_share}")]
    ExceedsOwnerShare { paid: Decimal, owner_share: Decimal },
    #[error("Negative owner profit: {0}")]
    NegativeProfit(Decimal),
    #[error("No market rate recorded yet")]
    NoRateAvailable,
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error(transparent)]
    Storage(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (
                Self::InsufficientInventory {
                    requested: r1,
                    available: a1,
                },
                Self::InsufficientInventory {
                    requested: r2,
                    available: a2,
                },
            ) => r1 == r2 && a1 == a2,
            (
                Self::ExceedsOwnerShare {
                    paid: p1,
                    owner_share: s1,
                },
                Self::ExceedsOwnerShare {
                    paid: p2,
                    owner_share: s2,
                },
            ) => p1 == p2 && s1 == s2,
            (Self::NegativeProfit(a), Self::NegativeProfit(b)) => a == b,
            (Self::NoRateAvailable, Self::NoRateAvailable) => true,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
