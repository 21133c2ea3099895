//! Settings for the admin tool, read from an optional `settings.toml` and
//! `CAMBIO__SECTION__KEY` environment variables.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! url = "sqlite:./cambio.db?mode=rwc"
//!
//! [ledger]
//! owner_id = "owner"
//! low_balance_threshold = "1000"
//! source_currency = "USD"
//! target_currency = "GHS"
//! ```
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./cambio.db?mode=rwc";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    /// Tracing level for the tool and the engine.
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    /// User id of the capital owner.
    pub owner_id: Option<String>,
    pub low_balance_threshold: Decimal,
    pub source_currency: String,
    pub target_currency: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            owner_id: None,
            low_balance_threshold: engine::DEFAULT_LOW_BALANCE_THRESHOLD,
            source_currency: "USD".to_string(),
            target_currency: "GHS".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub ledger: Ledger,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CAMBIO").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Database url, preferring `flag` over the configured one.
    pub fn database_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.database.url.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }
}
