use crate::core::account::AccountId;
use crate::core::error::LedgerError;
use crate::core::math::FeeRate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors arising from loading a ledger configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("origination fee rate {0} is not a representable fraction")]
    InvalidFeeRate(Decimal),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Startup configuration of a [`LendingLedger`](crate::ledger::engine::LendingLedger).
///
/// The fee rate is a fraction written as a string (`"0.01"` is 1%).
///
/// # Examples
///
/// ```
/// use collateral_ledger::core::config::LedgerConfig;
///
/// let config = LedgerConfig::from_json_str(r#"{
///     "ledger_account": "ledger",
///     "owner": "admin",
///     "origination_fee_rate": "0.01"
/// }"#).unwrap();
/// assert_eq!(config.fee_rate().unwrap().to_string(), "1%");
/// assert!(!config.paused);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account holding the ledger's custody balances.
    pub ledger_account: AccountId,
    /// Account allowed to run administrative calls.
    pub owner: AccountId,
    /// Fraction of released collateral skimmed at borrow time.
    #[serde(default)]
    pub origination_fee_rate: Decimal,
    /// Start in the paused state.
    #[serde(default)]
    pub paused: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_account: AccountId::new("ledger"),
            owner: AccountId::new("admin"),
            origination_fee_rate: Decimal::ZERO,
            paused: false,
        }
    }
}

impl LedgerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// The configured rate in fixed-point units. Range checks happen when
    /// the ledger is built.
    pub fn fee_rate(&self) -> Result<FeeRate, ConfigError> {
        FeeRate::from_decimal(self.origination_fee_rate)
            .ok_or(ConfigError::InvalidFeeRate(self.origination_fee_rate))
    }
}
