//! # collateral-ledger
//!
//! A lending ledger that lets participants burn a vault-backed asset for
//! a pro-rata share of the vault's collateral, and later return that
//! collateral to have the asset re-minted.
//!
//! ## Architecture
//!
//! - **core**: Foundational types: accounts, collateral kinds, fixed-point math, errors, events, config
//! - **host**: Traits for the collaborators the ledger calls: asset contracts, vaults, native bank
//! - **ledger**: Registry, loan positions, debts, and the borrow / repay paths
//! - **simulation**: An in-memory host and scripted or random scenarios

pub mod core;
pub mod host;
pub mod ledger;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::account::AccountId;
    pub use crate::core::config::LedgerConfig;
    pub use crate::core::error::{ErrorCategory, HostError, LedgerError, LedgerResult};
    pub use crate::core::events::{EventKind, LedgerEvent};
    pub use crate::core::math::{Amount, FeeRate, MAX_ORIGINATION_FEE_RATE, SCALE};
    pub use crate::core::token::{AssetId, CollateralKind, TokenId};
    pub use crate::host::{AssetContract, CollateralVault, Host, NativeBank, TokenLedger};
    pub use crate::ledger::engine::{LendingLedger, LoanView};
    pub use crate::ledger::repayment::RepayReceipt;
    pub use crate::ledger::settlement::{BorrowPreview, BorrowReceipt};
    pub use crate::simulation::memory::InMemoryHost;
}
