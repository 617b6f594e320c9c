use crate::core::account::AccountId;
use crate::core::math::{Amount, FeeRate};
use crate::core::token::{AssetId, CollateralKind, TokenId};
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors from fixed-point arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
}

/// Errors reported by external collaborators (asset contract, vault, bank).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{who} holds {available} of {token}, needs {requested}")]
    InsufficientBalance {
        token: String,
        who: AccountId,
        available: Amount,
        requested: Amount,
    },
    #[error("{spender} may spend {allowed} of {token} for {owner}, needs {requested}")]
    InsufficientAllowance {
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        allowed: Amount,
        requested: Amount,
    },
    #[error("unknown token {0}")]
    UnknownToken(TokenId),
    #[error("unknown vault {0}")]
    UnknownVault(AccountId),
    #[error("vault {vault} does not back {asset}")]
    VaultAssetMismatch { vault: AccountId, asset: AssetId },
    #[error("{0} is not a minter for the asset")]
    NotMinter(AccountId),
    #[error("asset {0} has no circulating supply")]
    EmptySupply(AssetId),
    #[error("no open host transaction")]
    NoTransaction,
    #[error("host call rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Broad classes of failure, used by callers to decide a remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, rejected before any external call.
    Validation,
    /// Caller not permitted to perform the action.
    Authorization,
    /// Ledger state does not allow the call (caller logic error).
    StatePrecondition,
    /// Market terms moved against the caller.
    Economic,
    /// Arithmetic or collaborator failure.
    Internal,
}

/// Every way a ledger call can fail. A failed call leaves no trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // --- validation ---
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("collateral kind list is empty")]
    EmptyCollateralList,
    #[error("{kinds} collateral kinds but {min_outputs} minimum outputs")]
    LengthMismatch { kinds: usize, min_outputs: usize },
    #[error("collateral kind {0} listed more than once")]
    DuplicateCollateralKind(CollateralKind),
    #[error("repaying {requested} but only {burned} burned")]
    ExceedsBorrowed { requested: Amount, burned: Amount },

    // --- authorization ---
    #[error("{caller} is not the ledger owner")]
    Unauthorized { caller: AccountId },

    // --- state preconditions ---
    #[error("asset {0} is not registered")]
    NotRegistered(AssetId),
    #[error("asset {0} is already registered")]
    AlreadyRegistered(AssetId),
    #[error("{participant} has no active loan against {asset}")]
    NoActiveLoan {
        participant: AccountId,
        asset: AssetId,
    },
    #[error("collateral kinds differ from the active position's {expected:?}")]
    CollateralMismatch {
        expected: Vec<CollateralKind>,
        supplied: Vec<CollateralKind>,
    },
    #[error("fee rate {rate} exceeds the maximum {max}")]
    FeeTooHigh { rate: FeeRate, max: FeeRate },
    #[error("ledger is paused")]
    Paused,
    #[error("ledger is already paused")]
    AlreadyPaused,
    #[error("ledger is not paused")]
    NotPaused,
    #[error("re-entrant call rejected")]
    Reentrant,

    // --- economic ---
    #[error("slippage on collateral #{index}: received {received}, minimum {minimum}")]
    SlippageExceeded {
        index: usize,
        received: Amount,
        minimum: Amount,
    },
    #[error("supplied {supplied} native value, {required} required")]
    InsufficientPayment { required: Amount, supplied: Amount },

    // --- plumbing ---
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Host(#[from] HostError),
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        use LedgerError::*;
        match self {
            ZeroAmount
            | EmptyCollateralList
            | LengthMismatch { .. }
            | DuplicateCollateralKind(_)
            | ExceedsBorrowed { .. } => ErrorCategory::Validation,
            Unauthorized { .. } => ErrorCategory::Authorization,
            NotRegistered(_)
            | AlreadyRegistered(_)
            | NoActiveLoan { .. }
            | CollateralMismatch { .. }
            | FeeTooHigh { .. }
            | Paused
            | AlreadyPaused
            | NotPaused
            | Reentrant => ErrorCategory::StatePrecondition,
            SlippageExceeded { .. } | InsufficientPayment { .. } => ErrorCategory::Economic,
            Math(_) | Host(_) => ErrorCategory::Internal,
        }
    }

    /// Whether retrying with adjusted terms may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Economic
    }
}
