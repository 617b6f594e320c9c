use crate::core::account::AccountId;
use crate::core::math::{Amount, FeeRate};
use crate::core::token::AssetId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened in a committed ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssetRegistered {
        asset: AssetId,
        vault: AccountId,
        by: AccountId,
    },
    Borrowed {
        participant: AccountId,
        asset: AssetId,
        amount: Amount,
        total_fee: Amount,
    },
    Repaid {
        participant: AccountId,
        asset: AssetId,
        tokens_minted: Amount,
    },
    PartialRepaid {
        participant: AccountId,
        asset: AssetId,
        tokens_minted: Amount,
    },
    OriginationFeeRateUpdated {
        old: FeeRate,
        new: FeeRate,
    },
    Paused {
        by: AccountId,
    },
    Unpaused {
        by: AccountId,
    },
    OwnershipTransferred {
        previous: AccountId,
        new: AccountId,
    },
}

/// An event emitted by a committed ledger call.
///
/// Events are recorded alongside the state they describe, so a call
/// that rolls back leaves no event behind.
///
/// # Examples
///
/// ```
/// use collateral_ledger::core::account::AccountId;
/// use collateral_ledger::core::events::{EventKind, LedgerEvent};
///
/// let event = LedgerEvent::new(EventKind::Paused { by: AccountId::new("admin") });
/// assert!(matches!(event.kind(), EventKind::Paused { .. }));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    id: Uuid,
    emitted_at: DateTime<Utc>,
    kind: EventKind,
}

impl LedgerEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            kind,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}
