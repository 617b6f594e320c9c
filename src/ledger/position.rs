use crate::core::account::AccountId;
use crate::core::error::{LedgerError, LedgerResult, MathError};
use crate::core::math::Amount;
use crate::core::token::{AssetId, CollateralKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A participant's open borrowing relationship against one asset.
///
/// `collateral_kinds` is fixed when the position activates and only
/// cleared, never edited, when `tokens_burned` returns to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPosition {
    pub tokens_burned: Amount,
    pub collateral_kinds: Vec<CollateralKind>,
    pub active: bool,
}

impl LoanPosition {
    /// Check a borrow's kinds against this position: any list is accepted
    /// while inactive, otherwise it must match element for element.
    pub fn accepts(&self, kinds: &[CollateralKind]) -> LedgerResult<()> {
        if self.active && self.collateral_kinds.as_slice() != kinds {
            return Err(LedgerError::CollateralMismatch {
                expected: self.collateral_kinds.clone(),
                supplied: kinds.to_vec(),
            });
        }
        Ok(())
    }

    /// Record `amount` more burned, activating with `kinds` if needed.
    pub fn record_borrow(&mut self, kinds: &[CollateralKind], amount: Amount) -> LedgerResult<()> {
        self.accepts(kinds)?;
        let burned = self
            .tokens_burned
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        if !self.active {
            self.collateral_kinds = kinds.to_vec();
            self.active = true;
        }
        self.tokens_burned = burned;
        Ok(())
    }

    /// Record `amount` restored; deactivates at zero.
    pub fn record_repay(&mut self, amount: Amount) -> LedgerResult<()> {
        if amount > self.tokens_burned {
            return Err(LedgerError::ExceedsBorrowed {
                requested: amount,
                burned: self.tokens_burned,
            });
        }
        self.tokens_burned -= amount;
        if self.tokens_burned == 0 {
            self.close();
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.tokens_burned = 0;
        self.collateral_kinds.clear();
        self.active = false;
    }
}

/// Loan positions keyed by participant and asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionStore {
    #[serde(with = "crate::ledger::keyed_serde")]
    positions: HashMap<(AccountId, AssetId), LoanPosition>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, participant: &AccountId, asset: &AssetId) -> Option<&LoanPosition> {
        self.positions.get(&(participant.clone(), asset.clone()))
    }

    /// The participant's active position, or `NoActiveLoan`.
    pub fn active(&self, participant: &AccountId, asset: &AssetId) -> LedgerResult<&LoanPosition> {
        self.get(participant, asset)
            .filter(|p| p.active)
            .ok_or_else(|| LedgerError::NoActiveLoan {
                participant: participant.clone(),
                asset: asset.clone(),
            })
    }

    pub fn entry(&mut self, participant: &AccountId, asset: &AssetId) -> &mut LoanPosition {
        self.positions
            .entry((participant.clone(), asset.clone()))
            .or_default()
    }

    /// Drop closed positions so the store only holds open ones.
    pub fn prune(&mut self, participant: &AccountId, asset: &AssetId) {
        let key = (participant.clone(), asset.clone());
        if self.positions.get(&key).is_some_and(|p| !p.active) {
            self.positions.remove(&key);
        }
    }

    /// All active positions of one participant.
    pub fn positions_for(&self, participant: &AccountId) -> Vec<(&AssetId, &LoanPosition)> {
        let mut found: Vec<_> = self
            .positions
            .iter()
            .filter(|((p, _), pos)| p == participant && pos.active)
            .map(|((_, asset), pos)| (asset, pos))
            .collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found
    }

    /// Total burned against an asset across all participants.
    pub fn total_burned(&self, asset: &AssetId) -> Amount {
        self.positions
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, pos)| pos.tokens_burned)
            .sum()
    }

    pub fn active_count(&self) -> usize {
        self.positions.values().filter(|p| p.active).count()
    }
}
