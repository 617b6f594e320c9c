use crate::core::account::AccountId;
use crate::core::error::MathError;
use crate::core::math::Amount;
use crate::core::token::{AssetId, CollateralKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key of one collateral obligation.
pub type DebtKey = (AccountId, AssetId, CollateralKind);

/// Outstanding collateral each participant owes back to an asset's vault.
///
/// An entry is the amount of one collateral kind the participant must
/// return to fully unwind their position against one asset. Entries are
/// removed when they reach zero, so every stored amount is positive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtLedger {
    /// (participant, asset, kind) -> amount owed
    #[serde(with = "crate::ledger::keyed_serde")]
    debts: HashMap<DebtKey, Amount>,
}

impl DebtLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(participant: &AccountId, asset: &AssetId, kind: &CollateralKind) -> DebtKey {
        (participant.clone(), asset.clone(), kind.clone())
    }

    /// Outstanding amount of one kind (zero if none).
    pub fn owed(&self, participant: &AccountId, asset: &AssetId, kind: &CollateralKind) -> Amount {
        self.debts
            .get(&Self::key(participant, asset, kind))
            .copied()
            .unwrap_or(0)
    }

    /// Increase what is owed.
    pub fn increase(
        &mut self,
        participant: &AccountId,
        asset: &AssetId,
        kind: &CollateralKind,
        amount: Amount,
    ) -> Result<Amount, MathError> {
        if amount == 0 {
            return Ok(self.owed(participant, asset, kind));
        }
        let entry = self
            .debts
            .entry(Self::key(participant, asset, kind))
            .or_insert(0);
        *entry = entry.checked_add(amount).ok_or(MathError::Overflow)?;
        Ok(*entry)
    }

    /// Decrease what is owed by exactly `amount`, dropping the entry at zero.
    pub fn decrease(
        &mut self,
        participant: &AccountId,
        asset: &AssetId,
        kind: &CollateralKind,
        amount: Amount,
    ) -> Result<Amount, MathError> {
        let key = Self::key(participant, asset, kind);
        let current = self.debts.get(&key).copied().unwrap_or(0);
        let remaining = current.checked_sub(amount).ok_or(MathError::Underflow)?;
        if remaining == 0 {
            self.debts.remove(&key);
        } else {
            self.debts.insert(key, remaining);
        }
        Ok(remaining)
    }

    /// Amounts owed for each kind in `kinds`, in the same order.
    pub fn owed_for(
        &self,
        participant: &AccountId,
        asset: &AssetId,
        kinds: &[CollateralKind],
    ) -> Vec<Amount> {
        kinds
            .iter()
            .map(|kind| self.owed(participant, asset, kind))
            .collect()
    }

    /// Kinds with a non-zero balance for one position.
    pub fn kinds_owed(&self, participant: &AccountId, asset: &AssetId) -> Vec<&CollateralKind> {
        let mut kinds: Vec<_> = self
            .debts
            .keys()
            .filter(|(p, a, _)| p == participant && a == asset)
            .map(|(_, _, k)| k)
            .collect();
        kinds.sort();
        kinds
    }

    /// Total owed in one kind against one asset, across all participants.
    pub fn total_owed(&self, asset: &AssetId, kind: &CollateralKind) -> Amount {
        self.debts
            .iter()
            .filter(|((_, a, k), _)| a == asset && k == kind)
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn all_debts(&self) -> &HashMap<DebtKey, Amount> {
        &self.debts
    }

    pub fn is_empty(&self) -> bool {
        self.debts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AccountId, AssetId, CollateralKind) {
        (
            AccountId::new("alice"),
            AssetId::new("SHARE"),
            CollateralKind::Native,
        )
    }

    #[test]
    fn test_increase_accumulates() {
        let mut debts = DebtLedger::new();
        let (alice, share, native) = ids();
        debts.increase(&alice, &share, &native, 999).unwrap();
        assert_eq!(debts.increase(&alice, &share, &native, 1).unwrap(), 1000);
        assert_eq!(debts.owed(&alice, &share, &native), 1000);
        assert_eq!(debts.total_owed(&share, &native), 1000);
    }

    #[test]
    fn test_decrease_to_zero_removes_entry() {
        let mut debts = DebtLedger::new();
        let (alice, share, native) = ids();
        debts.increase(&alice, &share, &native, 10).unwrap();
        assert_eq!(debts.decrease(&alice, &share, &native, 4).unwrap(), 6);
        assert_eq!(debts.decrease(&alice, &share, &native, 6).unwrap(), 0);
        assert!(debts.is_empty());
        assert!(debts.kinds_owed(&alice, &share).is_empty());
    }

    #[test]
    fn test_decrease_below_zero_fails() {
        let mut debts = DebtLedger::new();
        let (alice, share, native) = ids();
        debts.increase(&alice, &share, &native, 3).unwrap();
        assert_eq!(
            debts.decrease(&alice, &share, &native, 4),
            Err(MathError::Underflow)
        );
        assert_eq!(debts.owed(&alice, &share, &native), 3);
    }

    #[test]
    fn test_zero_increase_creates_nothing() {
        let mut debts = DebtLedger::new();
        let (alice, share, native) = ids();
        debts.increase(&alice, &share, &native, 0).unwrap();
        assert!(debts.is_empty());
    }

    #[test]
    fn test_json_keys_are_strings() {
        let mut debts = DebtLedger::new();
        let (alice, share, _) = ids();
        debts
            .increase(&alice, &share, &CollateralKind::token("WBTC"), 7)
            .unwrap();
        let json = serde_json::to_string(&debts).unwrap();
        assert!(json.contains("\"alice:SHARE:token/WBTC\":7"));

        let back: DebtLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back.owed(&alice, &share, &CollateralKind::token("WBTC")), 7);
    }
}
