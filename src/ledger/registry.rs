use crate::core::account::AccountId;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::token::AssetId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An asset the ledger accepts, and the vault it redeems against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAsset {
    pub asset: AssetId,
    pub vault: AccountId,
    pub registered: bool,
}

/// Asset → vault table. Entries are never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    assets: BTreeMap<AssetId, RegisteredAsset>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `asset` as redeemable against `vault`.
    pub fn register(&mut self, asset: AssetId, vault: AccountId) -> LedgerResult<&RegisteredAsset> {
        if self.is_registered(&asset) {
            return Err(LedgerError::AlreadyRegistered(asset));
        }
        let entry = RegisteredAsset {
            asset: asset.clone(),
            vault,
            registered: true,
        };
        Ok(self.assets.entry(asset).or_insert(entry))
    }

    pub fn is_registered(&self, asset: &AssetId) -> bool {
        self.assets.get(asset).map(|a| a.registered).unwrap_or(false)
    }

    pub fn get(&self, asset: &AssetId) -> Option<&RegisteredAsset> {
        self.assets.get(asset)
    }

    /// The vault of a registered asset.
    pub fn vault_of(&self, asset: &AssetId) -> LedgerResult<&AccountId> {
        self.assets
            .get(asset)
            .filter(|a| a.registered)
            .map(|a| &a.vault)
            .ok_or_else(|| LedgerError::NotRegistered(asset.clone()))
    }

    pub fn assets(&self) -> impl Iterator<Item = &RegisteredAsset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
