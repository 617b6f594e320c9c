//! In-memory collaborators: token balances, native value, assets and the
//! vaults that redeem them.
//!
//! Vaults redeem pro rata: burning `a` of an asset with supply `S`
//! releases `backing * a / S` of each requested kind, less the vault's
//! own redemption fee, which stays in the vault.

use crate::core::account::AccountId;
use crate::core::error::{HostError, MathError};
use crate::core::math::{fee, mul_div, Amount, FeeRate};
use crate::core::token::{AssetId, CollateralKind, TokenId};
use crate::host::{
    collateral_balance, AssetContract, CollateralVault, HostResult, NativeBank, TokenLedger,
    Transactional,
};
use log::trace;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct AssetInfo {
    vault: AccountId,
    minters: Vec<AccountId>,
}

#[derive(Debug, Clone)]
struct VaultInfo {
    asset: AssetId,
    redemption_fee: FeeRate,
}

#[derive(Debug, Clone, Default)]
struct HostState {
    balances: HashMap<(TokenId, AccountId), Amount>,
    native: HashMap<AccountId, Amount>,
    allowances: HashMap<(TokenId, AccountId, AccountId), Amount>,
    supply: HashMap<TokenId, Amount>,
    assets: HashMap<AssetId, AssetInfo>,
    vaults: HashMap<AccountId, VaultInfo>,
}

type BurnHook = Box<dyn FnMut(&AccountId, Amount) + Send>;

/// A self-contained world the ledger can run against.
///
/// Every [`Transactional::begin`] snapshots the whole world, so a rollback
/// restores balances, allowances and supply exactly.
#[derive(Default)]
pub struct InMemoryHost {
    state: HostState,
    journal: Vec<HostState>,
    burn_hook: Option<BurnHook>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vault redeeming `asset`, and the asset's record pointing at it.
    pub fn create_vault(&mut self, vault: AccountId, asset: AssetId, redemption_fee: FeeRate) {
        self.state.assets.insert(
            asset.clone(),
            AssetInfo {
                vault: vault.clone(),
                minters: Vec::new(),
            },
        );
        self.state.vaults.insert(
            vault,
            VaultInfo {
                asset,
                redemption_fee,
            },
        );
    }

    /// Allow `minter` to mint `asset` through [`AssetContract::mint_to`].
    pub fn add_minter(&mut self, asset: &AssetId, minter: AccountId) -> HostResult<()> {
        let info = self
            .state
            .assets
            .get_mut(asset)
            .ok_or_else(|| HostError::UnknownToken(asset.clone()))?;
        if !info.minters.contains(&minter) {
            info.minters.push(minter);
        }
        Ok(())
    }

    /// Credit new units of any token, growing its supply.
    pub fn mint(&mut self, token: &TokenId, to: &AccountId, amount: Amount) -> HostResult<()> {
        let supply = self.state.supply.entry(token.clone()).or_insert(0);
        *supply = supply.checked_add(amount).ok_or(MathError::Overflow)?;
        credit(
            self.state
                .balances
                .entry((token.clone(), to.clone()))
                .or_insert(0),
            amount,
        )
    }

    pub fn fund_native(&mut self, who: &AccountId, amount: Amount) -> HostResult<()> {
        credit(self.state.native.entry(who.clone()).or_insert(0), amount)
    }

    /// Give a vault backing in any collateral kind.
    pub fn fund_collateral(
        &mut self,
        kind: &CollateralKind,
        who: &AccountId,
        amount: Amount,
    ) -> HostResult<()> {
        match kind {
            CollateralKind::Native => self.fund_native(who, amount),
            CollateralKind::Token(token) => self.mint(token, who, amount),
        }
    }

    pub fn total_supply(&self, token: &TokenId) -> Amount {
        self.state.supply.get(token).copied().unwrap_or(0)
    }

    pub fn allowance(&self, token: &TokenId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state
            .allowances
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Balance of `kind` held by `who`.
    pub fn collateral(&self, kind: &CollateralKind, who: &AccountId) -> Amount {
        collateral_balance(self, kind, who)
    }

    /// Depth of open transactions.
    pub fn transaction_depth(&self) -> usize {
        self.journal.len()
    }

    /// Run `hook(vault, amount)` at the end of every burn, as a vault calling out would.
    pub fn on_burn(&mut self, hook: impl FnMut(&AccountId, Amount) + Send + 'static) {
        self.burn_hook = Some(Box::new(hook));
    }

    fn vault_info(&self, vault: &AccountId, asset: &AssetId) -> HostResult<&VaultInfo> {
        let info = self
            .state
            .vaults
            .get(vault)
            .ok_or_else(|| HostError::UnknownVault(vault.clone()))?;
        if &info.asset != asset {
            return Err(HostError::VaultAssetMismatch {
                vault: vault.clone(),
                asset: asset.clone(),
            });
        }
        Ok(info)
    }

    fn debit_token(&mut self, token: &TokenId, who: &AccountId, amount: Amount) -> HostResult<()> {
        let balance = self
            .state
            .balances
            .entry((token.clone(), who.clone()))
            .or_insert(0);
        if *balance < amount {
            return Err(HostError::InsufficientBalance {
                token: token.to_string(),
                who: who.clone(),
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn burn(&mut self, token: &TokenId, who: &AccountId, amount: Amount) -> HostResult<()> {
        self.debit_token(token, who, amount)?;
        let supply = self.state.supply.entry(token.clone()).or_insert(0);
        *supply = supply.saturating_sub(amount);
        Ok(())
    }
}

fn credit(balance: &mut Amount, amount: Amount) -> HostResult<()> {
    *balance = balance
        .checked_add(amount)
        .ok_or(MathError::Overflow)?;
    Ok(())
}

impl TokenLedger for InMemoryHost {
    fn balance_of(&self, token: &TokenId, who: &AccountId) -> Amount {
        self.state
            .balances
            .get(&(token.clone(), who.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()> {
        self.debit_token(token, from, amount)?;
        credit(
            self.state
                .balances
                .entry((token.clone(), to.clone()))
                .or_insert(0),
            amount,
        )
    }

    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()> {
        let key = (token.clone(), from.clone(), spender.clone());
        let allowed = self.state.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(HostError::InsufficientAllowance {
                token: token.clone(),
                owner: from.clone(),
                spender: spender.clone(),
                allowed,
                requested: amount,
            });
        }
        self.transfer(token, from, to, amount)?;
        if allowed != Amount::MAX {
            self.state.allowances.insert(key, allowed - amount);
        }
        Ok(())
    }

    fn approve(
        &mut self,
        token: &TokenId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> HostResult<()> {
        self.state
            .allowances
            .insert((token.clone(), owner.clone(), spender.clone()), amount);
        Ok(())
    }
}

impl AssetContract for InMemoryHost {
    fn vault_of(&self, asset: &AssetId) -> HostResult<AccountId> {
        self.state
            .assets
            .get(asset)
            .map(|info| info.vault.clone())
            .ok_or_else(|| HostError::UnknownToken(asset.clone()))
    }

    fn mint_to(
        &mut self,
        asset: &AssetId,
        minter: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()> {
        let info = self
            .state
            .assets
            .get(asset)
            .ok_or_else(|| HostError::UnknownToken(asset.clone()))?;
        if !info.minters.contains(minter) {
            return Err(HostError::NotMinter(minter.clone()));
        }
        self.mint(asset, to, amount)
    }
}

impl NativeBank for InMemoryHost {
    fn native_balance(&self, who: &AccountId) -> Amount {
        self.state.native.get(who).copied().unwrap_or(0)
    }

    fn transfer_native(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> HostResult<()> {
        let balance = self.state.native.entry(from.clone()).or_insert(0);
        if *balance < amount {
            return Err(HostError::InsufficientBalance {
                token: CollateralKind::Native.to_string(),
                who: from.clone(),
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        credit(self.state.native.entry(to.clone()).or_insert(0), amount)
    }
}

impl CollateralVault for InMemoryHost {
    fn burn_for_collateral(
        &mut self,
        vault: &AccountId,
        asset: &AssetId,
        kinds: &[CollateralKind],
        amount: Amount,
        caller: &AccountId,
        recipient: &AccountId,
    ) -> HostResult<()> {
        let releases = self.preview_burn(vault, asset, kinds, amount)?;
        self.transfer_from(asset, vault, caller, vault, amount)?;
        self.burn(asset, vault, amount)?;
        for (kind, release) in kinds.iter().zip(releases) {
            trace!("vault {vault} releases {release} {kind} to {recipient}");
            if release == 0 {
                continue;
            }
            match kind {
                CollateralKind::Native => self.transfer_native(vault, recipient, release)?,
                CollateralKind::Token(token) => self.transfer(token, vault, recipient, release)?,
            }
        }
        if let Some(hook) = self.burn_hook.as_mut() {
            hook(vault, amount);
        }
        Ok(())
    }

    fn preview_burn(
        &self,
        vault: &AccountId,
        asset: &AssetId,
        kinds: &[CollateralKind],
        amount: Amount,
    ) -> HostResult<Vec<Amount>> {
        let info = self.vault_info(vault, asset)?;
        let supply = self.total_supply(asset);
        if supply == 0 {
            return Err(HostError::EmptySupply(asset.clone()));
        }
        kinds
            .iter()
            .map(|kind| -> HostResult<Amount> {
                let backing = collateral_balance(self, kind, vault);
                let gross = mul_div(backing, amount, supply)?;
                let vault_fee = fee(gross, info.redemption_fee)?;
                Ok(gross - vault_fee)
            })
            .collect()
    }
}

impl Transactional for InMemoryHost {
    fn begin(&mut self) {
        self.journal.push(self.state.clone());
    }

    fn commit(&mut self) -> HostResult<()> {
        self.journal.pop().map(|_| ()).ok_or(HostError::NoTransaction)
    }

    fn rollback(&mut self) -> HostResult<()> {
        self.state = self.journal.pop().ok_or(HostError::NoTransaction)?;
        Ok(())
    }
}
