//! Interfaces of the external collaborators the ledger calls into.
//!
//! The ledger trusts none of these calls' return values for money: it
//! measures what actually moved through balance queries.

use crate::core::account::AccountId;
use crate::core::error::HostError;
use crate::core::math::Amount;
use crate::core::token::{AssetId, CollateralKind, TokenId};

pub type HostResult<T> = Result<T, HostError>;

/// Fungible token balances and allowances.
pub trait TokenLedger {
    fn balance_of(&self, token: &TokenId, who: &AccountId) -> Amount;

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()>;

    fn approve(
        &mut self,
        token: &TokenId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> HostResult<()>;
}

/// The burnable asset's own contract.
pub trait AssetContract: TokenLedger {
    /// The vault the asset is redeemable against.
    fn vault_of(&self, asset: &AssetId) -> HostResult<AccountId>;

    /// Mint new units; `minter` must be authorised by the asset.
    fn mint_to(
        &mut self,
        asset: &AssetId,
        minter: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> HostResult<()>;
}

/// The platform's native value unit.
pub trait NativeBank {
    fn native_balance(&self, who: &AccountId) -> Amount;

    fn transfer_native(&mut self, from: &AccountId, to: &AccountId, amount: Amount)
        -> HostResult<()>;
}

/// A vault that destroys asset units in exchange for a share of its backing.
pub trait CollateralVault {
    /// Burn `amount` of `asset` taken from `caller` (who must have approved
    /// the vault) and release a share of each requested kind to `recipient`.
    fn burn_for_collateral(
        &mut self,
        vault: &AccountId,
        asset: &AssetId,
        kinds: &[CollateralKind],
        amount: Amount,
        caller: &AccountId,
        recipient: &AccountId,
    ) -> HostResult<()>;

    /// What `burn_for_collateral` would release per kind, without side effects.
    fn preview_burn(
        &self,
        vault: &AccountId,
        asset: &AssetId,
        kinds: &[CollateralKind],
        amount: Amount,
    ) -> HostResult<Vec<Amount>>;
}

/// Nested all-or-nothing scopes over the collaborators' state.
pub trait Transactional {
    fn begin(&mut self);
    fn commit(&mut self) -> HostResult<()>;
    fn rollback(&mut self) -> HostResult<()>;
}

/// Everything the ledger needs from its environment.
pub trait Host: AssetContract + NativeBank + CollateralVault + Transactional {}

impl<T> Host for T where T: AssetContract + NativeBank + CollateralVault + Transactional {}

/// Run `f` inside a host transaction, committing on `Ok` and rolling back on `Err`.
pub fn with_transaction<H, R, E, F>(host: &mut H, f: F) -> Result<R, E>
where
    H: Transactional + ?Sized,
    E: From<HostError>,
    F: FnOnce(&mut H) -> Result<R, E>,
{
    host.begin();
    match f(host) {
        Ok(value) => {
            host.commit()?;
            Ok(value)
        }
        Err(err) => {
            host.rollback()?;
            Err(err)
        }
    }
}

/// Balance of any collateral kind held by `who`.
pub fn collateral_balance<H: Host + ?Sized>(host: &H, kind: &CollateralKind, who: &AccountId) -> Amount {
    match kind {
        CollateralKind::Native => host.native_balance(who),
        CollateralKind::Token(token) => host.balance_of(token, who),
    }
}

/// Move collateral out of an account the caller controls.
pub fn send_collateral<H: Host + ?Sized>(
    host: &mut H,
    kind: &CollateralKind,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
) -> HostResult<()> {
    if amount == 0 {
        return Ok(());
    }
    match kind {
        CollateralKind::Native => host.transfer_native(from, to, amount),
        CollateralKind::Token(token) => host.transfer(token, from, to, amount),
    }
}
