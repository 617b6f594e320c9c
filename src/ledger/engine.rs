use crate::core::account::AccountId;
use crate::core::config::{ConfigError, LedgerConfig};
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::events::{EventKind, LedgerEvent};
use crate::core::math::{Amount, FeeRate, MAX_ORIGINATION_FEE_RATE};
use crate::core::token::{AssetId, CollateralKind};
use crate::host::{with_transaction, Host};
use crate::ledger::debt::DebtLedger;
use crate::ledger::position::PositionStore;
use crate::ledger::registry::{RegisteredAsset, Registry};
use crate::ledger::repayment::{self, RepayReceipt};
use crate::ledger::settlement::{self, BorrowPreview, BorrowReceipt};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Everything the ledger owns. Forked at the start of each mutating call
/// and swapped back in only when the call succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub(crate) ledger_account: AccountId,
    pub(crate) owner: AccountId,
    pub(crate) origination_fee_rate: FeeRate,
    pub(crate) paused: bool,
    pub(crate) registry: Registry,
    pub(crate) positions: PositionStore,
    pub(crate) debts: DebtLedger,
    pub(crate) events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub(crate) fn ensure_not_paused(&self) -> LedgerResult<()> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &AccountId) -> LedgerResult<()> {
        if caller != &self.owner {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Working copy for one call. The event log is not copied; the fork
    /// only collects the call's own events.
    fn fork(&self) -> Self {
        Self {
            ledger_account: self.ledger_account.clone(),
            owner: self.owner.clone(),
            origination_fee_rate: self.origination_fee_rate,
            paused: self.paused,
            registry: self.registry.clone(),
            positions: self.positions.clone(),
            debts: self.debts.clone(),
            events: Vec::new(),
        }
    }

    fn commit(&mut self, mut working: Self) {
        let mut events = std::mem::take(&mut self.events);
        events.append(&mut working.events);
        working.events = events;
        *self = working;
    }

    pub(crate) fn emit(&mut self, kind: EventKind) {
        self.events.push(LedgerEvent::new(kind));
    }

    pub fn ledger_account(&self) -> &AccountId {
        &self.ledger_account
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn origination_fee_rate(&self) -> FeeRate {
        self.origination_fee_rate
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn debts(&self) -> &DebtLedger {
        &self.debts
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }
}

/// A participant's position as seen from outside the ledger.
///
/// `collateral_amounts` is aligned with `collateral_kinds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanView {
    pub tokens_burned: Amount,
    pub collateral_kinds: Vec<CollateralKind>,
    pub collateral_amounts: Vec<Amount>,
    pub active: bool,
}

fn check_fee_rate(rate: FeeRate) -> LedgerResult<()> {
    if rate > MAX_ORIGINATION_FEE_RATE {
        return Err(LedgerError::FeeTooHigh {
            rate,
            max: MAX_ORIGINATION_FEE_RATE,
        });
    }
    Ok(())
}

/// The collateral-backed lending ledger.
///
/// One lock covers the whole ledger. Calls never wait for it: a call that
/// finds it held (a collaborator calling back into the ledger mid-call)
/// fails with [`LedgerError::Reentrant`]. Every mutating call either
/// commits all of its effects, ledger and host alike, or none of them.
///
/// # Examples
///
/// ```
/// use collateral_ledger::prelude::*;
///
/// let ledger = LendingLedger::new(
///     AccountId::new("ledger"),
///     AccountId::new("admin"),
///     FeeRate::from_raw(SCALE / 100),
/// ).unwrap();
/// assert_eq!(ledger.origination_fee_rate().unwrap().to_string(), "1%");
/// ```
#[derive(Debug)]
pub struct LendingLedger {
    state: Mutex<LedgerState>,
}

impl LendingLedger {
    pub fn new(ledger_account: AccountId, owner: AccountId, fee_rate: FeeRate) -> LedgerResult<Self> {
        check_fee_rate(fee_rate)?;
        Ok(Self {
            state: Mutex::new(LedgerState {
                ledger_account,
                owner,
                origination_fee_rate: fee_rate,
                paused: false,
                registry: Registry::new(),
                positions: PositionStore::new(),
                debts: DebtLedger::new(),
                events: Vec::new(),
            }),
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        let ledger = Self::new(
            config.ledger_account.clone(),
            config.owner.clone(),
            config.fee_rate()?,
        )?;
        if config.paused {
            ledger.lock()?.paused = true;
        }
        Ok(ledger)
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            // state is only replaced after a call succeeds, so a panicked
            // holder left the last committed state behind
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                warn!("rejected re-entrant ledger call");
                Err(LedgerError::Reentrant)
            }
        }
    }

    /// Run a mutating call against a working copy and a host transaction.
    fn transact<H, R, F>(&self, host: &mut H, call: &str, f: F) -> LedgerResult<R>
    where
        H: Host + ?Sized,
        F: FnOnce(&mut LedgerState, &mut H) -> LedgerResult<R>,
    {
        let mut guard = self.lock()?;
        let mut working = guard.fork();
        match with_transaction(host, |host| f(&mut working, host)) {
            Ok(value) => {
                guard.commit(working);
                Ok(value)
            }
            Err(err) => {
                warn!("{call} rolled back: {err}");
                Err(err)
            }
        }
    }

    /// Run an administrative call that touches no collaborator.
    fn update<R, F>(&self, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&mut LedgerState) -> LedgerResult<R>,
    {
        let mut guard = self.lock()?;
        let mut working = guard.fork();
        let value = f(&mut working)?;
        guard.commit(working);
        Ok(value)
    }

    // --- registry ---

    /// Register `asset` against the vault its own contract names. Anyone may call.
    pub fn register<H: Host + ?Sized>(
        &self,
        host: &mut H,
        caller: &AccountId,
        asset: &AssetId,
    ) -> LedgerResult<RegisteredAsset> {
        self.transact(host, "register", |state, host| {
            state.ensure_not_paused()?;
            if state.registry.is_registered(asset) {
                return Err(LedgerError::AlreadyRegistered(asset.clone()));
            }
            let vault = host.vault_of(asset)?;
            let entry = state.registry.register(asset.clone(), vault)?.clone();
            info!("{caller} registered {asset} against vault {}", entry.vault);
            state.emit(EventKind::AssetRegistered {
                asset: entry.asset.clone(),
                vault: entry.vault.clone(),
                by: caller.clone(),
            });
            Ok(entry)
        })
    }

    // --- participant operations ---

    /// Burn `amount` of `asset` for collateral; see [`BorrowReceipt`].
    pub fn borrow<H: Host + ?Sized>(
        &self,
        host: &mut H,
        participant: &AccountId,
        asset: &AssetId,
        amount: Amount,
        collateral_kinds: &[CollateralKind],
        min_outputs: &[Amount],
    ) -> LedgerResult<BorrowReceipt> {
        self.transact(host, "borrow", |state, host| {
            settlement::borrow(
                state,
                host,
                participant,
                asset,
                amount,
                collateral_kinds,
                min_outputs,
            )
        })
    }

    /// Return all owed collateral and get the whole burned amount re-minted.
    ///
    /// `payment_supplied` is native value sent with the call; whatever the
    /// native debt does not consume is refunded.
    pub fn repay<H: Host + ?Sized>(
        &self,
        host: &mut H,
        participant: &AccountId,
        asset: &AssetId,
        payment_supplied: Amount,
    ) -> LedgerResult<RepayReceipt> {
        self.transact(host, "repay", |state, host| {
            repayment::repay(state, host, participant, asset, payment_supplied)
        })
    }

    /// Return a proportional share of owed collateral for `token_amount` re-minted.
    pub fn partial_repay<H: Host + ?Sized>(
        &self,
        host: &mut H,
        participant: &AccountId,
        asset: &AssetId,
        token_amount: Amount,
        payment_supplied: Amount,
    ) -> LedgerResult<RepayReceipt> {
        self.transact(host, "partial_repay", |state, host| {
            repayment::partial_repay(state, host, participant, asset, token_amount, payment_supplied)
        })
    }

    // --- read-only ---

    pub fn preview_borrow<H: Host + ?Sized>(
        &self,
        host: &H,
        asset: &AssetId,
        amount: Amount,
        collateral_kinds: &[CollateralKind],
    ) -> LedgerResult<BorrowPreview> {
        let state = self.lock()?;
        settlement::preview_borrow(&state, host, asset, amount, collateral_kinds)
    }

    /// Collateral a partial repay of `token_amount` would take, per kind.
    pub fn preview_partial_repay(
        &self,
        participant: &AccountId,
        asset: &AssetId,
        token_amount: Amount,
    ) -> LedgerResult<Vec<(CollateralKind, Amount)>> {
        let state = self.lock()?;
        repayment::partial_shares(&state, participant, asset, token_amount)
    }

    pub fn get_loan_position(&self, participant: &AccountId, asset: &AssetId) -> LedgerResult<LoanView> {
        let state = self.lock()?;
        let view = match state.positions.get(participant, asset).filter(|p| p.active) {
            Some(position) => LoanView {
                tokens_burned: position.tokens_burned,
                collateral_amounts: state.debts.owed_for(
                    participant,
                    asset,
                    &position.collateral_kinds,
                ),
                collateral_kinds: position.collateral_kinds.clone(),
                active: true,
            },
            None => LoanView {
                tokens_burned: 0,
                collateral_kinds: Vec::new(),
                collateral_amounts: Vec::new(),
                active: false,
            },
        };
        Ok(view)
    }

    pub fn registered_asset(&self, asset: &AssetId) -> LedgerResult<Option<RegisteredAsset>> {
        Ok(self.lock()?.registry.get(asset).cloned())
    }

    pub fn origination_fee_rate(&self) -> LedgerResult<FeeRate> {
        Ok(self.lock()?.origination_fee_rate)
    }

    pub fn is_paused(&self) -> LedgerResult<bool> {
        Ok(self.lock()?.paused)
    }

    pub fn owner(&self) -> LedgerResult<AccountId> {
        Ok(self.lock()?.owner.clone())
    }

    pub fn ledger_account(&self) -> LedgerResult<AccountId> {
        Ok(self.lock()?.ledger_account.clone())
    }

    pub fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
        Ok(self.lock()?.events.clone())
    }

    /// A copy of the full committed state.
    pub fn snapshot(&self) -> LedgerResult<LedgerState> {
        Ok(self.lock()?.clone())
    }

    // --- administration ---

    pub fn set_origination_fee_rate(&self, caller: &AccountId, rate: FeeRate) -> LedgerResult<()> {
        self.update(|state| {
            state.ensure_owner(caller)?;
            check_fee_rate(rate)?;
            let old = state.origination_fee_rate;
            state.origination_fee_rate = rate;
            info!("origination fee rate {old} -> {rate}");
            state.emit(EventKind::OriginationFeeRateUpdated { old, new: rate });
            Ok(())
        })
    }

    pub fn pause(&self, caller: &AccountId) -> LedgerResult<()> {
        self.update(|state| {
            state.ensure_owner(caller)?;
            if state.paused {
                return Err(LedgerError::AlreadyPaused);
            }
            state.paused = true;
            info!("ledger paused by {caller}");
            state.emit(EventKind::Paused { by: caller.clone() });
            Ok(())
        })
    }

    pub fn unpause(&self, caller: &AccountId) -> LedgerResult<()> {
        self.update(|state| {
            state.ensure_owner(caller)?;
            if !state.paused {
                return Err(LedgerError::NotPaused);
            }
            state.paused = false;
            info!("ledger unpaused by {caller}");
            state.emit(EventKind::Unpaused { by: caller.clone() });
            Ok(())
        })
    }

    pub fn transfer_ownership(&self, caller: &AccountId, new_owner: AccountId) -> LedgerResult<()> {
        self.update(|state| {
            state.ensure_owner(caller)?;
            let previous = std::mem::replace(&mut state.owner, new_owner.clone());
            info!("ownership {previous} -> {new_owner}");
            state.emit(EventKind::OwnershipTransferred {
                previous,
                new: new_owner,
            });
            Ok(())
        })
    }
}
