//! Borrow path: burn the participant's asset at the vault, skim the
//! origination fee from what the vault released and record the debt.

use crate::core::account::AccountId;
use crate::core::error::{HostError, LedgerError, LedgerResult, MathError};
use crate::core::events::EventKind;
use crate::core::math::{split_fee, Amount};
use crate::core::token::{AssetId, CollateralKind};
use crate::host::{collateral_balance, send_collateral, Host};
use crate::ledger::engine::LedgerState;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How one collateral kind's release was divided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralSettlement {
    pub kind: CollateralKind,
    /// Measured by balance delta on the ledger's custody account.
    pub received: Amount,
    /// Sent back to the vault.
    pub fee: Amount,
    /// Sent to the participant.
    pub user_amount: Amount,
}

/// Outcome of a committed borrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowReceipt {
    pub participant: AccountId,
    pub asset: AssetId,
    pub amount: Amount,
    pub settlements: Vec<CollateralSettlement>,
    pub total_fee: Amount,
}

impl BorrowReceipt {
    pub fn user_amounts(&self) -> Vec<Amount> {
        self.settlements.iter().map(|s| s.user_amount).collect()
    }

    pub fn fees(&self) -> Vec<Amount> {
        self.settlements.iter().map(|s| s.fee).collect()
    }
}

/// Expected per-kind payout of a borrow, aligned with the requested kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowPreview {
    pub user_amounts: Vec<Amount>,
    pub fees: Vec<Amount>,
}

/// Reject malformed kind lists before anything external happens.
pub(crate) fn validate_kinds(kinds: &[CollateralKind]) -> LedgerResult<()> {
    if kinds.is_empty() {
        return Err(LedgerError::EmptyCollateralList);
    }
    let mut seen = HashSet::with_capacity(kinds.len());
    for kind in kinds {
        if !seen.insert(kind) {
            return Err(LedgerError::DuplicateCollateralKind(kind.clone()));
        }
    }
    Ok(())
}

pub(crate) fn validate_borrow(
    amount: Amount,
    kinds: &[CollateralKind],
    min_outputs: &[Amount],
) -> LedgerResult<()> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    validate_kinds(kinds)?;
    if kinds.len() != min_outputs.len() {
        return Err(LedgerError::LengthMismatch {
            kinds: kinds.len(),
            min_outputs: min_outputs.len(),
        });
    }
    Ok(())
}

/// Burn `amount` of `asset` for `participant` and settle the released collateral.
///
/// Must run inside a host transaction on a working copy of the state: an
/// error part-way through leaves both dirty.
pub(crate) fn borrow<H: Host + ?Sized>(
    state: &mut LedgerState,
    host: &mut H,
    participant: &AccountId,
    asset: &AssetId,
    amount: Amount,
    kinds: &[CollateralKind],
    min_outputs: &[Amount],
) -> LedgerResult<BorrowReceipt> {
    state.ensure_not_paused()?;
    validate_borrow(amount, kinds, min_outputs)?;
    let vault = state.registry.vault_of(asset)?.clone();
    if let Some(position) = state.positions.get(participant, asset) {
        position.accepts(kinds)?;
    }

    let ledger = state.ledger_account.clone();
    let before: Vec<Amount> = kinds
        .iter()
        .map(|kind| collateral_balance(host, kind, &ledger))
        .collect();

    host.transfer_from(asset, &ledger, participant, &ledger, amount)?;
    host.approve(asset, &ledger, &vault, amount)?;
    host.burn_for_collateral(&vault, asset, kinds, amount, &ledger, &ledger)?;

    let mut received = Vec::with_capacity(kinds.len());
    for (kind, before) in kinds.iter().zip(&before) {
        let after = collateral_balance(host, kind, &ledger);
        let delta = after.checked_sub(*before).ok_or_else(|| {
            HostError::Rejected(format!("vault burn reduced ledger balance of {kind}"))
        })?;
        received.push(delta);
    }

    let rate = state.origination_fee_rate;
    let mut settlements = Vec::with_capacity(kinds.len());
    let mut total_fee: Amount = 0;
    for (index, (kind, received)) in kinds.iter().zip(received).enumerate() {
        let (fee, user_amount) = split_fee(received, rate)?;
        let minimum = min_outputs[index];
        if user_amount < minimum {
            return Err(LedgerError::SlippageExceeded {
                index,
                received: user_amount,
                minimum,
            });
        }
        if received == 0 {
            // nothing released for this kind
            continue;
        }
        debug!(
            "borrow {participant}/{asset} {kind}: received {received}, fee {fee}, user {user_amount}"
        );
        send_collateral(host, kind, &ledger, &vault, fee)?;
        send_collateral(host, kind, &ledger, participant, user_amount)?;
        state.debts.increase(participant, asset, kind, received)?;
        total_fee = total_fee.checked_add(fee).ok_or(MathError::Overflow)?;
        settlements.push(CollateralSettlement {
            kind: kind.clone(),
            received,
            fee,
            user_amount,
        });
    }

    state
        .positions
        .entry(participant, asset)
        .record_borrow(kinds, amount)?;

    info!("{participant} borrowed against {amount} {asset}, fee {total_fee}");
    state.emit(EventKind::Borrowed {
        participant: participant.clone(),
        asset: asset.clone(),
        amount,
        total_fee,
    });

    Ok(BorrowReceipt {
        participant: participant.clone(),
        asset: asset.clone(),
        amount,
        settlements,
        total_fee,
    })
}

/// What a borrow would pay out right now, split the same way as [`borrow`].
pub(crate) fn preview_borrow<H: Host + ?Sized>(
    state: &LedgerState,
    host: &H,
    asset: &AssetId,
    amount: Amount,
    kinds: &[CollateralKind],
) -> LedgerResult<BorrowPreview> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    validate_kinds(kinds)?;
    let vault = state.registry.vault_of(asset)?;
    let raw = host.preview_burn(vault, asset, kinds, amount)?;
    if raw.len() != kinds.len() {
        return Err(HostError::Rejected(format!(
            "vault previewed {} kinds, {} requested",
            raw.len(),
            kinds.len()
        ))
        .into());
    }

    let mut preview = BorrowPreview {
        user_amounts: Vec::with_capacity(raw.len()),
        fees: Vec::with_capacity(raw.len()),
    };
    for released in raw {
        let (fee, user_amount) = split_fee(released, state.origination_fee_rate)?;
        preview.fees.push(fee);
        preview.user_amounts.push(user_amount);
    }
    Ok(preview)
}
