//! Repay path: return owed collateral to the vault and re-mint the asset.
//!
//! A partial repay of `t` out of `B` burned returns `floor(owed * t / B)`
//! of every kind, computed against the burned total before the call. The
//! debt entry shrinks by exactly that share, so repeated partial repays
//! never drift from what was actually returned, and the last one (with
//! `t == B`) returns the remainder in full.

use crate::core::account::AccountId;
use crate::core::error::{LedgerError, LedgerResult, MathError};
use crate::core::events::EventKind;
use crate::core::math::{mul_div, Amount};
use crate::core::token::{AssetId, CollateralKind};
use crate::host::{send_collateral, Host};
use crate::ledger::engine::LedgerState;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Outcome of a committed repay or partial repay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayReceipt {
    pub participant: AccountId,
    pub asset: AssetId,
    pub tokens_minted: Amount,
    /// Collateral moved back to the vault, per kind with a non-zero share.
    pub returned: Vec<(CollateralKind, Amount)>,
    /// Native value handed back from `payment_supplied`.
    pub refund: Amount,
    pub position_closed: bool,
}

/// Per-kind shares a partial repay of `token_amount` would return.
pub(crate) fn partial_shares(
    state: &LedgerState,
    participant: &AccountId,
    asset: &AssetId,
    token_amount: Amount,
) -> LedgerResult<Vec<(CollateralKind, Amount)>> {
    if token_amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    let position = state.positions.active(participant, asset)?;
    let burned = position.tokens_burned;
    if token_amount > burned {
        return Err(LedgerError::ExceedsBorrowed {
            requested: token_amount,
            burned,
        });
    }

    let mut shares = Vec::new();
    for kind in &position.collateral_kinds {
        let owed = state.debts.owed(participant, asset, kind);
        if owed == 0 {
            continue;
        }
        let share = mul_div(owed, token_amount, burned)?;
        if share > 0 {
            shares.push((kind.clone(), share));
        }
    }
    Ok(shares)
}

/// Clear the participant's whole position.
pub(crate) fn repay<H: Host + ?Sized>(
    state: &mut LedgerState,
    host: &mut H,
    participant: &AccountId,
    asset: &AssetId,
    payment_supplied: Amount,
) -> LedgerResult<RepayReceipt> {
    state.ensure_not_paused()?;
    let position = state.positions.active(participant, asset)?;
    let tokens_burned = position.tokens_burned;
    let shares: Vec<(CollateralKind, Amount)> = position
        .collateral_kinds
        .iter()
        .map(|kind| (kind.clone(), state.debts.owed(participant, asset, kind)))
        .filter(|(_, owed)| *owed > 0)
        .collect();

    let refund = return_collateral(state, host, participant, asset, &shares, payment_supplied)?;
    host.mint_to(asset, &state.ledger_account, participant, tokens_burned)?;

    state.positions.entry(participant, asset).close();
    state.positions.prune(participant, asset);

    info!("{participant} repaid {tokens_burned} {asset} in full");
    state.emit(EventKind::Repaid {
        participant: participant.clone(),
        asset: asset.clone(),
        tokens_minted: tokens_burned,
    });

    Ok(RepayReceipt {
        participant: participant.clone(),
        asset: asset.clone(),
        tokens_minted: tokens_burned,
        returned: shares,
        refund,
        position_closed: true,
    })
}

/// Restore `token_amount` of the burned asset against a proportional share of the debt.
pub(crate) fn partial_repay<H: Host + ?Sized>(
    state: &mut LedgerState,
    host: &mut H,
    participant: &AccountId,
    asset: &AssetId,
    token_amount: Amount,
    payment_supplied: Amount,
) -> LedgerResult<RepayReceipt> {
    state.ensure_not_paused()?;
    let shares = partial_shares(state, participant, asset, token_amount)?;

    let refund = return_collateral(state, host, participant, asset, &shares, payment_supplied)?;
    host.mint_to(asset, &state.ledger_account, participant, token_amount)?;

    let position = state.positions.entry(participant, asset);
    position.record_repay(token_amount)?;
    let position_closed = !position.active;
    if position_closed {
        // repaying the whole burned amount returned each remaining debt in full
        state.positions.prune(participant, asset);
    }

    info!("{participant} partially repaid {token_amount} {asset}");
    state.emit(EventKind::PartialRepaid {
        participant: participant.clone(),
        asset: asset.clone(),
        tokens_minted: token_amount,
    });

    Ok(RepayReceipt {
        participant: participant.clone(),
        asset: asset.clone(),
        tokens_minted: token_amount,
        returned: shares,
        refund,
        position_closed,
    })
}

/// Take each share from the participant, forward it to the vault and shrink
/// the debt by exactly that share. Returns the native value refunded.
fn return_collateral<H: Host + ?Sized>(
    state: &mut LedgerState,
    host: &mut H,
    participant: &AccountId,
    asset: &AssetId,
    shares: &[(CollateralKind, Amount)],
    payment_supplied: Amount,
) -> LedgerResult<Amount> {
    let vault = state.registry.vault_of(asset)?.clone();
    let ledger = state.ledger_account.clone();

    let native_required: Amount = shares
        .iter()
        .filter(|(kind, _)| kind.is_native())
        .map(|(_, amount)| *amount)
        .sum();
    if native_required > payment_supplied {
        return Err(LedgerError::InsufficientPayment {
            required: native_required,
            supplied: payment_supplied,
        });
    }
    if payment_supplied > 0 {
        host.transfer_native(participant, &ledger, payment_supplied)?;
    }

    for (kind, amount) in shares {
        debug!("repay {participant}/{asset} {kind}: returning {amount}");
        if let CollateralKind::Token(token) = kind {
            host.transfer_from(token, &ledger, participant, &ledger, *amount)?;
        }
        send_collateral(host, kind, &ledger, &vault, *amount)?;
        state.debts.decrease(participant, asset, kind, *amount)?;
    }

    let refund = payment_supplied
        .checked_sub(native_required)
        .ok_or(MathError::Underflow)?;
    if refund > 0 {
        host.transfer_native(&ledger, participant, refund)?;
    }
    Ok(refund)
}
