//! A full borrow / partial repay / repay cycle.
//!
//! Alice holds the entire supply of a vault-backed share, borrows
//! collateral against a tenth of it and then gives it back in two steps.

use collateral_ledger::core::math::format_units;
use collateral_ledger::prelude::*;
use rust_decimal_macros::dec;

fn units(amount: Amount) -> String {
    format_units(amount, 18)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("╔═══════════════════════════════════════════════╗");
    println!("║  collateral-ledger: Borrow / Repay Cycle      ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let config = LedgerConfig {
        origination_fee_rate: dec!(0.01),
        ..Default::default()
    };
    let ledger = LendingLedger::from_config(&config)?;

    let alice = AccountId::new("alice");
    let vault = AccountId::new("vault");
    let share = AssetId::new("SHARE");
    let wbtc = TokenId::new("WBTC");

    let mut host = InMemoryHost::new();
    host.create_vault(vault.clone(), share.clone(), FeeRate::from_raw(SCALE / 1000));
    host.add_minter(&share, config.ledger_account.clone())?;
    host.mint(&share, &alice, 1_000_000 * SCALE)?;
    host.fund_native(&vault, 10 * SCALE)?;
    host.mint(&wbtc, &vault, 2 * SCALE)?;
    host.fund_native(&alice, SCALE)?;
    host.mint(&wbtc, &alice, SCALE / 10)?;
    host.approve(&share, &alice, &config.ledger_account, Amount::MAX)?;
    host.approve(&wbtc, &alice, &config.ledger_account, Amount::MAX)?;

    println!("Vault backing:  10 native, 2 WBTC");
    println!("Share supply:   1,000,000 (all held by alice)");
    println!("Vault fee:      0.1%   Origination fee: {}\n", ledger.origination_fee_rate()?);

    ledger.register(&mut host, &alice, &share)?;

    println!("━━━ Borrow ━━━\n");
    let kinds = vec![CollateralKind::Native, CollateralKind::Token(wbtc.clone())];
    let burn = 100_000 * SCALE;
    let preview = ledger.preview_borrow(&host, &share, burn, &kinds)?;
    let receipt = ledger.borrow(&mut host, &alice, &share, burn, &kinds, &preview.user_amounts)?;
    for s in &receipt.settlements {
        println!(
            "  {:<7} received {:>8}  fee {:>10}  to alice {:>10}",
            s.kind.to_string(),
            units(s.received),
            units(s.fee),
            units(s.user_amount)
        );
    }
    let view = ledger.get_loan_position(&alice, &share)?;
    println!("\n  Burned: {}  Owed: {:?}", units(view.tokens_burned), view.collateral_amounts);

    println!("\n━━━ Partial repay (40%) ━━━\n");
    let part = ledger.partial_repay(&mut host, &alice, &share, burn * 2 / 5, SCALE)?;
    for (kind, amount) in &part.returned {
        println!("  returned {:>10} {}", units(*amount), kind);
    }
    println!("  re-minted {} SHARE, refund {}", units(part.tokens_minted), units(part.refund));

    println!("\n━━━ Full repay ━━━\n");
    let rest = ledger.repay(&mut host, &alice, &share, SCALE)?;
    for (kind, amount) in &rest.returned {
        println!("  returned {:>10} {}", units(*amount), kind);
    }
    println!("  re-minted {} SHARE, position closed: {}", units(rest.tokens_minted), rest.position_closed);

    println!("\n━━━ Net effect ━━━\n");
    println!("  Alice native: {} (started with 1)", units(host.native_balance(&alice)));
    println!("  Alice WBTC:   {} (started with 0.1)", units(host.balance_of(&wbtc, &alice)));
    println!("  Vault native: {}", units(host.native_balance(&vault)));
    println!("  Vault WBTC:   {}", units(host.balance_of(&wbtc, &vault)));
    println!("  Events:       {}", ledger.events()?.len());

    println!("\n  Alice paid the origination fee on each kind; the vault kept it.");
    Ok(())
}
