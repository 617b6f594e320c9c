//! Scripted and randomly generated runs of the ledger against an
//! [`InMemoryHost`].
//!
//! A scenario describes the world (vaults, their backing, account
//! balances), the ledger's configuration and an ordered list of calls.
//! Failed calls are recorded as outcomes, not aborted on.

use crate::core::account::AccountId;
use crate::core::config::{ConfigError, LedgerConfig};
use crate::core::error::{HostError, LedgerError};
use crate::core::math::{Amount, FeeRate, SCALE};
use crate::core::token::{AssetId, CollateralKind, TokenId};
use crate::host::TokenLedger;
use crate::ledger::engine::LendingLedger;
use crate::ledger::registry::RegisteredAsset;
use crate::ledger::repayment::RepayReceipt;
use crate::ledger::settlement::BorrowReceipt;
use crate::simulation::memory::InMemoryHost;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("host call failed: {0}")]
    Host(#[from] HostError),
    #[error("vault {vault}: redemption fee {rate} is not a representable fraction")]
    InvalidVaultFee { vault: AccountId, rate: Decimal },
    #[error("fee rate {0} is not a representable fraction")]
    InvalidFeeRate(Decimal),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A vault, the asset it redeems and the backing it starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSetup {
    pub vault: AccountId,
    pub asset: AssetId,
    /// Fraction the vault keeps from every redemption.
    #[serde(default)]
    pub redemption_fee: Decimal,
    #[serde(default)]
    pub backing: Vec<Holding>,
}

/// An amount of some kind of value held by an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub kind: CollateralKind,
    pub amount: Amount,
}

/// Starting balance of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSetup {
    pub account: AccountId,
    pub kind: CollateralKind,
    pub amount: Amount,
}

/// One call made during a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Register {
        caller: AccountId,
        asset: AssetId,
    },
    /// Let the ledger pull `amount` of `token` from `owner`.
    Approve {
        owner: AccountId,
        token: TokenId,
        amount: Amount,
    },
    Borrow {
        participant: AccountId,
        asset: AssetId,
        amount: Amount,
        collateral_kinds: Vec<CollateralKind>,
        #[serde(default)]
        min_outputs: Vec<Amount>,
    },
    Repay {
        participant: AccountId,
        asset: AssetId,
        #[serde(default)]
        payment: Amount,
    },
    PartialRepay {
        participant: AccountId,
        asset: AssetId,
        token_amount: Amount,
        #[serde(default)]
        payment: Amount,
    },
    SetFeeRate {
        caller: AccountId,
        rate: Decimal,
    },
    Pause {
        caller: AccountId,
    },
    Unpause {
        caller: AccountId,
    },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Register { .. } => "register",
            Step::Approve { .. } => "approve",
            Step::Borrow { .. } => "borrow",
            Step::Repay { .. } => "repay",
            Step::PartialRepay { .. } => "partial_repay",
            Step::SetFeeRate { .. } => "set_fee_rate",
            Step::Pause { .. } => "pause",
            Step::Unpause { .. } => "unpause",
        }
    }
}

/// A complete scripted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub vaults: Vec<VaultSetup>,
    #[serde(default)]
    pub balances: Vec<BalanceSetup>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// What a successful step produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepReport {
    Registered(RegisteredAsset),
    Borrowed(BorrowReceipt),
    Repaid(RepayReceipt),
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: &'static str,
    pub report: Option<StepReport>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The ledger and world after a scenario has run.
pub struct ScenarioRun {
    pub ledger: LendingLedger,
    pub host: InMemoryHost,
    pub outcomes: Vec<StepOutcome>,
}

impl ScenarioRun {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

/// Build the world a scenario describes. The ledger account becomes a
/// minter of every vault's asset.
pub fn build_world(scenario: &Scenario) -> Result<InMemoryHost, ScenarioError> {
    let mut host = InMemoryHost::new();
    for setup in &scenario.vaults {
        let fee = FeeRate::from_decimal(setup.redemption_fee).ok_or_else(|| {
            ScenarioError::InvalidVaultFee {
                vault: setup.vault.clone(),
                rate: setup.redemption_fee,
            }
        })?;
        host.create_vault(setup.vault.clone(), setup.asset.clone(), fee);
        host.add_minter(&setup.asset, scenario.ledger.ledger_account.clone())?;
        for holding in &setup.backing {
            host.fund_collateral(&holding.kind, &setup.vault, holding.amount)?;
        }
    }
    for balance in &scenario.balances {
        host.fund_collateral(&balance.kind, &balance.account, balance.amount)?;
    }
    Ok(host)
}

fn apply_step(
    ledger: &LendingLedger,
    host: &mut InMemoryHost,
    ledger_account: &AccountId,
    step: &Step,
) -> Result<StepReport, ScenarioError> {
    let report = match step {
        Step::Register { caller, asset } => {
            StepReport::Registered(ledger.register(host, caller, asset)?)
        }
        Step::Approve {
            owner,
            token,
            amount,
        } => {
            host.approve(token, owner, ledger_account, *amount)?;
            StepReport::Done
        }
        Step::Borrow {
            participant,
            asset,
            amount,
            collateral_kinds,
            min_outputs,
        } => {
            // omitted minimums mean "accept anything"
            let mins = if min_outputs.is_empty() {
                vec![0; collateral_kinds.len()]
            } else {
                min_outputs.clone()
            };
            StepReport::Borrowed(ledger.borrow(
                host,
                participant,
                asset,
                *amount,
                collateral_kinds,
                &mins,
            )?)
        }
        Step::Repay {
            participant,
            asset,
            payment,
        } => StepReport::Repaid(ledger.repay(host, participant, asset, *payment)?),
        Step::PartialRepay {
            participant,
            asset,
            token_amount,
            payment,
        } => StepReport::Repaid(ledger.partial_repay(
            host,
            participant,
            asset,
            *token_amount,
            *payment,
        )?),
        Step::SetFeeRate { caller, rate } => {
            let fraction = *rate;
            let rate =
                FeeRate::from_decimal(fraction).ok_or(ScenarioError::InvalidFeeRate(fraction))?;
            ledger.set_origination_fee_rate(caller, rate)?;
            StepReport::Done
        }
        Step::Pause { caller } => {
            ledger.pause(caller)?;
            StepReport::Done
        }
        Step::Unpause { caller } => {
            ledger.unpause(caller)?;
            StepReport::Done
        }
    };
    Ok(report)
}

/// Run every step in order, recording each outcome.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioRun, ScenarioError> {
    let ledger = LendingLedger::from_config(&scenario.ledger)?;
    let mut host = build_world(scenario)?;
    let ledger_account = scenario.ledger.ledger_account.clone();

    let outcomes = scenario
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let result = apply_step(&ledger, &mut host, &ledger_account, step);
            StepOutcome {
                index,
                step: step.label(),
                error: result.as_ref().err().map(|e| e.to_string()),
                report: result.ok(),
            }
        })
        .collect();

    Ok(ScenarioRun {
        ledger,
        host,
        outcomes,
    })
}

/// Shape of a randomly generated scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub participants: usize,
    pub steps: usize,
    /// Asset units each participant starts with.
    pub asset_per_participant: Amount,
    /// Native value and collateral token each participant starts with,
    /// covering the fees owed back on repay.
    pub collateral_per_participant: Amount,
    /// Vault backing in each collateral kind.
    pub backing: Amount,
    pub origination_fee_rate: Decimal,
    pub vault_redemption_fee: Decimal,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            participants: 5,
            steps: 30,
            asset_per_participant: 100_000 * SCALE,
            collateral_per_participant: 100 * SCALE,
            backing: 10 * SCALE,
            origination_fee_rate: Decimal::new(1, 2),
            vault_redemption_fee: Decimal::new(1, 3),
        }
    }
}

/// Generate random borrow / partial repay / repay cycles against one
/// asset backed by native value and one collateral token.
pub fn generate_random_scenario(config: &ScenarioConfig) -> Scenario {
    let mut rng = rand::thread_rng();
    let asset = AssetId::new("SHARE");
    let wbtc = CollateralKind::token("WBTC");
    let kinds = vec![CollateralKind::Native, wbtc.clone()];
    let ledger = LedgerConfig {
        origination_fee_rate: config.origination_fee_rate,
        ..Default::default()
    };

    let participants: Vec<AccountId> = (0..config.participants.max(1))
        .map(|i| AccountId::new(format!("participant-{:03}", i)))
        .collect();

    let mut balances = Vec::new();
    let mut steps = vec![Step::Register {
        caller: participants[0].clone(),
        asset: asset.clone(),
    }];
    for participant in &participants {
        balances.push(BalanceSetup {
            account: participant.clone(),
            kind: CollateralKind::Token(asset.clone()),
            amount: config.asset_per_participant,
        });
        for kind in &kinds {
            balances.push(BalanceSetup {
                account: participant.clone(),
                kind: kind.clone(),
                amount: config.collateral_per_participant,
            });
        }
        for token in [asset.clone(), TokenId::new("WBTC")] {
            steps.push(Step::Approve {
                owner: participant.clone(),
                token,
                amount: Amount::MAX,
            });
        }
    }

    // sent with every repay; the unused part comes back as a refund
    let payment = config.collateral_per_participant / 2;
    // burned amount per participant, so repays stay in range
    let mut burned: Vec<Amount> = vec![0; participants.len()];
    for _ in 0..config.steps {
        let i = rng.gen_range(0..participants.len());
        let participant = participants[i].clone();
        let roll = rng.gen_range(0..10);
        if burned[i] == 0 || roll < 5 {
            let max = (config.asset_per_participant / 10).max(1);
            let amount = rng.gen_range(1..=max);
            if burned[i].saturating_add(amount) > config.asset_per_participant {
                continue;
            }
            burned[i] += amount;
            steps.push(Step::Borrow {
                participant,
                asset: asset.clone(),
                amount,
                collateral_kinds: kinds.clone(),
                min_outputs: Vec::new(),
            });
        } else if roll < 8 {
            let token_amount = rng.gen_range(1..=burned[i]);
            burned[i] -= token_amount;
            steps.push(Step::PartialRepay {
                participant,
                asset: asset.clone(),
                token_amount,
                payment,
            });
        } else {
            burned[i] = 0;
            steps.push(Step::Repay {
                participant,
                asset: asset.clone(),
                payment,
            });
        }
    }

    Scenario {
        ledger,
        vaults: vec![VaultSetup {
            vault: AccountId::new("vault"),
            asset,
            redemption_fee: config.vault_redemption_fee,
            backing: vec![
                Holding {
                    kind: CollateralKind::Native,
                    amount: config.backing,
                },
                Holding {
                    kind: wbtc,
                    amount: config.backing,
                },
            ],
        }],
        balances,
        steps,
    }
}
