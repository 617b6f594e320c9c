//! collateral-ledger CLI
//!
//! Replay lending scenarios against an in-memory world.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario file
//! collateral-ledger run --input scenario.json
//!
//! # Output as JSON
//! collateral-ledger run --input scenario.json --format json
//!
//! # Generate a random borrow / repay scenario
//! collateral-ledger generate --participants 5 --steps 40
//! ```
//!
//! Set `RUST_LOG=debug` to follow individual settlements.

use collateral_ledger::core::math::{format_units, Amount};
use collateral_ledger::ledger::engine::LedgerState;
use collateral_ledger::simulation::scenario::{
    generate_random_scenario, run_scenario, Scenario, ScenarioConfig, ScenarioRun, StepOutcome,
    StepReport,
};
use log::info;
use serde::Serialize;
use std::fs;
use std::process;

const DECIMALS: u32 = 18;

fn print_usage() {
    eprintln!(
        r#"collateral-ledger — collateral-backed lending ledger simulator

USAGE:
    collateral-ledger <COMMAND> [OPTIONS]

COMMANDS:
    run         Replay a scenario and report every step
    generate    Generate a random borrow / repay scenario
    help        Show this message

OPTIONS (run):
    --input <FILE>      Path to JSON scenario file
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --participants <N>  Number of participants (default: 5)
    --steps <N>         Number of borrow / repay calls (default: 30)
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    collateral-ledger run --input scenario.json
    collateral-ledger run --input scenario.json --format json
    collateral-ledger generate --participants 10 --steps 100 --output scenario.json"#
    );
}

/// JSON output schema for a scenario run.
#[derive(Serialize)]
struct RunOutput<'a> {
    succeeded: usize,
    failed: usize,
    outcomes: &'a [StepOutcome],
    ledger: &'a LedgerState,
}

fn load_scenario(path: &str) -> Scenario {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing scenario JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "ledger": {{ "ledger_account": "ledger", "owner": "admin", "origination_fee_rate": "0.01" }},
  "vaults": [ {{ "vault": "vault", "asset": "SHARE", "redemption_fee": "0.001",
                 "backing": [ {{ "kind": "native", "amount": 10000000000000000000 }} ] }} ],
  "balances": [ {{ "account": "alice", "kind": {{ "token": "SHARE" }}, "amount": 1000000000000000000000000 }} ],
  "steps": [ {{ "register": {{ "caller": "alice", "asset": "SHARE" }} }} ]
}}"#
        );
        process::exit(1);
    })
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

fn units(amount: Amount) -> String {
    format_units(amount, DECIMALS)
}

fn print_outcome(outcome: &StepOutcome) {
    let detail = match (&outcome.report, &outcome.error) {
        (_, Some(err)) => format!("FAILED: {}", err),
        (Some(StepReport::Registered(entry)), _) => {
            format!("{} → vault {}", entry.asset, entry.vault)
        }
        (Some(StepReport::Borrowed(receipt)), _) => {
            let parts: Vec<String> = receipt
                .settlements
                .iter()
                .map(|s| format!("{} {}", units(s.user_amount), s.kind))
                .collect();
            format!(
                "{} burned {} {} for [{}]",
                receipt.participant,
                units(receipt.amount),
                receipt.asset,
                parts.join(", ")
            )
        }
        (Some(StepReport::Repaid(receipt)), _) => {
            let parts: Vec<String> = receipt
                .returned
                .iter()
                .map(|(kind, amount)| format!("{} {}", units(*amount), kind))
                .collect();
            format!(
                "{} returned [{}] for {} {}{}",
                receipt.participant,
                parts.join(", "),
                units(receipt.tokens_minted),
                receipt.asset,
                if receipt.position_closed { " (closed)" } else { "" }
            )
        }
        (Some(StepReport::Done), _) | (None, None) => "ok".to_string(),
    };
    println!("  #{:<4} {:<14} {}", outcome.index, outcome.step, detail);
}

fn print_summary(run: &ScenarioRun, state: &LedgerState) {
    println!();
    println!("Fee rate: {}", state.origination_fee_rate());
    println!("Paused:   {}", state.is_paused());
    println!("Steps:    {} ok, {} failed", run.outcomes.len() - run.failures(), run.failures());

    let mut debts: Vec<_> = state.debts().all_debts().iter().collect();
    debts.sort_by(|a, b| a.0.cmp(b.0));
    if debts.is_empty() {
        println!("\nNo outstanding debt.");
    } else {
        println!("\nOutstanding debt:");
        for ((participant, asset, kind), amount) in debts {
            println!("  {:<20} {:<8} {:<10} {}", participant, asset, kind, units(*amount));
        }
    }

    println!("\nOpen positions: {}", state.positions().active_count());
    for entry in state.registry().assets() {
        println!(
            "  {:<8} {} burned",
            entry.asset,
            units(state.positions().total_burned(&entry.asset))
        );
    }
}

fn cmd_run(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let scenario = load_scenario(&path);
    let run = run_scenario(&scenario).unwrap_or_else(|e| {
        eprintln!("Error setting up scenario: {}", e);
        process::exit(1);
    });
    let state = run.ledger.snapshot().unwrap_or_else(|e| {
        eprintln!("Error reading ledger state: {}", e);
        process::exit(1);
    });
    info!("scenario '{}' finished with {} failed steps", path, run.failures());

    if format == "json" {
        let output = RunOutput {
            succeeded: run.outcomes.len() - run.failures(),
            failed: run.failures(),
            outcomes: &run.outcomes,
            ledger: &state,
        };
        println!("{}", to_json(&output));
    } else {
        println!("Scenario: {}", path);
        for outcome in &run.outcomes {
            print_outcome(outcome);
        }
        print_summary(&run, &state);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = ScenarioConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--participants" => {
                i += 1;
                config.participants = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--participants requires a number");
                        process::exit(1);
                    });
            }
            "--steps" => {
                i += 1;
                config.steps = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--steps requires a number");
                        process::exit(1);
                    });
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let scenario = generate_random_scenario(&config);
    let json = to_json(&scenario);

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} steps across {} participants → {}",
            scenario.steps.len(),
            config.participants,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
