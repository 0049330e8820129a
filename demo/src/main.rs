//! Aegis verification engine demo CLI.
//!
//! Runs the fixture scenarios, or a decision read from a JSON file, through
//! a default engine and prints the signed results.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- scenario excessive-leverage
//!   cargo run -p demo -- verify --file decision.json --context context.json
//!   cargo run -p demo -- --config engine.toml run-all

use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aegis_contracts::{
    error::{AegisError, AegisResult},
    result::SignedVerificationResult,
};
use aegis_core::EngineConfig;
use aegis_runtime::{scenarios, AegisRuntime, EngineBuilder, ScenarioOutcome};
use aegis_validate::{parse_context, parse_decision};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Aegis: local verification of trading decisions.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Aegis verification engine demo",
    long_about = "Verifies trading decisions locally: input validation, risk scoring,\n\
                  pattern detection, jurisdiction compliance, and Ed25519-signed results."
)]
struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every fixture scenario, then print statistics and audit status.
    RunAll,
    /// Run one fixture scenario by name.
    Scenario {
        /// technical-btc-buy, guaranteed-profit-claim, excessive-leverage, reporting-threshold
        name: String,
    },
    /// Verify a decision read from a JSON file.
    Verify {
        #[arg(long)]
        file: PathBuf,
        /// Optional verification context (JSON).
        #[arg(long)]
        context: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match build_runtime(cli.config) {
        Ok(runtime) => match cli.command {
            Command::RunAll => run_all(&runtime).await,
            Command::Scenario { name } => run_scenario(&runtime, &name).await,
            Command::Verify { file, context } => verify_file(&runtime, file, context).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => println!("Done."),
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_runtime(config: Option<PathBuf>) -> AegisResult<AegisRuntime> {
    let builder = match config {
        Some(path) => EngineBuilder::from_file(&path)?,
        None => EngineBuilder::new(EngineConfig::default()),
    };
    builder.build()
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_all(runtime: &AegisRuntime) -> AegisResult<()> {
    let mut failed = 0;
    for scenario in scenarios::all() {
        let outcome = scenarios::run(runtime, &scenario).await?;
        print_outcome(scenario.summary, &outcome);
        if !outcome.passed() {
            failed += 1;
        }
    }

    let stats = runtime.engine().get_statistics();
    println!("Engine {} statistics:", stats.version);
    println!("  verifications:   {}", stats.total_verifications);
    println!("  success rate:    {:.2}", stats.success_rate);
    println!("  average latency: {:.3} ms", stats.average_latency_ms);
    for (level, count) in &stats.risk_distribution {
        println!("  {:<8} {}", level.as_str(), count);
    }
    if let Some(audit) = runtime.audit() {
        println!(
            "Audit trail {}: {} event(s), chain intact: {}",
            audit.trail_id(),
            audit.len(),
            audit.verify_integrity()
        );
    }
    println!();

    if failed > 0 {
        return Err(AegisError::analysis(
            "scenarios",
            format!("{failed} scenario(s) did not meet their expectation"),
        ));
    }
    Ok(())
}

async fn run_scenario(runtime: &AegisRuntime, name: &str) -> AegisResult<()> {
    let scenario = scenarios::by_name(name)
        .ok_or_else(|| AegisError::validation(format!("unknown scenario '{name}'")))?;
    let outcome = scenarios::run(runtime, &scenario).await?;
    print_outcome(scenario.summary, &outcome);
    Ok(())
}

async fn verify_file(
    runtime: &AegisRuntime,
    file: PathBuf,
    context: Option<PathBuf>,
) -> AegisResult<()> {
    let decision = parse_decision(&read_json(&file)?)?;
    let context = match context {
        Some(path) => Some(parse_context(&read_json(&path)?)?),
        None => None,
    };
    info!(file = %file.display(), "verifying decision from file");

    let signed = runtime.engine().verify(decision, context).await?;
    print_result(&signed);
    let rendered = serde_json::to_string_pretty(&signed)
        .map_err(|e| AegisError::validation(format!("failed to render result: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn read_json(path: &PathBuf) -> AegisResult<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| AegisError::validation(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| AegisError::validation(format!("{} is not valid JSON: {e}", path.display())))
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_outcome(summary: &str, outcome: &ScenarioOutcome) {
    let status = if outcome.passed() { "PASS" } else { "FAIL" };
    println!("[{status}] {}: {summary}", outcome.name);
    print_result(&outcome.result);
    for failure in &outcome.failures {
        println!("  ! {failure}");
    }
    println!();
}

fn print_result(signed: &SignedVerificationResult) {
    let r = &signed.result;
    println!(
        "  trust {:>6.2}  risk {:<8}  recommendation {}",
        r.trust_score,
        r.risk_level.as_str(),
        r.recommendation.as_str()
    );
    for warning in &r.warnings {
        println!("  - {warning}");
    }
    println!(
        "  signature {}…  ({:.3} ms)",
        &signed.signature.value[..16.min(signed.signature.value.len())],
        signed.processing_time_ms
    );
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Aegis: Local Decision Verification");
    println!("==================================");
    println!();
    println!("Pipeline per decision:");
    println!("  [1] Validate and sanitize the decision");
    println!("  [2] Risk, pattern, and compliance analysis run concurrently");
    println!("  [3] Aggregate into trust score, risk level, and recommendation");
    println!("  [4] Sign the result (Ed25519) and append to the audit chain");
    println!();
}
