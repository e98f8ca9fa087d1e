use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use resel_core_types::{FallbackUsageReport, HealingRecord};
use resel_self_heal::HealingEngine;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct HealArgs {
    /// Fallback usage reports, one JSON object per line
    #[arg(long, value_name = "FILE")]
    pub reports: PathBuf,
}

#[derive(Debug, Default, Serialize)]
struct HealOutcome {
    consumed: usize,
    skipped: usize,
    /// Reports the engine could not apply, e.g. for unknown profiles.
    failed: usize,
    promotions: Vec<HealingRecord>,
}

pub async fn cmd_heal(args: HealArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.reports)
        .await
        .with_context(|| format!("reading {}", args.reports.display()))?;

    let engine = HealingEngine::new(ctx.store().await, ctx.config().heal_policy());
    let outcome = consume(&engine, &raw).await;

    ctx.output().emit(&outcome, |outcome| {
        println!(
            "Consumed {} reports ({} unreadable, {} failed), {} promotions",
            outcome.consumed,
            outcome.skipped,
            outcome.failed,
            outcome.promotions.len()
        );
        for record in &outcome.promotions {
            println!(
                "  {} v{} -> v{}: {} replaces {}",
                record.key(),
                record.old_profile_version,
                record.new_profile_version,
                record.promoted_strategy.name(),
                record.demoted_strategy.name()
            );
        }
    })
}

async fn consume(engine: &HealingEngine, raw: &str) -> HealOutcome {
    let mut outcome = HealOutcome::default();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let report: FallbackUsageReport = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping unreadable report");
                outcome.skipped += 1;
                continue;
            }
        };
        outcome.consumed += 1;
        let key = report.key();
        match engine.handle_report(report).await {
            Ok(Some(record)) => {
                info!(
                    key = %record.key(),
                    promoted = record.promoted_strategy.name(),
                    version = record.new_profile_version,
                    "promoted fallback"
                );
                outcome.promotions.push(record);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(line = index + 1, key = %key, error = %err, "report not applied");
                outcome.failed += 1;
            }
        }
    }
    outcome
}
