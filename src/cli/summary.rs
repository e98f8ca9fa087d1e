use anyhow::Result;
use clap::Args;

use resel_core_types::ArtifactId;
use resel_self_heal::OperatorSummary;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct SummaryArgs {
    /// Restrict to one owning artifact
    #[arg(long)]
    pub artifact: Option<String>,
}

pub async fn cmd_summary(args: SummaryArgs, ctx: &CliContext) -> Result<()> {
    let artifact = args.artifact.map(ArtifactId::new);
    let store = ctx.store().await;
    let summary = OperatorSummary::collect(store.as_ref(), artifact.as_ref()).await?;
    ctx.output().emit(&summary, print_summary)
}

fn print_summary(summary: &OperatorSummary) {
    println!("Fallback usages:    {}", summary.total_fallback_usages);
    println!("Failed resolutions: {}", summary.total_failures);
    println!("Elements affected:  {}", summary.unique_elements);
    println!("Promotions applied: {}", summary.promotions_applied);
    if summary.by_platform.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<10} {:>9} {:>9} {:>9} {:>10}",
        "PLATFORM", "FALLBACK", "FAILED", "ELEMENTS", "PROMOTED"
    );
    for (platform, row) in &summary.by_platform {
        println!(
            "{:<10} {:>9} {:>9} {:>9} {:>10}",
            platform.name(),
            row.fallback_usages,
            row.failures,
            row.elements_affected,
            row.promotions
        );
    }
}
