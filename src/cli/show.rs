use anyhow::{Context, Result};
use clap::Args;
use resel_core_types::{SelectorCandidate, SelectorProfile};

use crate::cli::context::{profile_key, CliContext};

#[derive(Args, Clone, Debug)]
pub struct ShowArgs {
    /// Owning artifact (suite or page object)
    #[arg(long)]
    pub artifact: String,

    /// Logical element id
    #[arg(long)]
    pub element: String,
}

pub async fn cmd_show(args: ShowArgs, ctx: &CliContext) -> Result<()> {
    let key = profile_key(&args.artifact, &args.element);
    let profile = ctx
        .store()
        .await
        .get(&key)
        .await
        .with_context(|| format!("loading profile {key}"))?;
    let budget = ctx.config().resolution_budget(profile.fallbacks.len());
    ctx.output().emit(&profile, |profile| {
        print_profile(profile);
        println!("  worst-case resolution {}", humantime::format_duration(budget));
    })
}

pub(crate) fn print_profile(profile: &SelectorProfile) {
    println!(
        "{} [{}] v{} stability={}",
        profile.key(),
        profile.platform.name(),
        profile.version,
        profile.stability.name()
    );
    for (index, candidate) in profile.attempt_chain().enumerate() {
        let role = if index == 0 { "primary " } else { "fallback" };
        println!("  {index} {role} {}", describe(candidate));
    }
}

fn describe(candidate: &SelectorCandidate) -> String {
    format!(
        "{:<18} {:>3}  {}",
        candidate.strategy.name(),
        candidate.base_priority,
        candidate.value
    )
}
