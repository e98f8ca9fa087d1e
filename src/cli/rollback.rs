use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::show::print_profile;
use crate::cli::context::{profile_key, CliContext};

#[derive(Args, Clone, Debug)]
pub struct RollbackArgs {
    #[arg(long)]
    pub artifact: String,

    #[arg(long)]
    pub element: String,

    /// Retained version to reinstate
    #[arg(long)]
    pub version: u64,
}

pub async fn cmd_rollback(args: RollbackArgs, ctx: &CliContext) -> Result<()> {
    let key = profile_key(&args.artifact, &args.element);
    let restored = ctx
        .store()
        .await
        .restore(&key, args.version)
        .await
        .with_context(|| format!("restoring {key} from v{}", args.version))?;
    info!(
        key = %key,
        from = args.version,
        version = restored.version,
        "rolled back profile"
    );
    ctx.output().emit(&restored, |profile| {
        println!("Restored v{} as v{}", args.version, profile.version);
        print_profile(profile);
    })
}
