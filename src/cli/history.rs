use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use resel_profile_store::BackupHandle;

use crate::cli::context::{profile_key, CliContext};

#[derive(Args, Clone, Debug)]
pub struct HistoryArgs {
    #[arg(long)]
    pub artifact: String,

    #[arg(long)]
    pub element: String,
}

#[derive(Serialize)]
struct History {
    key: String,
    current_version: u64,
    backups: Vec<BackupHandle>,
}

pub async fn cmd_history(args: HistoryArgs, ctx: &CliContext) -> Result<()> {
    let key = profile_key(&args.artifact, &args.element);
    let store = ctx.store().await;
    let current = store
        .get(&key)
        .await
        .with_context(|| format!("loading profile {key}"))?;
    let backups = store.history(&key).await?;
    let history = History {
        key: key.to_string(),
        current_version: current.version,
        backups,
    };
    ctx.output().emit(&history, |history| {
        println!("{} current v{}", history.key, history.current_version);
        if history.backups.is_empty() {
            println!("  no retained versions");
        }
        for backup in &history.backups {
            println!(
                "  v{:<4} {}  {}",
                backup.version,
                backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                backup.path
            );
        }
    })
}
