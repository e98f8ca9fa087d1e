use anyhow::Result;

use super::build::cmd_build;
use super::config::cmd_config;
use super::env::CliArgs;
use super::heal::cmd_heal;
use super::history::cmd_history;
use super::rollback::cmd_rollback;
use super::show::cmd_show;
use super::summary::cmd_summary;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Build(args) => cmd_build(args, ctx).await,
        Commands::Show(args) => cmd_show(args, ctx).await,
        Commands::Heal(args) => cmd_heal(args, ctx).await,
        Commands::History(args) => cmd_history(args, ctx).await,
        Commands::Rollback(args) => cmd_rollback(args, ctx).await,
        Commands::Summary(args) => cmd_summary(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
