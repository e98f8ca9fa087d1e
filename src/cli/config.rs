use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::output::OutputFormat;
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration, flags applied
    Show,

    /// Print the configuration file location
    Path,
}

#[derive(Serialize)]
struct ConfigPath {
    path: String,
    exists: bool,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => match ctx.output() {
            OutputFormat::Human => {
                println!("Current configuration ({}):", path.display());
                print!("{}", serde_yaml::to_string(ctx.config())?);
            }
            format => format.emit(ctx.config(), |_| {})?,
        },
        ConfigAction::Path => {
            let info = ConfigPath {
                path: path.display().to_string(),
                exists: path.exists(),
            };
            ctx.output().emit(&info, |info| {
                if info.exists {
                    println!("{}", info.path);
                } else {
                    println!("{} (not found, defaults in use)", info.path);
                }
            })?;
        }
    }
    Ok(())
}
