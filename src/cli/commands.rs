use clap::Subcommand;

use super::build::BuildArgs;
use super::config::ConfigArgs;
use super::heal::HealArgs;
use super::history::HistoryArgs;
use super::rollback::RollbackArgs;
use super::show::ShowArgs;
use super::summary::SummaryArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Build selector profiles from captured element records
    Build(BuildArgs),

    /// Print the stored profile of one element
    Show(ShowArgs),

    /// Feed fallback usage reports through the healing engine
    Heal(HealArgs),

    /// List retained versions of one profile
    History(HistoryArgs),

    /// Reinstate a retained version as the newest profile
    Rollback(RollbackArgs),

    /// Summarise fallback usage, failures and promotions
    Summary(SummaryArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
