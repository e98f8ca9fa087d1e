pub mod app;
pub mod build;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod heal;
pub mod history;
pub mod output;
pub mod rollback;
pub mod runtime;
pub mod show;
pub mod summary;

pub use app::run;
pub use env::CliArgs;
