use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    resel_cli::cli::app::run().await
}
