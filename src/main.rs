use anyhow::Result;
use rescal::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
