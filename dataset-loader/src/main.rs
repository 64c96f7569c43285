use anyhow::Result;
use clap::Parser;
use dataset_loader::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // DATAVERSE_API_TOKEN may come from a local .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    tracing::debug!("dataset-loader arguments parsed");
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "dataset-loader exited with error");
    }
    result
}
