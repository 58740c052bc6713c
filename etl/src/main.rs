use anyhow::Context;
use clap::Parser;
use sparkify_etl::config::{Config, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sparkify-etl")]
#[command(about = "Rebuild the Sparkify star schema from song_data and log_data", long_about = None)]
struct Cli {
    /// TOML file with the [DEFAULT] credentials and optional [paths]
    #[arg(short, long, env = "SPARKIFY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sparkify_etl=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("failed to load configuration")?;

    let summary = sparkify_etl::run(&config)
        .await
        .context("pipeline run failed")?;

    for table in &summary.tables {
        tracing::info!(
            "{}: {} rows in {} files",
            table.table,
            table.rows,
            table.files.len()
        );
    }

    Ok(())
}
