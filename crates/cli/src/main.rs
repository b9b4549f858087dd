use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chartsync_core::models::chart_type::ChartType;
use chartsync_core::providers::registry::{resolve_origin, ProviderRegistry};
use chartsync_core::storage::json_store::JsonPeriodStore;
use chartsync_core::ChartEngine;

/// Refresh stored period charts from a market-data provider.
#[derive(Parser)]
#[command(name = "chartsync", version, about)]
struct Cli {
    /// Asset ids to update
    #[arg(long, num_args = 1.., required = true)]
    assets: Vec<String>,

    /// Chart type to refresh: 1D, 1M, MTD, YTD, 12M or 5Y (case-insensitive)
    #[arg(long)]
    chart_type: String,

    /// Data origin: iex_cloud (alias "iex"), yahoo_finance ("yahoo"),
    /// bolsa_santiago ("bolsa")
    #[arg(long, default_value = "iex_cloud")]
    origin: String,

    /// Directory holding one JSON period document per asset
    #[arg(long, default_value = "./periods")]
    store_dir: PathBuf,

    /// Quote-API token; required for the iex_cloud origin
    #[arg(long, env = "IEX_TOKEN")]
    token: Option<String>,

    /// Chunk size for provider requests and store writes
    #[arg(long, default_value_t = 100)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let chart_type = ChartType::parse(&cli.chart_type)?;

    if resolve_origin(&cli.origin) == Some("iex_cloud") && cli.token.is_none() {
        return Err("a quote-API token is required for the iex_cloud origin (--token or IEX_TOKEN)".into());
    }

    let registry = ProviderRegistry::new_with_defaults(cli.token.as_deref());
    let store = JsonPeriodStore::new(&cli.store_dir);
    let engine =
        ChartEngine::new(registry, Box::new(store)).with_chunk_sizes(cli.chunk_size, cli.chunk_size);

    let summary = engine
        .update_charts(&cli.origin, chart_type, &cli.assets)
        .await?;

    println!(
        "{chart_type}: {} requested, {} fetched, {} updated, {} skipped (unseeded)",
        summary.requested, summary.fetched, summary.updated, summary.skipped_unseeded
    );
    Ok(())
}
