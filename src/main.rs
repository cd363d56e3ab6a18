mod client;
mod config;
mod harvester;
mod model;
mod store;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{client::CmcClient, config::Settings};

#[derive(Debug, Parser)]
#[command(name = "coinharvest", version)]
struct Cli {
    /// Override HARVEST_CYCLES
    #[arg(long)]
    cycles: Option<u32>,

    /// Override HARVEST_DELAY_SECS
    #[arg(long)]
    delay_secs: Option<u64>,

    /// Override HARVEST_OUTPUT
    #[arg(long)]
    output: Option<String>,

    /// Override CMC_LIMIT
    #[arg(long)]
    limit: Option<u32>,

    /// Override CMC_CONVERT
    #[arg(long)]
    convert: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(c) = cli.cycles {
        settings.cycles = c;
    }
    if let Some(d) = cli.delay_secs {
        settings.delay_secs = d;
    }
    if let Some(o) = cli.output {
        settings.output_path = o;
    }
    if let Some(l) = cli.limit {
        settings.limit = l;
    }
    if let Some(c) = cli.convert {
        settings.convert = c.to_uppercase();
    }
    settings.validate()?;

    log::info!(
        "app.start cycles={} delay_secs={} limit={} convert={} output={}",
        settings.cycles,
        settings.delay_secs,
        settings.limit,
        settings.convert,
        settings.output_path
    );

    let client = CmcClient::new(&settings).context("building HTTP client")?;
    let table = harvester::run(&settings, &client).await?;

    table
        .write_csv(&settings.output_path)
        .context("writing CSV snapshot")?;
    log::info!(
        "app.done rows={} output={}",
        table.len(),
        settings.output_path
    );
    Ok(())
}
