use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use echohub_feed::probe::probe_hubs;
use echohub_feed::FeedAggregator;
use echohub_schema::{Echo, HubDisplay, HubEntry};
use echohub_transport::HubClient;
use echohub_transport_http::HttpHubClient;
use tracing::{debug, warn};

mod config;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "echohub", author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML, or a .env file)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Hub address to read; repeat for several hubs. Replaces configured hubs.
    #[arg(long = "hub", global = true)]
    hubs: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every hub and report which ones are usable
    Probe,
    /// Read the merged feed, newest first
    Read {
        /// Number of batches to drain before stopping
        #[arg(long, default_value_t = 1)]
        batches: usize,
        /// Echoes per batch (defaults to the configured batch size)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Print one JSON object per echo
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("ECHOHUB_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::new(cli.config).context("failed to load configuration")?;
    if !cli.hubs.is_empty() {
        config.hubs = cli.hubs.into_iter().map(HubEntry::from).collect();
    }
    let client =
        HttpHubClient::new(config.http_client_config()).context("failed to build http client")?;

    match cli.command {
        Commands::Probe => run_probe(&client, &config).await,
        Commands::Read {
            batches,
            batch_size,
            json,
        } => run_read(client, &config, batches, batch_size, json).await,
    }
}

async fn run_probe(client: &HttpHubClient, config: &CliConfig) -> Result<()> {
    let report = probe_hubs(client, &config.hubs, config.probe_timeout).await;
    let mut out = io::stdout().lock();
    for probed in &report.reachable {
        let display = HubDisplay::resolve(
            Some(&probed.info),
            &config.default_hub_name,
            &config.default_hub_logo,
        );
        writeln!(
            out,
            "ok    {}  {}  ({} echoes, {} today)",
            probed.hub, display.name, probed.info.total_echos, probed.info.today_echos
        )?;
    }
    for excluded in &report.excluded {
        writeln!(out, "fail  {}  {}", excluded.address, excluded.reason)?;
    }
    if report.reachable.is_empty() {
        writeln!(out, "{}", empty_notice(report.excluded.is_empty()))?;
    }
    Ok(())
}

async fn run_read(
    client: HttpHubClient,
    config: &CliConfig,
    batches: usize,
    batch_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let aggregator = FeedAggregator::new(client, config.aggregator_config());
    let report = aggregator.initialize(&config.hubs).await?;
    if report.excluded_count() > 0 {
        warn!(excluded = report.excluded_count(), "some hubs are unreachable");
    }
    if report.usable_count() == 0 {
        println!("{}", empty_notice(report.excluded_count() == 0));
        return Ok(());
    }

    let batch_size = batch_size.unwrap_or(config.batch_size);
    let mut out = io::stdout().lock();
    for _ in 0..batches {
        let batch = aggregator.drain(batch_size).await;
        for echo in &batch.emitted {
            if json {
                writeln!(out, "{}", serde_json::to_string(echo)?)?;
            } else {
                writeln!(out, "{}", echo_line(echo))?;
            }
        }
        if batch.end_of_feed {
            writeln!(out, "-- no more echoes --")?;
        }
        if !batch.has_more {
            break;
        }
    }

    aggregator.settle().await;
    let metrics = aggregator.client().metrics();
    debug!(
        connect_ok = metrics.connect_ok,
        connect_err = metrics.connect_err,
        page_ok = metrics.page_ok,
        page_err = metrics.page_err,
        feed_len = aggregator.feed_len(),
        "read finished"
    );
    Ok(())
}

fn empty_notice(nothing_configured: bool) -> &'static str {
    if nothing_configured {
        "no hubs configured"
    } else {
        "no hubs usable"
    }
}

fn echo_line(echo: &Echo) -> String {
    let when = DateTime::<Utc>::from_timestamp_millis(echo.created_ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| echo.created_ts.to_string());
    let content: String = echo
        .payload
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!("{when}  [{}]  {content}", echo.server_name)
}
