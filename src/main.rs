use anyhow::{Context, Result};
use tokio::sync::watch;

use ohlc_collector::clock::SystemClock;
use ohlc_collector::collector::{forward_interrupt, Collector, CollectorSettings, RunSummary};
use ohlc_collector::config::{Config, LoggingConfig};
use ohlc_collector::model::bar::OhlcBar;
use ohlc_collector::model::sample::Sample;
use ohlc_collector::source::bitflyer::BitflyerRestClient;
use ohlc_collector::store::CsvLog;

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.with_ansi(false).json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set OHLC_COLLECTOR_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    // reqwest brings its own provider; a second install is harmless.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    match run(&config).await {
        Ok(summary) => {
            println!(
                "\nCollector stopped. {} window(s) closed, {} bar(s) written, {} sample(s) discarded.",
                summary.windows_closed, summary.bars_written, summary.discarded_samples
            );
            tracing::info!(?summary, "Shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Collector stopped on fatal error");
            eprintln!("\ncollector stopped: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config) -> Result<RunSummary> {
    let settings = CollectorSettings {
        product_code: config.source.product_code.clone(),
        cadence: config.collector.cadence()?,
        window: config.collector.window()?,
    };
    let source = BitflyerRestClient::new(
        &config.source.rest_base_url,
        config.source.request_timeout(),
    )
    .context("failed to build ticker client")?;
    let raw_log: CsvLog<Sample> = CsvLog::new(&config.collector.raw_ticks_path);
    let bar_log: CsvLog<OhlcBar> = CsvLog::new(&config.collector.ohlc_path);

    let collector = Collector::new(source, SystemClock, settings.clone(), raw_log, bar_log);
    collector.initialize_logs()?;
    let existing_bars = collector
        .bar_log()
        .row_count()
        .context("failed to read existing bar log")?;

    tracing::info!(
        product_code = %settings.product_code,
        rest_url = %config.source.rest_base_url,
        existing_bars,
        "Starting ohlc-collector"
    );
    println!("Collecting {} tickers", settings.product_code);
    println!(
        "Fetch interval: {:?} | Window: {:?} | OHLC output: {} | Raw ticks: {}",
        settings.cadence,
        settings.window,
        collector.bar_log().path().display(),
        collector.raw_log().path().display()
    );
    println!("Press Ctrl+C to stop.");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));

    collector.run(shutdown_rx).await
}
