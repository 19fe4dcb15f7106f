use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod browser;
mod config;
mod contact_links;
mod domain;
mod enrichment;
mod error;
mod input;
mod models;
mod output;
mod patterns;
mod pipeline;
mod retry;
mod schema_org;
mod scraper;
mod store;
#[cfg(test)]
mod test_support;

use browser::ChromeRenderer;
use config::{AppArgs, Command, ScrapeArgs, build_config};
use enrichment::{EnrichmentProvider, HunterClient};
use pipeline::Pipeline;
use store::ResultStore;

/// Console logging plus, unless disabled, a daily log file. `RUST_LOG` wins over `--log-level`.
fn init_logging(args: &AppArgs, today: NaiveDate) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let file_layer = if args.no_log_file {
        None
    } else {
        fs::create_dir_all(&args.log_dir)
            .with_context(|| format!("creating log directory {}", args.log_dir.display()))?;
        let path = args
            .log_dir
            .join(format!("email-scrape-log-{}.log", today.format("%Y-%m-%d")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse();
    let today = Local::now().date_naive();
    init_logging(&args, today)?;

    match &args.command {
        Command::Scrape(scrape_args) => scrape(scrape_args, today).await,
        Command::Convert { input: json_path, output: csv_path } => {
            let csv_path = csv_path.clone().unwrap_or_else(|| output::csv_path_for(json_path));
            let rows = output::convert_json_to_csv(json_path, &csv_path)?;
            info!("Wrote {} rows to {}", rows, csv_path.display());
            Ok(())
        }
    }
}

async fn scrape(args: &ScrapeArgs, today: NaiveDate) -> Result<()> {
    let config = build_config(args)?;

    input::ensure_header(&config.input_file)
        .with_context(|| format!("reading input file {}", config.input_file.display()))?;
    let urls = input::load_urls(&config.input_file)?;
    info!("Loaded {} URLs from {}", urls.len(), config.input_file.display());

    let json_path = config
        .output_file
        .clone()
        .unwrap_or_else(|| output::default_json_path(&config.output_dir, today));
    let store = ResultStore::load(&json_path);

    let hunter = match config.enrichment.active_key() {
        Some(key) => Some(HunterClient::new(
            key,
            config.enrichment.base_url.as_deref(),
            config.enrichment_timeout,
        )?),
        None => None,
    };

    let progress_bar = indicatif::ProgressBar::new(urls.len() as u64);
    progress_bar.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let (outcome, store) = match ChromeRenderer::launch(&config.browser).await {
        Ok(renderer) => {
            let (outcome, store) = {
                let provider = hunter.as_ref().map(|h| h as &dyn EnrichmentProvider);
                let mut pipeline =
                    Pipeline::new(&config, &renderer, provider, store, today).with_progress(progress_bar);
                let outcome = pipeline.run(&urls).await;
                (outcome, pipeline.into_store())
            };
            renderer.shutdown().await;
            (outcome, store)
        }
        Err(e) => (Err(e), store),
    };

    let summary = pipeline::finish_run(&store, config.enable_csv, outcome).context("scrape aborted")?;
    info!(
        "Stored {} domains in {} ({} new emails this run)",
        store.len(),
        store.path().display(),
        summary.emails_added
    );
    Ok(())
}
