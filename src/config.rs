//! Defines the configuration settings for the email-scrape application.

use crate::browser::{BrowserSettings, request_timeout_for};
use crate::enrichment::EnrichmentSettings;
use crate::error::{AppError, Result};
use crate::patterns::EmailMatcher;
use crate::retry::{FallbackStrategy, RetryPolicy};
use crate::scraper::ScrapeOptions;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line arguments for email-scrape
#[derive(Parser, Debug)]
#[command(author, version, about = "Crawl websites in a headless browser and collect contact email addresses", long_about = None)]
pub(crate) struct AppArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "EMAIL_SCRAPE_LOG_LEVEL")]
    pub log_level: String,

    /// Directory for the daily log file
    #[arg(long, global = true, default_value = ".", env = "EMAIL_SCRAPE_LOG_DIR")]
    pub log_dir: PathBuf,

    /// Log to the console only
    #[arg(long, global = true, default_value = "false", env = "EMAIL_SCRAPE_NO_LOG_FILE")]
    pub no_log_file: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Crawl every URL in a CSV file and store the emails found
    Scrape(ScrapeArgs),
    /// Convert a stored JSON result file to CSV
    Convert {
        /// Path to the JSON result file
        input: PathBuf,
        /// Path of the CSV to write (defaults to the input with a .csv extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ScrapeArgs {
    /// CSV file with one URL or domain per line under a `urls` header
    pub input: PathBuf,

    /// Output format written in addition to the JSON store
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Json)]
    pub output_format: OutputFormat,

    /// Path of the JSON result store (defaults to email-scrape-<date>.json in the output dir)
    #[arg(long, env = "EMAIL_SCRAPE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Path to configuration file (TOML format)
    #[arg(long = "config", env = "EMAIL_SCRAPE_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Per-navigation timeout in seconds
    #[arg(long, env = "EMAIL_SCRAPE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Scrape attempts per domain
    #[arg(long, env = "EMAIL_SCRAPE_RETRY_ATTEMPTS")]
    pub retry_attempts: Option<u32>,

    /// Delay between domains (seconds)
    #[arg(long, env = "EMAIL_SCRAPE_WAIT_TIME")]
    pub wait_time: Option<f32>,

    /// What to try after a failed HTTPS attempt
    #[arg(long, value_enum, env = "EMAIL_SCRAPE_FALLBACK")]
    pub fallback: Option<FallbackStrategy>,

    /// Skip schema.org Organization extraction
    #[arg(long, default_value = "false")]
    pub no_schema: bool,

    /// Hunter.io API key; enables enrichment
    #[arg(long, env = "EMAIL_SCRAPE_HUNTER_API_KEY", hide_env_values = true)]
    pub hunter_api_key: Option<String>,

    /// Show the browser window
    #[arg(long, default_value = "false")]
    pub headed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    scraping: Option<ScrapingSection>,
    html_parsing: Option<HtmlParsingSection>,
    search_keywords: Option<SearchKeywordsSection>,
    output: Option<OutputSection>,
    enrichment: Option<EnrichmentSection>,
    browser: Option<BrowserSection>,
}

#[derive(Deserialize, Debug, Default)]
struct ScrapingSection {
    timeout_secs: Option<u64>,
    retry_attempts: Option<u32>,
    wait_time_secs: Option<f32>,
    max_wait_time_secs: Option<f32>,
    fallback: Option<FallbackStrategy>,
}

#[derive(Deserialize, Debug, Default)]
struct HtmlParsingSection {
    email_patterns: Option<Vec<String>>,
    blacklisted_filetypes: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchKeywordsSection {
    contact_keywords: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct OutputSection {
    enable_schema_crawling: Option<bool>,
    enable_csv: Option<bool>,
    output_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
struct EnrichmentSection {
    use_hunter: Option<bool>,
    hunter_api_key: Option<String>,
    hunter_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct BrowserSection {
    headless: Option<bool>,
    chrome_executable: Option<PathBuf>,
    user_agent: Option<String>,
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// CSV file listing the URLs to crawl.
    pub input_file: PathBuf,
    /// Explicit JSON store path; `None` means the dated default in `output_dir`.
    pub output_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Write the CSV export after the run.
    pub enable_csv: bool,
    /// Settings handed to the page scraper.
    pub scrape: ScrapeOptions,
    pub retry: RetryPolicy,
    /// Minimum and maximum delay between domains (seconds).
    pub wait_between_domains: (f32, f32),
    pub enrichment: EnrichmentSettings,
    pub enrichment_timeout: Duration,
    pub browser: BrowserSettings,
}

pub(crate) const DEFAULT_BLACKLISTED_FILETYPES: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "pdf", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "zip", "rar", "tar", "gz", "7z",
];

impl Default for Config {
    fn default() -> Self {
        Config {
            input_file: PathBuf::from("urls.csv"),
            output_file: None,
            output_dir: PathBuf::from("."),
            enable_csv: false,
            scrape: ScrapeOptions {
                matcher: EmailMatcher::default(),
                blacklist: DEFAULT_BLACKLISTED_FILETYPES.iter().map(|s| s.to_string()).collect(),
                schema_crawling: true,
                contact_keywords: vec!["contact".to_string()],
                navigation_timeout: Duration::from_secs(30),
            },
            retry: RetryPolicy {
                attempts: 3,
                fallback: FallbackStrategy::None,
            },
            wait_between_domains: (1.0, 1.0),
            enrichment: EnrichmentSettings::default(),
            enrichment_timeout: Duration::from_secs(15),
            browser: BrowserSettings {
                headless: true,
                chrome_executable: None,
                user_agent: None,
                request_timeout: request_timeout_for(Duration::from_secs(30)),
            },
        }
    }
}

/// Load configuration from a TOML file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read configuration file {}: {}", path.display(), e))
    })?;
    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse TOML configuration from {}: {}", path.display(), e))
    })?;
    tracing::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn lowercase_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) -> Result<()> {
    if let Some(scraping) = &file_config.scraping {
        if let Some(timeout) = scraping.timeout_secs {
            config.scrape.navigation_timeout = Duration::from_secs(timeout);
        }
        if let Some(attempts) = scraping.retry_attempts {
            config.retry.attempts = attempts;
        }
        if let Some(wait) = scraping.wait_time_secs {
            config.wait_between_domains = (wait, wait);
        }
        if let Some(max_wait) = scraping.max_wait_time_secs {
            config.wait_between_domains.1 = max_wait;
        }
        if let Some(fallback) = scraping.fallback {
            config.retry.fallback = fallback;
        }
    }

    if let Some(parsing) = &file_config.html_parsing {
        if let Some(patterns) = &parsing.email_patterns {
            if patterns.is_empty() {
                tracing::warn!("Configured email pattern list is empty. Using the default pattern.");
            } else {
                config.scrape.matcher = EmailMatcher::new(patterns)?;
            }
        }
        if let Some(filetypes) = &parsing.blacklisted_filetypes {
            config.scrape.blacklist = lowercase_set(filetypes);
        }
    }

    if let Some(keywords) = file_config
        .search_keywords
        .as_ref()
        .and_then(|k| k.contact_keywords.as_ref())
    {
        config.scrape.contact_keywords = keywords.clone();
    }

    if let Some(output) = &file_config.output {
        if let Some(schema) = output.enable_schema_crawling {
            config.scrape.schema_crawling = schema;
        }
        if let Some(csv) = output.enable_csv {
            config.enable_csv = csv;
        }
        if let Some(dir) = &output.output_dir {
            config.output_dir = dir.clone();
        }
    }

    if let Some(enrichment) = &file_config.enrichment {
        if let Some(enabled) = enrichment.use_hunter {
            config.enrichment.enabled = enabled;
        }
        if let Some(key) = &enrichment.hunter_api_key {
            config.enrichment.api_key = Some(key.clone());
        }
        if let Some(base_url) = &enrichment.hunter_base_url {
            config.enrichment.base_url = Some(base_url.clone());
        }
        if let Some(timeout) = enrichment.timeout_secs {
            config.enrichment_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(browser) = &file_config.browser {
        if let Some(headless) = browser.headless {
            config.browser.headless = headless;
        }
        if let Some(path) = &browser.chrome_executable {
            config.browser.chrome_executable = Some(path.clone());
        }
        if let Some(agent) = &browser.user_agent {
            config.browser.user_agent = Some(agent.clone());
        }
    }

    Ok(())
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &ScrapeArgs) {
    config.input_file = args.input.clone();
    if let Some(output) = &args.output {
        config.output_file = Some(output.clone());
    }
    if args.output_format == OutputFormat::Csv {
        config.enable_csv = true;
    }
    if let Some(timeout) = args.timeout {
        config.scrape.navigation_timeout = Duration::from_secs(timeout);
    }
    if let Some(attempts) = args.retry_attempts {
        config.retry.attempts = attempts;
    }
    if let Some(wait) = args.wait_time {
        config.wait_between_domains = (wait, wait);
    }
    if let Some(fallback) = args.fallback {
        config.retry.fallback = fallback;
    }
    if args.no_schema {
        config.scrape.schema_crawling = false;
    }
    if let Some(key) = &args.hunter_api_key {
        config.enrichment.api_key = Some(key.clone());
        config.enrichment.enabled = true;
    }
    if args.headed {
        config.browser.headless = false;
    }
}

/// Longest accepted delay between domains (seconds).
const MAX_WAIT_SECS: f32 = 3600.0;
const DEFAULT_WAIT_SECS: f32 = 1.0;

/// Brings a configured wait into `0..=MAX_WAIT_SECS`; NaN becomes the default.
fn sanitize_wait(secs: f32) -> f32 {
    if secs.is_nan() {
        DEFAULT_WAIT_SECS
    } else {
        secs.clamp(0.0, MAX_WAIT_SECS)
    }
}

fn validate_config(config: &mut Config) {
    let (min, max) = config.wait_between_domains;
    let sanitized = (sanitize_wait(min), sanitize_wait(max));
    if sanitized != (min, max) {
        config.wait_between_domains = sanitized;
        tracing::warn!(
            "Wait time ({}, {}) out of range. Using ({}, {}).",
            min, max, sanitized.0, sanitized.1
        );
    }
    if config.wait_between_domains.0 > config.wait_between_domains.1 {
        config.wait_between_domains.1 = config.wait_between_domains.0;
        tracing::warn!(
            "Min wait was greater than max wait. Setting both to {}",
            config.wait_between_domains.0
        );
    }

    if config.retry.attempts == 0 {
        config.retry.attempts = 1;
        tracing::warn!("Retry attempts was set to 0. Setting to 1.");
    }

    if config.scrape.navigation_timeout.is_zero() {
        config.scrape.navigation_timeout = Duration::from_secs(30);
        tracing::warn!("Navigation timeout was 0. Setting to 30s.");
    }
    config.browser.request_timeout = request_timeout_for(config.scrape.navigation_timeout);

    config.scrape.contact_keywords.retain(|k| !k.trim().is_empty());
    if config.scrape.contact_keywords.is_empty() {
        tracing::warn!("No contact keywords configured. Contact pages will not be followed.");
    }

    if config.enrichment.enabled && config.enrichment.active_key().is_none() {
        tracing::warn!("Enrichment is enabled but no API key is configured. Enrichment will be skipped.");
    }
}

/// Builds the scrape configuration: defaults, then the TOML file, then CLI/env.
///
/// An explicitly given config file must load; the fallback locations are
/// best-effort.
pub(crate) fn build_config(args: &ScrapeArgs) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = &args.config_file {
        let file_config = load_config_file(path)?;
        apply_file_config(&mut config, &file_config)?;
    } else {
        for path in ["./email-scrape.toml", "./config.toml"] {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut config, &file_config)?;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to load configuration from {}: {}", path.display(), e);
                }
            }
        }
    }

    apply_cli_args(&mut config, args);
    validate_config(&mut config);

    tracing::debug!("Final configuration: {:?}", config);
    Ok(config)
}

impl Config {
    /// Picks the delay before the next domain from the configured range.
    pub(crate) fn pacing_delay(&self) -> Duration {
        use rand::Rng;
        let (min, max) = self.wait_between_domains;
        let secs = if min < max {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        };
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
    }
}
