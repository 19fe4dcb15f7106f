//! Drives the crawl over every input URL, one domain at a time.

use crate::browser::Renderer;
use crate::config::Config;
use crate::domain::{domain_key, normalize_url};
use crate::enrichment::{EnrichmentProvider, enrich_domain};
use crate::error::Result;
use crate::models::DomainOutcome;
use crate::output;
use crate::retry::scrape_with_retries;
use crate::store::ResultStore;
use chrono::NaiveDate;
use indicatif::ProgressBar;

/// Counts of what happened to each input token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub persisted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub emails_added: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &DomainOutcome) {
        match outcome {
            DomainOutcome::Invalid => self.invalid += 1,
            DomainOutcome::Skipped => self.skipped += 1,
            DomainOutcome::Persisted { added } => {
                self.persisted += 1;
                self.emails_added += added;
            }
        }
    }
}

pub(crate) struct Pipeline<'a> {
    config: &'a Config,
    renderer: &'a dyn Renderer,
    enrichment: Option<&'a dyn EnrichmentProvider>,
    store: ResultStore,
    today: NaiveDate,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(
        config: &'a Config,
        renderer: &'a dyn Renderer,
        enrichment: Option<&'a dyn EnrichmentProvider>,
        store: ResultStore,
        today: NaiveDate,
    ) -> Self {
        Self {
            config,
            renderer,
            enrichment,
            store,
            today,
            progress: ProgressBar::hidden(),
        }
    }

    pub(crate) fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &ResultStore {
        &self.store
    }

    pub(crate) fn into_store(self) -> ResultStore {
        self.store
    }

    /// Handles one input token end to end.
    ///
    /// The store is written to disk before this returns `Persisted`. Only
    /// fatal errors (browser gone, store unwritable) come back as `Err`.
    pub(crate) async fn process_domain(&mut self, token: &str) -> Result<DomainOutcome> {
        let (url, domain) = match normalize_url(token).and_then(|url| domain_key(&url).map(|key| (url, key))) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(target: "pipeline_task", "Skipping input '{}': {}", token, e);
                return Ok(DomainOutcome::Invalid);
            }
        };

        if self.store.should_skip(&domain, self.today) {
            tracing::info!(target: "pipeline_task", "Skipping {} (already scraped today)", domain);
            return Ok(DomainOutcome::Skipped);
        }

        tracing::info!(target: "pipeline_task", "Scraping {}", url);
        let result = scrape_with_retries(self.renderer, &url, &self.config.scrape, self.config.retry).await?;

        let mut emails = result.emails;
        emails.extend(enrich_domain(self.enrichment, &self.config.enrichment, &domain).await);

        let found: Vec<String> = emails.iter().map(|e| e.value.clone()).collect();
        let added = self.store.merge(&domain, emails, result.organization, self.today);
        self.store.persist()?;

        if found.is_empty() {
            tracing::info!(target: "pipeline_task", "No emails found for {}", domain);
        } else {
            let total = self.store.get(&domain).map_or(0, |record| record.emails.len());
            tracing::info!(target: "pipeline_task",
                "Emails found for {}: {} ({} new, {} stored)", domain, found.join(", "), added, total
            );
        }
        Ok(DomainOutcome::Persisted { added })
    }

    /// Processes every token in order.
    ///
    /// Stops at the first fatal error; everything persisted before it stays on
    /// disk. The pacing delay only follows domains that were actually scraped
    /// and is skipped after the last one.
    pub(crate) async fn run(&mut self, tokens: &[String]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.progress.set_length(tokens.len() as u64);

        for (index, token) in tokens.iter().enumerate() {
            self.progress.set_message(token.clone());
            let outcome = match self.process_domain(token).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.progress.abandon_with_message(format!("Aborted at {}", token));
                    tracing::error!(target: "pipeline_task",
                        "Fatal error while processing '{}': {}. {} domains are saved in {}",
                        token, e, self.store.len(), self.store.path().display()
                    );
                    return Err(e);
                }
            };
            summary.record(&outcome);
            self.progress.inc(1);

            let is_last = index + 1 == tokens.len();
            if matches!(outcome, DomainOutcome::Persisted { .. }) && !is_last {
                let delay = self.config.pacing_delay();
                tracing::debug!(target: "pipeline_task", "Waiting {:?} before the next domain", delay);
                tokio::time::sleep(delay).await;
            }
        }

        self.progress.finish_with_message("Scraping complete");
        tracing::info!(target: "pipeline_task",
            "Run complete: {} scraped, {} skipped, {} invalid, {} new emails",
            summary.persisted, summary.skipped, summary.invalid, summary.emails_added
        );
        Ok(summary)
    }
}

/// Final persist and optional CSV export, run whether or not the crawl succeeded.
///
/// A crawl error is returned unchanged after the outputs are written; output
/// failures are only returned when the crawl itself succeeded.
pub(crate) fn finish_run(
    store: &ResultStore,
    enable_csv: bool,
    outcome: Result<RunSummary>,
) -> Result<RunSummary> {
    let mut output_error = None;
    if let Err(e) = store.persist() {
        tracing::error!(target: "pipeline_task", "Final persist failed: {}", e);
        output_error.get_or_insert(e);
    }
    if enable_csv {
        let csv_path = output::csv_path_for(store.path());
        match output::write_csv(store.records(), &csv_path) {
            Ok(rows) => tracing::info!(target: "pipeline_task", "Wrote {} rows to {}", rows, csv_path.display()),
            Err(e) => {
                tracing::error!(target: "pipeline_task", "Failed to write {}: {}", csv_path.display(), e);
                output_error.get_or_insert(e);
            }
        }
    }

    let summary = outcome?;
    match output_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
