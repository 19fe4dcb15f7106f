//! Optional third-party lookup of contacts for a domain.

use crate::error::{AppError, Result};
use crate::models::EmailRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub(crate) const DEFAULT_HUNTER_BASE_URL: &str = "https://api.hunter.io";

/// Sourcing metadata the provider attaches to each record. Never persisted.
const SOURCE_ATTRIBUTION_FIELD: &str = "sources";

/// A domain-search service returning known contacts for a domain.
#[async_trait]
pub(crate) trait EnrichmentProvider: Send + Sync {
    async fn domain_search(&self, domain: &str) -> Result<Vec<EmailRecord>>;
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EnrichmentSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl EnrichmentSettings {
    /// The credential, if enrichment is switched on and one is configured.
    pub(crate) fn active_key(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Client for the Hunter.io `domain-search` endpoint.
#[derive(Debug, Clone)]
pub(crate) struct HunterClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl HunterClient {
    pub(crate) fn new(api_key: impl Into<String>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Generic(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_HUNTER_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl EnrichmentProvider for HunterClient {
    async fn domain_search(&self, domain: &str) -> Result<Vec<EmailRecord>> {
        let url = format!("{}/v2/domain-search", self.base_url);
        tracing::debug!(target: "enrichment_task", "Querying domain search for {}", domain);

        let response = self
            .http_client
            .get(&url)
            .query(&[("domain", domain), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(AppError::Enrichment(format!(
                "domain search for {} returned {}: {}",
                domain, status, body["errors"]
            )));
        }

        parse_domain_search(body)
    }
}

/// Pulls `data.emails` out of a domain-search response, dropping sourcing metadata.
pub(crate) fn parse_domain_search(body: Value) -> Result<Vec<EmailRecord>> {
    let emails = match body.get("data").and_then(|d| d.get("emails")) {
        Some(Value::Array(emails)) => emails.clone(),
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(AppError::Enrichment(format!(
                "expected data.emails to be an array, got {}",
                other
            )));
        }
    };

    emails
        .into_iter()
        .map(|mut email| {
            if let Value::Object(map) = &mut email {
                map.remove(SOURCE_ATTRIBUTION_FIELD);
            }
            serde_json::from_value::<EmailRecord>(email)
                .map_err(|e| AppError::Enrichment(format!("malformed email record: {}", e)))
        })
        .collect()
}

/// Runs enrichment for one domain. Never fails: errors are logged and yield no records.
///
/// Returns immediately without calling the provider when enrichment is
/// disabled, no credential is configured, or no provider was built.
pub(crate) async fn enrich_domain(
    provider: Option<&dyn EnrichmentProvider>,
    settings: &EnrichmentSettings,
    domain: &str,
) -> Vec<EmailRecord> {
    let (Some(provider), Some(_)) = (provider, settings.active_key()) else {
        return Vec::new();
    };

    match provider.domain_search(domain).await {
        Ok(records) => {
            tracing::info!(target: "enrichment_task", "Enrichment returned {} records for {}", records.len(), domain);
            records
        }
        Err(e) => {
            tracing::error!(target: "enrichment_task", "Error using enrichment API for {}: {}", domain, e);
            Vec::new()
        }
    }
}
