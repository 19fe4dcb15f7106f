//! Defines the core data structures used in the email-scrape application.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Structured-data fields copied verbatim from a page's schema.org Organization block.
/// An empty map means nothing was found.
pub(crate) type OrganizationInfo = Map<String, Value>;

/// A single discovered or enriched contact email.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub(crate) struct EmailRecord {
    /// The literal address, case as found. Dedup key within a domain.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Provider-assigned confidence score, enrichment only. Kept as the
    /// provider's JSON number so integers stay integers on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Number>,
    /// Any other fields an enrichment provider returned (minus sourcing metadata).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmailRecord {
    /// A record carrying only an address, as produced by page scraping.
    pub(crate) fn scraped(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Everything one page scrape produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ScrapeResult {
    /// Distinct valid emails, in discovery order.
    pub emails: Vec<EmailRecord>,
    pub organization: OrganizationInfo,
}

impl ScrapeResult {
    pub(crate) fn empty() -> Self {
        Self::default()
    }
}

/// The persisted unit of work for one domain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct DomainRecord {
    /// Insertion order is discovery order; no two entries share a `value`.
    #[serde(default)]
    pub emails: Vec<EmailRecord>,
    #[serde(default)]
    pub organization: OrganizationInfo,
    /// Serialized as `YYYY-MM-DD`.
    pub last_scraped: NaiveDate,
}

impl DomainRecord {
    pub(crate) fn new(today: NaiveDate) -> Self {
        Self {
            emails: Vec::new(),
            organization: OrganizationInfo::new(),
            last_scraped: today,
        }
    }
}

/// Terminal state of one input token after the pipeline has handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DomainOutcome {
    /// The token did not resolve to a host; nothing was recorded.
    Invalid,
    /// The domain was already scraped today.
    Skipped,
    /// The domain was scraped, merged and written to disk.
    Persisted {
        /// How many emails were new to the store.
        added: usize,
    },
}
