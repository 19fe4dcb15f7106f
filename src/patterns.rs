//! Matches email-shaped strings in text and filters out obvious false positives.

use crate::error::{AppError, Result};
use regex::Regex;
use std::collections::HashSet;

/// The pattern used when no patterns are configured.
pub(crate) const DEFAULT_EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

const MAILTO_PREFIX: &str = "mailto:";

/// An ordered list of compiled email patterns.
#[derive(Debug, Clone)]
pub(crate) struct EmailMatcher {
    patterns: Vec<Regex>,
}

impl EmailMatcher {
    /// Compiles every pattern, failing on the first invalid one.
    pub(crate) fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    AppError::Config(format!("Invalid email pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Finds every non-overlapping match of every pattern in `text`.
    ///
    /// Matches are returned once each, case as found, in the order they were
    /// first seen (pattern by pattern, then left to right).
    pub(crate) fn find_emails(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(text) {
                if seen.insert(m.as_str()) {
                    found.push(m.as_str().to_string());
                }
            }
        }
        found
    }
}

impl Default for EmailMatcher {
    fn default() -> Self {
        Self {
            patterns: vec![Regex::new(DEFAULT_EMAIL_PATTERN).unwrap()],
        }
    }
}

/// Heuristic filter for regex hits that are really file names (`logo@2x.png`).
///
/// Takes the text after the last `@`, then the text after its last `.`, and
/// rejects the candidate when that lower-cased extension is blacklisted. This
/// is not a syntax check: anything else that looks like an email passes.
/// `blacklist` entries are expected to be lower-case already.
pub(crate) fn is_valid_email(candidate: &str, blacklist: &HashSet<String>) -> bool {
    let domain = candidate.rsplit('@').next().unwrap_or(candidate);
    let extension = domain.rsplit('.').next().unwrap_or(domain).to_lowercase();
    !blacklist.contains(&extension)
}

/// Returns the address part of a `mailto:` href, or `None` if it is not one.
///
/// Query parameters (`?subject=...`) are dropped.
pub(crate) fn mailto_address(href: &str) -> Option<&str> {
    let href = href.trim();
    let prefix = href.get(..MAILTO_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(MAILTO_PREFIX) {
        return None;
    }
    let address = href[MAILTO_PREFIX.len()..]
        .split('?')
        .next()
        .unwrap_or("")
        .trim();
    (!address.is_empty()).then_some(address)
}

/// Removes a leading `mailto:` left over on a candidate, if any.
pub(crate) fn strip_mailto(candidate: &str) -> &str {
    match candidate.get(..MAILTO_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(MAILTO_PREFIX) => {
            &candidate[MAILTO_PREFIX.len()..]
        }
        _ => candidate,
    }
}
