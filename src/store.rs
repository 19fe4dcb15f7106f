//! Per-domain results persisted across runs.

use crate::error::{AppError, Result};
use crate::models::{DomainRecord, EmailRecord, OrganizationInfo};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Domain -> record map backed by a JSON file.
#[derive(Debug)]
pub(crate) struct ResultStore {
    path: PathBuf,
    records: BTreeMap<String, DomainRecord>,
}

impl ResultStore {
    /// Reads the store at `path`.
    ///
    /// A missing file gives an empty store. A file that cannot be read or
    /// parsed is logged and also gives an empty store; its contents will be
    /// overwritten on the next persist.
    pub(crate) fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    let err = AppError::Persistence(format!("{} is corrupted: {}", path.display(), e));
                    tracing::error!(target: "store", "{}. Starting from an empty store and overwriting the file.", err);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::error!(target: "store", "Cannot read {}: {}. Starting from an empty store.", path.display(), e);
                BTreeMap::new()
            }
        };
        tracing::info!(target: "store", "Loaded {} domains from {}", records.len(), path.display());
        Self { path, records }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn records(&self) -> &BTreeMap<String, DomainRecord> {
        &self.records
    }

    pub(crate) fn get(&self, domain: &str) -> Option<&DomainRecord> {
        self.records.get(domain)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// True iff `domain` was already scraped on `today`.
    pub(crate) fn should_skip(&self, domain: &str, today: NaiveDate) -> bool {
        self.records
            .get(domain)
            .is_some_and(|record| record.last_scraped == today)
    }

    /// Folds a scrape result into the stored record for `domain`.
    ///
    /// Emails whose `value` is already stored (or repeated within `emails`)
    /// are dropped; the rest are appended in order. A non-empty
    /// `organization` replaces the stored one. `last_scraped` is set to
    /// `today` even when nothing new was found. Returns the number of emails
    /// added.
    pub(crate) fn merge(
        &mut self,
        domain: &str,
        emails: Vec<EmailRecord>,
        organization: OrganizationInfo,
        today: NaiveDate,
    ) -> usize {
        let record = self
            .records
            .entry(domain.to_string())
            .or_insert_with(|| DomainRecord::new(today));

        let mut known: HashSet<String> = record.emails.iter().map(|e| e.value.clone()).collect();
        let before = record.emails.len();
        for email in emails {
            if known.insert(email.value.clone()) {
                record.emails.push(email);
            }
        }

        if !organization.is_empty() {
            record.organization = organization;
        }
        record.last_scraped = today;

        record.emails.len() - before
    }

    /// Writes the whole store, replacing the file.
    ///
    /// The JSON is written to a sibling temp file first and renamed into
    /// place, so an interrupted write leaves the previous version intact.
    pub(crate) fn persist(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence_error(&self.path, e))?;
        }
        fs::write(&tmp_path, data).map_err(|e| persistence_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| persistence_error(&self.path, e))?;

        tracing::debug!(target: "store", "Persisted {} domains to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

fn persistence_error(path: &Path, err: std::io::Error) -> AppError {
    AppError::Persistence(format!("failed to write {}: {}", path.display(), err))
}
