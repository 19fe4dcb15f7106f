//! Serializes stored results to JSON and CSV files.

use crate::error::{AppError, Result};
use crate::models::DomainRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const CSV_HEADER: [&str; 6] = ["domain", "email", "first_name", "last_name", "position", "confidence"];

/// `email-scrape-YYYY-MM-DD.json` inside `dir`.
pub(crate) fn default_json_path(dir: &Path, today: NaiveDate) -> PathBuf {
    dir.join(format!("email-scrape-{}.json", today.format("%Y-%m-%d")))
}

/// The CSV sibling of a JSON output path.
pub(crate) fn csv_path_for(json_path: &Path) -> PathBuf {
    json_path.with_extension("csv")
}

/// Writes one row per stored email, across all domains.
pub(crate) fn write_csv(records: &BTreeMap<String, DomainRecord>, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    let mut rows = 0;
    for (domain, record) in records {
        for email in &record.emails {
            writer.write_record([
                domain.as_str(),
                email.value.as_str(),
                email.first_name.as_deref().unwrap_or(""),
                email.last_name.as_deref().unwrap_or(""),
                email.position.as_deref().unwrap_or(""),
                &email.confidence.as_ref().map(ToString::to_string).unwrap_or_default(),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Converts a stored JSON result file into CSV.
pub(crate) fn convert_json_to_csv(json_path: &Path, csv_path: &Path) -> Result<usize> {
    if json_path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(AppError::InvalidInput(format!(
            "Input file for conversion must be a JSON file: {}",
            json_path.display()
        )));
    }
    let content = fs::read_to_string(json_path)?;
    let records: BTreeMap<String, DomainRecord> = serde_json::from_str(&content)?;
    let rows = write_csv(&records, csv_path)?;
    tracing::info!("Converted {} to {} ({} rows)", json_path.display(), csv_path.display(), rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STORE_JSON: &str = r#"{
        "corp.com": {
            "emails": [
                {"value": "info@corp.com"},
                {"value": "ceo@corp.com", "first_name": "Ada", "last_name": "Lovelace",
                 "position": "CEO", "confidence": 97, "type": "personal"}
            ],
            "organization": {"@type": "Organization", "name": "Corp"},
            "last_scraped": "2024-05-01"
        },
        "empty.org": {"emails": [], "organization": {}, "last_scraped": "2024-05-01"}
    }"#;

    #[test]
    fn test_json_to_csv_one_row_per_email() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("email-scrape-2024-05-01.json");
        fs::write(&json_path, STORE_JSON).unwrap();
        let csv_path = csv_path_for(&json_path);

        let rows = convert_json_to_csv(&json_path, &csv_path).unwrap();
        assert_eq!(rows, 2);

        let written = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "domain,email,first_name,last_name,position,confidence",
                "corp.com,info@corp.com,,,,",
                "corp.com,ceo@corp.com,Ada,Lovelace,CEO,97",
            ]
        );
    }

    #[test]
    fn test_convert_rejects_non_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.csv");
        fs::write(&path, "urls\n").unwrap();
        let err = convert_json_to_csv(&path, &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_paths() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let json = default_json_path(Path::new("out"), day);
        assert_eq!(json, Path::new("out/email-scrape-2024-01-31.json"));
        assert_eq!(csv_path_for(&json), Path::new("out/email-scrape-2024-01-31.csv"));
    }
}
