//! Document identity and upsert service.
//!
//! Maps a (company, filing) pair to its canonical published URL and performs
//! the idempotent create-or-detect-duplicate insert. Dedup-by-URL makes
//! re-runs over the same filing set safe without a separate ledger of what
//! has already been processed.

use anyhow::{Context, Result};
use std::path::Path;

use crate::companies::Company;
use crate::models::{DocumentMetadata, Filing, FilingMetadata};
use crate::store::{DocumentStore, UpsertOutcome};

/// Canonical externally-addressable URL for a filing's rendered artifact:
/// the artifact path relative to the catalog root, appended to the publish
/// base address.
pub fn document_url(filing: &Filing, catalog_root: &Path, url_base: &str) -> Result<String> {
    let rel = filing
        .file_path
        .strip_prefix(catalog_root)
        .with_context(|| {
            format!(
                "artifact {} is not under the catalog root {}",
                filing.file_path.display(),
                catalog_root.display()
            )
        })?;

    let rel = rel
        .to_str()
        .with_context(|| format!("artifact path is not valid UTF-8: {}", rel.display()))?
        .replace('\\', "/");

    Ok(format!(
        "{}/{}",
        url_base.trim_end_matches('/'),
        rel.trim_start_matches('/')
    ))
}

/// Metadata payload for a filing. Quarter is genuinely absent for annual
/// filings and stays absent; everything the scanner recovered is carried.
pub fn filing_metadata(company: &Company, filing: &Filing) -> FilingMetadata {
    FilingMetadata {
        company_name: company.name.clone(),
        company_ticker: Some(company.symbol.clone()),
        doc_type: filing.filing_type,
        year: filing.year,
        quarter: filing.quarter,
        accession_number: Some(filing.accession_number.clone()),
        cik: Some(filing.cik.clone()),
        period_of_report_date: Some(filing.period_of_report_date),
        filed_as_of_date: Some(filing.filed_as_of_date),
        date_as_of_change: Some(filing.date_as_of_change),
    }
}

/// Attempt the unique-URL insert for one filing.
///
/// `AlreadyExists` is an expected, non-fatal outcome; any other store failure
/// propagates and is the only per-filing condition the pipeline treats as
/// fatal.
pub async fn upsert_filing(
    store: &DocumentStore,
    company: &Company,
    filing: &Filing,
    catalog_root: &Path,
    url_base: &str,
) -> Result<UpsertOutcome> {
    let url = document_url(filing, catalog_root, url_base)?;
    let metadata = DocumentMetadata::SecFiling(filing_metadata(company, filing));
    store.insert_document(&url, &metadata).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::FilingType;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn sample_filing(root: &Path) -> Filing {
        Filing {
            file_path: root
                .join("sec-edgar-filings")
                .join("AAPL")
                .join("10-K")
                .join("0000320193-20-000096")
                .join("primary-document.pdf"),
            symbol: "AAPL".to_string(),
            filing_type: FilingType::TenK,
            year: 2022,
            quarter: None,
            cik: "0000320193".to_string(),
            accession_number: "0000320193-20-000096".to_string(),
            period_of_report_date: NaiveDate::from_ymd_opt(2022, 9, 30).unwrap(),
            filed_as_of_date: NaiveDate::from_ymd_opt(2022, 10, 28).unwrap(),
            date_as_of_change: NaiveDate::from_ymd_opt(2022, 10, 28).unwrap(),
        }
    }

    fn apple() -> Company {
        Company {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
        }
    }

    #[test]
    fn url_is_relative_path_under_base() {
        let root = PathBuf::from("/srv/edgar");
        let filing = sample_filing(&root);
        let url = document_url(&filing, &root, "https://filings.example.com/").unwrap();
        assert_eq!(
            url,
            "https://filings.example.com/sec-edgar-filings/AAPL/10-K/0000320193-20-000096/primary-document.pdf"
        );
    }

    #[test]
    fn url_outside_catalog_root_fails() {
        let filing = sample_filing(Path::new("/srv/edgar"));
        let err = document_url(&filing, Path::new("/elsewhere"), "https://x.example.com");
        assert!(err.is_err());
    }

    #[test]
    fn metadata_carries_everything_the_scanner_recovered() {
        let filing = sample_filing(Path::new("/srv/edgar"));
        let meta = filing_metadata(&apple(), &filing);
        assert_eq!(meta.company_name, "Apple Inc.");
        assert_eq!(meta.doc_type, FilingType::TenK);
        assert_eq!(meta.quarter, None);
        assert_eq!(meta.accession_number.as_deref(), Some("0000320193-20-000096"));
        assert_eq!(meta.cik.as_deref(), Some("0000320193"));
        assert!(meta.period_of_report_date.is_some());
    }

    #[tokio::test]
    async fn second_upsert_of_identical_filing_is_a_duplicate() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = DocumentStore::open(&tmp.path().join("edgar.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&store).await.unwrap();

        let root = tmp.path().to_path_buf();
        let filing = sample_filing(&root);
        let base = "https://filings.example.com";

        let first = upsert_filing(&store, &apple(), &filing, &root, base)
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = upsert_filing(&store, &apple(), &filing, &root, base)
            .await
            .unwrap();
        assert!(matches!(second, UpsertOutcome::AlreadyExists { .. }));
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }
}
