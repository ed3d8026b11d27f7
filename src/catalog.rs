//! Filing catalog scanner.
//!
//! Walks the three-level hierarchy the downloader leaves on disk —
//! `<root>/sec-edgar-filings/<SYMBOL>/<FORM>/<ACCESSION>/` — and emits one
//! [`Filing`] per fully-downloaded submission for the requested symbols.
//! Emitted order is directory-traversal order and is not stable across runs.

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::models::{Filing, FilingType};
use crate::submission;

/// Subdirectory of the catalog root that the downloader populates.
pub const FILINGS_DIR: &str = "sec-edgar-filings";
/// Rendered artifact every complete submission carries.
pub const ARTIFACT_FILE: &str = "primary-document.pdf";
/// Raw submission text the metadata is parsed from.
pub const SUBMISSION_FILE: &str = "full-submission.txt";

/// Scan the catalog for filings belonging to `symbols`.
///
/// A submission directory is emitted only when its rendered artifact exists.
/// An artifact without its raw submission text is a corrupted download and
/// fails the scan; so does a raw submission the parser cannot make sense of.
pub fn scan_catalog(root: &Path, symbols: &[String]) -> Result<Vec<Filing>> {
    let base = root.join(FILINGS_DIR);
    if !base.is_dir() {
        bail!("filing catalog does not exist: {}", base.display());
    }

    let wanted: HashSet<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
    let ignore = housekeeping_globs()?;

    let mut filings = Vec::new();

    let walker = WalkDir::new(&base)
        .min_depth(3)
        .max_depth(3)
        .into_iter()
        .filter_entry(|e| !ignore.is_match(e.file_name().to_string_lossy().as_ref()));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let rel = entry.path().strip_prefix(&base).unwrap_or(entry.path());
        let mut parts = rel.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        });
        let (symbol_dir, form_dir, accession) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => continue,
        };

        if !wanted.contains(&symbol_dir.to_uppercase()) {
            continue;
        }
        let Some(filing_type) = FilingType::from_label(&form_dir) else {
            continue;
        };

        let artifact = entry.path().join(ARTIFACT_FILE);
        if !artifact.exists() {
            // Not yet rendered; the downloader will finish it on a later run.
            continue;
        }
        let raw = entry.path().join(SUBMISSION_FILE);
        if !raw.exists() {
            bail!(
                "corrupted download: {} exists but {} is missing in {}",
                ARTIFACT_FILE,
                SUBMISSION_FILE,
                entry.path().display()
            );
        }

        let header = submission::parse_header(&raw)
            .with_context(|| format!("failed to parse {}", raw.display()))?;
        let quarter = match filing_type {
            FilingType::TenQ => Some(
                submission::parse_quarter(&raw)
                    .with_context(|| format!("failed to parse {}", raw.display()))?,
            ),
            FilingType::TenK => None,
        };

        filings.push(Filing {
            file_path: artifact,
            symbol: header.ticker,
            filing_type,
            year: header.period_of_report_date.year(),
            quarter,
            cik: header.cik,
            accession_number: accession.trim().to_string(),
            period_of_report_date: header.period_of_report_date,
            filed_as_of_date: header.filed_as_of_date,
            date_as_of_change: header.date_as_of_change,
        });
    }

    Ok(filings)
}

/// Filesystem housekeeping entries that must never be treated as catalog
/// directories.
fn housekeeping_globs() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in [".DS_Store", "._*", ".Trash*", "Thumbs.db", "desktop.ini"] {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
