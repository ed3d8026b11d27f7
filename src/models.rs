//! Core data models used throughout edgar-ingest.
//!
//! These types represent the filings, documents, chunks, and events that flow
//! through the ingestion and index-build pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SEC form categories the catalog can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilingType {
    #[serde(rename = "10-K")]
    TenK,
    #[serde(rename = "10-Q")]
    TenQ,
}

impl FilingType {
    /// The SEC form label, as used for directory names and metadata.
    pub fn as_label(&self) -> &'static str {
        match self {
            FilingType::TenK => "10-K",
            FilingType::TenQ => "10-Q",
        }
    }

    /// Parse a form directory name. Unknown forms are skipped by the scanner.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "10-K" => Some(FilingType::TenK),
            "10-Q" => Some(FilingType::TenQ),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One discovered filing, recomputed from the catalog on every scan.
///
/// Only constructed when both the rendered artifact and the raw submission
/// text exist on disk.
#[derive(Debug, Clone)]
pub struct Filing {
    /// Path to the rendered artifact (`primary-document.pdf`).
    pub file_path: PathBuf,
    /// Ticker symbol recovered from the raw submission, uppercased.
    pub symbol: String,
    pub filing_type: FilingType,
    /// Fiscal year, taken from the period of report.
    pub year: i32,
    /// Fiscal quarter (1–4); present only for 10-Q filings.
    pub quarter: Option<u8>,
    /// Central Index Key. Kept as a string — leading zeros are significant.
    pub cik: String,
    /// Accession number, from the submission directory name.
    pub accession_number: String,
    pub period_of_report_date: NaiveDate,
    pub filed_as_of_date: NaiveDate,
    pub date_as_of_change: NaiveDate,
}

/// Metadata payload for an ingested SEC filing.
///
/// Absent fields are omitted from the serialized payload, never written as
/// null placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingMetadata {
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_ticker: Option<String>,
    pub doc_type: FilingType,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accession_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cik: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_of_report_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filed_as_of_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_as_of_change: Option<NaiveDate>,
}

/// Closed set of metadata kinds a document can carry.
///
/// Serialized externally tagged, so the stored JSON reads as a map from the
/// kind tag to its payload (`{"sec_filing": {...}}`). `Other` is a
/// forward-compatibility bucket for kinds this build does not know about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentMetadata {
    SecFiling(FilingMetadata),
    Other(serde_json::Value),
}

impl DocumentMetadata {
    pub fn as_sec_filing(&self) -> Option<&FilingMetadata> {
        match self {
            DocumentMetadata::SecFiling(m) => Some(m),
            DocumentMetadata::Other(_) => None,
        }
    }
}

/// Durable document record, one per ingested filing, keyed by URL.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Identity assigned by the store on first insert.
    pub id: String,
    /// Canonical externally-resolvable address of the rendered artifact.
    /// Globally unique; the dedup key.
    pub url: String,
    pub metadata: DocumentMetadata,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A chunk of extracted artifact text, tagged with its owning document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Back-reference used for citation when the index answers queries.
    pub document_id: String,
    pub chunk_index: i64,
    /// 1-based page of the rendered artifact this chunk came from.
    pub page: i64,
    pub text: String,
    pub hash: String,
}

/// Durable index-registry entry. At most one exists per document id.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub document_id: String,
    pub model: String,
    pub dims: i64,
    pub chunk_count: i64,
    pub created_at: i64,
}

/// Kinds of progress events the ingestion pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Vector,
    Upsert,
    Duplicate,
    Error,
    Done,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Vector => "vector",
            EventKind::Upsert => "upsert",
            EventKind::Duplicate => "duplicate",
            EventKind::Error => "error",
            EventKind::Done => "done",
        }
    }
}

/// One progress event, streamed to the ingestion caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub event: EventKind,
    pub data: String,
}

impl IngestEvent {
    pub fn new(event: EventKind, data: impl Into<String>) -> Self {
        Self {
            event,
            data: data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filing_type_labels_roundtrip() {
        assert_eq!(FilingType::from_label("10-K"), Some(FilingType::TenK));
        assert_eq!(FilingType::from_label("10-Q"), Some(FilingType::TenQ));
        assert_eq!(FilingType::from_label("8-K"), None);
        assert_eq!(FilingType::TenQ.as_label(), "10-Q");
    }

    #[test]
    fn metadata_omits_absent_fields() {
        let meta = DocumentMetadata::SecFiling(FilingMetadata {
            company_name: "Apple Inc.".to_string(),
            company_ticker: Some("AAPL".to_string()),
            doc_type: FilingType::TenK,
            year: 2022,
            quarter: None,
            accession_number: Some("0000320193-20-000096".to_string()),
            cik: Some("0000320193".to_string()),
            period_of_report_date: None,
            filed_as_of_date: None,
            date_as_of_change: None,
        });
        let json = serde_json::to_value(&meta).unwrap();
        let payload = json.get("sec_filing").expect("externally tagged");
        assert_eq!(payload["doc_type"], "10-K");
        assert_eq!(payload["cik"], "0000320193");
        assert!(payload.get("quarter").is_none());
        assert!(payload.get("period_of_report_date").is_none());
    }

    #[test]
    fn event_kind_serializes_lowercase() {
        let ev = IngestEvent::new(EventKind::Duplicate, "already there");
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"event\":\"duplicate\""));
        assert_eq!(EventKind::Done.as_str(), "done");
    }
}
