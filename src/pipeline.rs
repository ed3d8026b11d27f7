//! Ingestion pipeline driver.
//!
//! Sequences catalog scan → symbol resolution → upsert → index build across
//! a batch of ticker symbols, emitting progress events to the caller's
//! channel. Filings are processed strictly sequentially so a document always
//! exists before its index build is attempted; the store's unique index on
//! URL arbitrates races between concurrent pipeline instances.
//!
//! Expected conditions (duplicates, unresolved symbols) surface as events
//! and never abort the batch. Data corruption and infrastructure failures
//! (malformed submissions, store errors, fetch failures) abort with `Err`
//! and no terminal `done` event. A consumer may drop the receiver at any
//! point; work already persisted stays persisted.

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::catalog;
use crate::companies::CompanyDirectory;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::fetch::ContentFetcher;
use crate::index::IndexOrchestrator;
use crate::models::{EventKind, IngestEvent};
use crate::store::{DocumentStore, UpsertOutcome};
use crate::upsert;

pub struct Pipeline {
    store: DocumentStore,
    companies: CompanyDirectory,
    fetcher: Box<dyn ContentFetcher>,
    embedder: Embedder,
    catalog_root: PathBuf,
    url_base: String,
    max_tokens: usize,
}

impl Pipeline {
    pub fn new(
        store: DocumentStore,
        companies: CompanyDirectory,
        fetcher: Box<dyn ContentFetcher>,
        embedder: Embedder,
        config: &Config,
    ) -> Self {
        Self {
            store,
            companies,
            fetcher,
            embedder,
            catalog_root: config.catalog.root.clone(),
            url_base: config.publish.url_base.clone(),
            max_tokens: config.chunking.max_tokens,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Ingest every catalogued filing for `tickers`, emitting one event per
    /// outcome and exactly one terminal `done` event on success.
    pub async fn run(
        &self,
        tickers: &[String],
        events: &mpsc::Sender<IngestEvent>,
    ) -> Result<()> {
        let filings = catalog::scan_catalog(&self.catalog_root, tickers)?;
        let orchestrator = IndexOrchestrator::new(
            &self.store,
            self.fetcher.as_ref(),
            &self.embedder,
            self.max_tokens,
        );

        for filing in &filings {
            let Some(company) = self.companies.resolve(&filing.symbol) else {
                let data = format!(
                    "Symbol {} not found in company directory. Skipping.",
                    filing.symbol
                );
                if !emit(events, EventKind::Error, data).await {
                    return Ok(());
                }
                continue;
            };

            let outcome = upsert::upsert_filing(
                &self.store,
                company,
                filing,
                &self.catalog_root,
                &self.url_base,
            )
            .await?;

            match outcome {
                UpsertOutcome::Inserted(doc) => {
                    orchestrator
                        .build_or_load(std::slice::from_ref(&doc))
                        .await?;

                    let data = format!("Stored in vector index {}.", doc.url);
                    if !emit(events, EventKind::Vector, data).await {
                        return Ok(());
                    }

                    let quarter = filing
                        .quarter
                        .map(|q| format!(", quarter {}", q))
                        .unwrap_or_default();
                    let data = format!(
                        "Upserted document for {}, filing type {}{}",
                        filing.symbol, filing.filing_type, quarter
                    );
                    if !emit(events, EventKind::Upsert, data).await {
                        return Ok(());
                    }
                }
                UpsertOutcome::AlreadyExists { url } => {
                    let data = format!("Duplicate record found for {}.", url);
                    if !emit(events, EventKind::Duplicate, data).await {
                        return Ok(());
                    }
                }
            }
        }

        emit(
            events,
            EventKind::Done,
            "Completed processing all filings.".to_string(),
        )
        .await;
        Ok(())
    }
}

/// Send an event; `false` means the consumer dropped the receiver and the
/// pipeline should stop early.
async fn emit(tx: &mpsc::Sender<IngestEvent>, kind: EventKind, data: String) -> bool {
    tx.send(IngestEvent::new(kind, data)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ARTIFACT_FILE, FILINGS_DIR, SUBMISSION_FILE};
    use crate::config::{
        CatalogConfig, ChunkingConfig, CompaniesConfig, DbConfig, EmbeddingConfig, PublishConfig,
        ServerConfig,
    };
    use crate::fetch::HttpFetcher;
    use crate::migrate;
    use std::path::Path;

    const SUBMISSION_10K: &str = "CONFORMED PERIOD OF REPORT:\t20220930\n\
FILED AS OF DATE:\t20221028\n\
DATE AS OF CHANGE:\t20221028\n\
\tCENTRAL INDEX KEY:\t0000320193\n\
<FILENAME>aapl-20220930.htm\n";

    /// Minimal valid PDF containing one line of text, assembled by hand so
    /// the extractor has something real to parse.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    fn write_filing(root: &Path, symbol: &str, form: &str, accession: &str, artifact: &[u8]) {
        let dir = root
            .join(FILINGS_DIR)
            .join(symbol)
            .join(form)
            .join(accession);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ARTIFACT_FILE), artifact).unwrap();
        std::fs::write(dir.join(SUBMISSION_FILE), SUBMISSION_10K).unwrap();
    }

    fn test_config(root: &Path) -> Config {
        Config {
            db: DbConfig {
                path: root.join("edgar.sqlite"),
            },
            catalog: CatalogConfig {
                root: root.to_path_buf(),
            },
            publish: PublishConfig {
                url_base: format!("file://{}", root.display()),
            },
            companies: CompaniesConfig {
                path: root.join("companies.toml"),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    fn directory_with(symbol: &str, name: &str, root: &Path) -> CompanyDirectory {
        let path = root.join("companies.toml");
        std::fs::write(&path, format!("[companies]\n{} = \"{}\"\n", symbol, name)).unwrap();
        CompanyDirectory::load(&path).unwrap()
    }

    async fn pipeline_for(root: &Path, companies: CompanyDirectory) -> Pipeline {
        let config = test_config(root);
        let store = DocumentStore::connect(&config).await.unwrap();
        migrate::run_migrations(&store).await.unwrap();
        let embedder = Embedder::from_config(&config.embedding).unwrap();
        Pipeline::new(
            store,
            companies,
            Box::new(HttpFetcher::new()),
            embedder,
            &config,
        )
    }

    async fn collect_events(
        pipeline: &Pipeline,
        tickers: &[String],
    ) -> (Result<()>, Vec<IngestEvent>) {
        let (tx, mut rx) = mpsc::channel(32);
        let result = pipeline.run(tickers, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (result, events)
    }

    #[tokio::test]
    async fn ingest_emits_vector_upsert_then_done() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_filing(
            tmp.path(),
            "AAPL",
            "10-K",
            "0000320193-20-000096",
            &minimal_pdf("net sales held steady"),
        );
        let companies = directory_with("AAPL", "Apple Inc.", tmp.path());
        let pipeline = pipeline_for(tmp.path(), companies).await;

        let (result, events) = collect_events(&pipeline, &["AAPL".to_string()]).await;
        result.unwrap();

        let kinds: Vec<EventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Vector, EventKind::Upsert, EventKind::Done]
        );
        assert!(events[0].data.contains("primary-document.pdf"));
        assert_eq!(pipeline.store().count_documents().await.unwrap(), 1);
        let docs = pipeline.store().list_documents().await.unwrap();
        assert!(pipeline
            .store()
            .find_index_entry(&docs[0].id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn second_ingest_is_a_duplicate() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_filing(
            tmp.path(),
            "AAPL",
            "10-K",
            "0000320193-20-000096",
            &minimal_pdf("net sales held steady"),
        );
        let companies = directory_with("AAPL", "Apple Inc.", tmp.path());
        let pipeline = pipeline_for(tmp.path(), companies).await;

        let tickers = vec!["AAPL".to_string()];
        let (first, _) = collect_events(&pipeline, &tickers).await;
        first.unwrap();

        let (second, events) = collect_events(&pipeline, &tickers).await;
        second.unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::Duplicate, EventKind::Done]);
        assert_eq!(pipeline.store().count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unresolved_symbol_is_skipped_and_batch_completes() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_filing(
            tmp.path(),
            "AAPL",
            "10-K",
            "0000320193-20-000096",
            &minimal_pdf("net sales held steady"),
        );
        // Directory knows a different company entirely.
        let companies = directory_with("MSFT", "Microsoft Corporation", tmp.path());
        let pipeline = pipeline_for(tmp.path(), companies).await;

        let (result, events) = collect_events(&pipeline, &["AAPL".to_string()]).await;
        result.unwrap();

        let kinds: Vec<EventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::Error, EventKind::Done]);
        assert!(events[0].data.contains("AAPL"));
        assert_eq!(pipeline.store().count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreadable_artifact_aborts_without_done() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_filing(
            tmp.path(),
            "AAPL",
            "10-K",
            "0000320193-20-000096",
            b"not a pdf at all",
        );
        let companies = directory_with("AAPL", "Apple Inc.", tmp.path());
        let pipeline = pipeline_for(tmp.path(), companies).await;

        let (result, events) = collect_events(&pipeline, &["AAPL".to_string()]).await;
        assert!(result.is_err());
        assert!(!events.iter().any(|e| e.event == EventKind::Done));
    }
}
