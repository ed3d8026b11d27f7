//! # edgar-ingest CLI (`edgar`)
//!
//! The `edgar` binary drives the filing ingestion pipeline. It provides
//! commands for database initialization, catalog inspection, ingestion,
//! stored-document listing, index queries, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! edgar --config ./config/edgar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `edgar init` | Create the SQLite database and run schema migrations |
//! | `edgar catalog <TICKERS>` | Scan the on-disk catalog and list discovered filings |
//! | `edgar ingest <TICKERS>` | Ingest filings: upsert documents and build indexes |
//! | `edgar documents` | List stored document records |
//! | `edgar query <DOC_ID> "<text>"` | Run a retrieval query against one document's index |
//! | `edgar serve` | Start the HTTP server (SSE ingestion endpoint) |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! edgar init --config ./config/edgar.toml
//!
//! # See what the downloader left on disk for two companies
//! edgar catalog AAPL MSFT
//!
//! # Ingest; prints one line per pipeline event
//! edgar ingest AAPL MSFT
//!
//! # Ask one document's index a question (requires an embedding provider)
//! edgar query 6dbd0d6e-4cf5-4bb8-9d92-7b6fd2b4cd79 "how did net sales change"
//! ```

mod catalog;
mod chunk;
mod companies;
mod config;
mod embedding;
mod extract;
mod fetch;
mod index;
mod migrate;
mod models;
mod pipeline;
mod server;
mod store;
mod submission;
mod upsert;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::companies::CompanyDirectory;
use crate::embedding::Embedder;
use crate::fetch::HttpFetcher;
use crate::index::IndexOrchestrator;
use crate::models::IngestEvent;
use crate::pipeline::Pipeline;
use crate::store::DocumentStore;

/// edgar-ingest CLI — ingestion and retrieval-index pipeline for SEC EDGAR
/// filings.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/edgar.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "edgar",
    about = "edgar-ingest — ingestion and retrieval-index pipeline for SEC EDGAR filings",
    version,
    long_about = "edgar-ingest scans a catalog of downloaded SEC filings, extracts structured \
    metadata from each raw submission, upserts one document record per filing keyed by its \
    published URL, and builds a per-document retrieval index for downstream question answering."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/edgar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// index_entries, chunks, chunk_vectors). Idempotent — running it
    /// multiple times is safe.
    Init,

    /// Scan the filing catalog and list what would be ingested.
    ///
    /// Reads only; parses each discovered submission and prints one line per
    /// filing. Fails on a corrupted download (rendered artifact present but
    /// raw submission missing) or an unparseable submission.
    Catalog {
        /// Ticker symbols to include (e.g. `AAPL MSFT`).
        #[arg(required = true)]
        tickers: Vec<String>,
    },

    /// Ingest filings for the given tickers.
    ///
    /// Scans the catalog, upserts one document per filing (duplicates are
    /// detected by URL and reported, never re-inserted), and builds or loads
    /// the retrieval index for each new document. Prints one line per
    /// pipeline event and ends with `done`.
    Ingest {
        /// Ticker symbols to ingest (e.g. `AAPL MSFT`).
        #[arg(required = true)]
        tickers: Vec<String>,
    },

    /// List stored document records.
    Documents,

    /// Run a retrieval query against one document's index.
    ///
    /// Embeds the query text and ranks the document's chunks by cosine
    /// similarity. Requires an embedding provider to be configured.
    Query {
        /// Document id (as printed by `edgar documents`).
        document_id: String,

        /// The query text.
        query: String,

        /// Maximum number of passages to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and exposes `POST /api/ingest` (SSE),
    /// `GET /api/documents`, and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = DocumentStore::connect(&cfg).await?;
            migrate::run_migrations(&store).await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Catalog { tickers } => {
            let filings = catalog::scan_catalog(&cfg.catalog.root, &tickers)?;
            println!("catalog scan");
            println!("  filings found: {}", filings.len());
            for filing in &filings {
                let quarter = filing
                    .quarter
                    .map(|q| format!("Q{}", q))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<6} {:<5} {:<4} {:<3} {}",
                    filing.symbol, filing.filing_type, filing.year, quarter, filing.accession_number
                );
            }
        }
        Commands::Ingest { tickers } => {
            let store = DocumentStore::connect(&cfg).await?;
            let companies = CompanyDirectory::load(&cfg.companies.path)?;
            let embedder = Embedder::from_config(&cfg.embedding)?;
            let pipeline = Pipeline::new(
                store,
                companies,
                Box::new(HttpFetcher::new()),
                embedder,
                &cfg,
            );

            let (tx, mut rx) = mpsc::channel::<IngestEvent>(32);
            let handle =
                tokio::spawn(async move { pipeline.run(&tickers, &tx).await });

            while let Some(ev) = rx.recv().await {
                println!("[{}] {}", ev.event.as_str(), ev.data);
            }

            handle.await??;
        }
        Commands::Documents => {
            let store = DocumentStore::connect(&cfg).await?;
            let documents = store.list_documents().await?;
            println!("documents: {}", documents.len());
            for doc in &documents {
                match doc.metadata.as_sec_filing() {
                    Some(meta) => {
                        let quarter = meta
                            .quarter
                            .map(|q| format!("Q{}", q))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "  {}  {:<6} {:<5} {:<4} {:<3} {}",
                            doc.id,
                            meta.company_ticker.as_deref().unwrap_or("?"),
                            meta.doc_type,
                            meta.year,
                            quarter,
                            doc.url
                        );
                    }
                    None => println!("  {}  {}", doc.id, doc.url),
                }
            }
            store.close().await;
        }
        Commands::Query {
            document_id,
            query,
            limit,
        } => {
            let embedder = Embedder::from_config(&cfg.embedding)?;
            if !embedder.is_enabled() {
                bail!("Embedding provider is disabled. Set [embedding] provider in config.");
            }

            let store = DocumentStore::connect(&cfg).await?;
            let document = match store.get_document(&document_id).await? {
                Some(doc) => doc,
                None => bail!("document not found: {}", document_id),
            };

            let fetcher = HttpFetcher::new();
            let orchestrator =
                IndexOrchestrator::new(&store, &fetcher, &embedder, cfg.chunking.max_tokens);

            let index = match orchestrator.load_index(&document_id).await? {
                Some(index) => index,
                None => bail!("no index registered for document: {}", document_id),
            };
            if !index.has_vectors() {
                bail!(
                    "index for document {} has no vectors (built with embeddings disabled)",
                    document_id
                );
            }

            let query_vector = embedder.embed_query(&query).await?;
            let hits = index.query(&query_vector, limit);

            println!("document: {}", document.url);
            println!("index: {} ({} dims, {} chunks)", index.model(), index.dims(), index.chunk_count());
            println!("query results: {}", hits.len());
            for hit in &hits {
                println!(
                    "  score {:.4}  page {}  chunk {}",
                    hit.score, hit.page, hit.chunk_index
                );
                println!("    {}", hit.text.replace('\n', "\n    "));
            }
            store.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
