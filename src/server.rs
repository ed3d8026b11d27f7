//! HTTP boundary for the ingestion pipeline.
//!
//! Exposes the pipeline to HTTP callers; the conversational layer that
//! consumes the built indexes lives elsewhere.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ingest` | Ingest filings for a list of tickers; streams events as SSE |
//! | `GET`  | `/api/documents` | List stored document records |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The ingest stream emits one SSE event per pipeline outcome
//! (`vector`/`upsert`/`duplicate`/`error`) and terminates with `done`. A
//! fatal pipeline failure emits a final `error` event and closes the stream
//! without `done`, so consumers can tell an aborted run from a completed one.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};

use crate::companies::CompanyDirectory;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::fetch::HttpFetcher;
use crate::models::{DocumentMetadata, EventKind, IngestEvent};
use crate::pipeline::Pipeline;
use crate::store::DocumentStore;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/ingest", post(handle_ingest))
        .route("/api/documents", get(handle_documents))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("edgar server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ingest ============

#[derive(Deserialize)]
struct IngestPayload {
    tickers: Vec<String>,
}

/// Kick off an ingestion run and stream its events.
///
/// The pipeline runs in a spawned task; dropping the SSE connection drops
/// the channel receiver, which stops the pipeline at its next event without
/// rolling back persisted work.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestPayload>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if payload.tickers.is_empty() {
        return Err(bad_request("tickers must not be empty"));
    }

    let pipeline = build_pipeline(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<IngestEvent>(32);
    let tickers = payload.tickers;

    tokio::spawn(async move {
        if let Err(e) = pipeline.run(&tickers, &tx).await {
            eprintln!("Error: ingestion failed: {}", e);
            let _ = tx
                .send(IngestEvent::new(
                    EventKind::Error,
                    format!("Ingestion aborted: {}", e),
                ))
                .await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|ev| {
        Ok::<Event, Infallible>(Event::default().event(ev.event.as_str()).data(ev.data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let store = DocumentStore::connect(config).await?;
    let companies = CompanyDirectory::load(&config.companies.path)?;
    let embedder = Embedder::from_config(&config.embedding)?;
    Ok(Pipeline::new(
        store,
        companies,
        Box::new(HttpFetcher::new()),
        embedder,
        config,
    ))
}

// ============ GET /api/documents ============

#[derive(Serialize)]
struct DocumentResponse {
    id: String,
    url: String,
    metadata: DocumentMetadata,
    created_at: String, // ISO8601
    updated_at: String, // ISO8601
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentResponse>,
}

async fn handle_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let store = DocumentStore::connect(&state.config)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let documents = store
        .list_documents()
        .await
        .map_err(|e| internal(e.to_string()))?;
    store.close().await;

    let documents = documents
        .into_iter()
        .map(|doc| DocumentResponse {
            id: doc.id,
            url: doc.url,
            metadata: doc.metadata,
            created_at: format_ts_iso(doc.created_at),
            updated_at: format_ts_iso(doc.updated_at),
        })
        .collect();

    Ok(Json(DocumentListResponse { documents }))
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
