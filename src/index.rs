//! Index build/load orchestration.
//!
//! For each persisted document, either loads a previously-built retrieval
//! index from the durable registry or builds one from the document's
//! content: stream the rendered artifact from its URL, extract pages, chunk
//! with the document id as the citation back-reference, embed, persist, and
//! register the index under the document's own id.
//!
//! Building is safe to invoke repeatedly for the same document: a second
//! invocation finds the registry entry from the first and takes the load
//! path, never rebuilding.

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::chunk::chunk_pages;
use crate::embedding::{cosine_similarity, vec_to_blob, Embedder};
use crate::extract;
use crate::fetch::ContentFetcher;
use crate::models::{Chunk, DocumentRecord, IndexEntry};
use crate::store::DocumentStore;

/// One retrieval hit from a [`DocumentIndex`], with its citation fields.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub document_id: String,
    pub chunk_index: i64,
    pub page: i64,
    pub text: String,
    pub score: f32,
}

#[derive(Debug)]
struct IndexedChunk {
    chunk: Chunk,
    vector: Option<Vec<f32>>,
}

/// Queryable retrieval index over one document's content. The index identity
/// equals the document id.
#[derive(Debug)]
pub struct DocumentIndex {
    document_id: String,
    model: String,
    dims: usize,
    chunks: Vec<IndexedChunk>,
}

impl DocumentIndex {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether similarity queries can be answered (vectors were built).
    pub fn has_vectors(&self) -> bool {
        self.chunks.iter().any(|c| c.vector.is_some())
    }

    /// Rank the document's chunks against a query vector, best first.
    pub fn query(&self, query: &[f32], limit: usize) -> Vec<ScoredPassage> {
        let mut scored: Vec<ScoredPassage> = self
            .chunks
            .iter()
            .filter_map(|ic| {
                let vector = ic.vector.as_ref()?;
                Some(ScoredPassage {
                    document_id: ic.chunk.document_id.clone(),
                    chunk_index: ic.chunk.chunk_index,
                    page: ic.chunk.page,
                    text: ic.chunk.text.clone(),
                    score: cosine_similarity(query, vector),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// Builds or loads per-document indexes against the injected store, fetcher,
/// and embedding capability.
pub struct IndexOrchestrator<'a> {
    store: &'a DocumentStore,
    fetcher: &'a dyn ContentFetcher,
    embedder: &'a Embedder,
    max_tokens: usize,
}

impl<'a> IndexOrchestrator<'a> {
    pub fn new(
        store: &'a DocumentStore,
        fetcher: &'a dyn ContentFetcher,
        embedder: &'a Embedder,
        max_tokens: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            embedder,
            max_tokens,
        }
    }

    /// Load indexes for the full document set when the registry knows every
    /// id; otherwise build what is missing, document by document.
    ///
    /// Content-fetch or extraction failure is fatal for the batch; registry
    /// entries written for documents completed earlier remain valid.
    pub async fn build_or_load(
        &self,
        docs: &[DocumentRecord],
    ) -> Result<HashMap<String, DocumentIndex>> {
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();

        if let Some(entries) = self.store.find_index_entries(&ids).await? {
            let mut indexes = HashMap::with_capacity(docs.len());
            for entry in entries.into_values() {
                let index = self.load_entry(&entry).await?;
                indexes.insert(entry.document_id, index);
            }
            return Ok(indexes);
        }

        let mut indexes = HashMap::with_capacity(docs.len());
        for doc in docs {
            // An entry registered by an earlier run (or earlier in this
            // batch) is loaded, never rebuilt.
            let index = match self.store.find_index_entry(&doc.id).await? {
                Some(entry) => self.load_entry(&entry).await?,
                None => self.build_one(doc).await?,
            };
            indexes.insert(doc.id.clone(), index);
        }
        Ok(indexes)
    }

    /// Load a single document's index, if the registry has it.
    pub async fn load_index(&self, document_id: &str) -> Result<Option<DocumentIndex>> {
        match self.store.find_index_entry(document_id).await? {
            Some(entry) => Ok(Some(self.load_entry(&entry).await?)),
            None => Ok(None),
        }
    }

    async fn load_entry(&self, entry: &IndexEntry) -> Result<DocumentIndex> {
        let chunks = self.store.load_chunks(&entry.document_id).await?;
        let mut vectors = self.store.load_vectors(&entry.document_id).await?;

        let chunks = chunks
            .into_iter()
            .map(|chunk| {
                let vector = vectors.remove(&chunk.id);
                IndexedChunk { chunk, vector }
            })
            .collect();

        Ok(DocumentIndex {
            document_id: entry.document_id.clone(),
            model: entry.model.clone(),
            dims: entry.dims as usize,
            chunks,
        })
    }

    async fn build_one(&self, doc: &DocumentRecord) -> Result<DocumentIndex> {
        let scratch = tempfile::NamedTempFile::new()
            .with_context(|| "could not create scratch file for artifact download")?;
        self.fetcher.fetch(&doc.url, scratch.path()).await?;

        let content_type = extract::content_type_for(&doc.url);
        let pages = extract::extract_pages(scratch.path(), content_type)
            .with_context(|| format!("could not extract text from {}", doc.url))?;

        let chunks = chunk_pages(&doc.id, &pages, self.max_tokens);
        self.store.replace_chunks(&doc.id, &chunks).await?;

        let vectors = self.embed_and_persist(&chunks).await?;

        let entry = IndexEntry {
            document_id: doc.id.clone(),
            model: self.embedder.model().to_string(),
            dims: self.embedder.dims() as i64,
            chunk_count: chunks.len() as i64,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.store.register_index_entry(&entry).await?;

        let chunks = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect();

        Ok(DocumentIndex {
            document_id: doc.id.clone(),
            model: entry.model,
            dims: entry.dims as usize,
            chunks,
        })
    }

    /// Embed chunks in batches when the provider is enabled. Embedding
    /// failure leaves the affected chunks vector-less rather than failing
    /// the build; the chunks themselves are already persisted.
    async fn embed_and_persist(&self, chunks: &[Chunk]) -> Result<Vec<Option<Vec<f32>>>> {
        if !self.embedder.is_enabled() {
            return Ok(vec![None; chunks.len()]);
        }

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.embedder.batch_size()) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(batch_vectors) => {
                    for (chunk, vector) in batch.iter().zip(batch_vectors) {
                        self.store
                            .upsert_vector(&chunk.id, &chunk.document_id, &vec_to_blob(&vector))
                            .await?;
                        vectors.push(Some(vector));
                    }
                }
                Err(e) => {
                    eprintln!("Warning: embedding batch failed: {}", e);
                    vectors.extend(batch.iter().map(|_| None));
                }
            }
        }

        Ok(vectors)
    }
}
