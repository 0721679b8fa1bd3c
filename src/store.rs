//! In-memory vector store and retriever.
//!
//! [`InMemoryStore`] keeps documents and their embeddings in a `Vec`. Search
//! is brute-force cosine similarity over all stored vectors; ties keep
//! insertion order.
//!
//! When a persist directory is configured the collection is written to
//! `<dir>/<collection>.json` after it is built. A later run reuses the
//! snapshot if it was produced by the same embedding model from the same
//! corpus (SHA-256 fingerprint), and re-embeds otherwise.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::models::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    document: Document,
    vector: Vec<f32>,
}

/// On-disk form of a collection.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    model: String,
    fingerprint: String,
    built_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

pub struct InMemoryStore {
    collection: String,
    model: String,
    entries: Vec<StoredEntry>,
}

impl InMemoryStore {
    pub fn new(collection: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            model: model.into(),
            entries: Vec::new(),
        }
    }

    /// Embed `docs` with `embedder` and index them in a fresh collection.
    pub async fn from_documents(
        docs: &[Document],
        embedder: &dyn Embedder,
        collection: &str,
    ) -> Result<Self> {
        let texts: Vec<String> = docs.iter().map(|d| d.page_content.clone()).collect();
        let vectors = embedder
            .embed_texts(&texts)
            .await
            .context("Failed to embed documents")?;

        let mut store = Self::new(collection, embedder.model_name());
        store.add(docs, vectors)?;
        Ok(store)
    }

    /// Insert or replace documents, keyed by content hash.
    pub fn add(&mut self, docs: &[Document], vectors: Vec<Vec<f32>>) -> Result<()> {
        if docs.len() != vectors.len() {
            anyhow::bail!(
                "got {} vectors for {} documents",
                vectors.len(),
                docs.len()
            );
        }
        for (doc, vector) in docs.iter().zip(vectors) {
            let id = doc.content_hash();
            self.entries.retain(|e| e.id != id);
            self.entries.push(StoredEntry {
                id,
                document: doc.clone(),
                vector,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Top `k` documents by cosine similarity to `query_vec`, best first.
    pub fn similarity_search(&self, query_vec: &[f32], k: usize) -> Vec<(Document, f32)> {
        let mut scored: Vec<(&StoredEntry, f32)> = self
            .entries
            .iter()
            .map(|e| (e, cosine_similarity(query_vec, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(e, score)| (e.document.clone(), score))
            .collect()
    }

    /// Wrap the store as a top-`k` retriever.
    pub fn as_retriever(self, embedder: Arc<dyn Embedder>, k: usize) -> VectorStoreRetriever {
        VectorStoreRetriever {
            store: self,
            embedder,
            k,
        }
    }

    /// Write the collection to `<dir>/<collection>.json`.
    pub fn save(&self, dir: &Path, fingerprint: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        let path = snapshot_path(dir, &self.collection);
        let snapshot = Snapshot {
            collection: self.collection.clone(),
            model: self.model.clone(),
            fingerprint: fingerprint.to_string(),
            built_at: Utc::now(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write store snapshot: {}", path.display()))?;
        Ok(path)
    }

    /// Load `<dir>/<collection>.json` if it matches `model` and `fingerprint`.
    ///
    /// Returns `Ok(None)` for a missing or stale snapshot.
    pub fn load(
        dir: &Path,
        collection: &str,
        model: &str,
        fingerprint: &str,
    ) -> Result<Option<Self>> {
        let path = snapshot_path(dir, collection);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read store snapshot: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store snapshot: {}", path.display()))?;

        if snapshot.model != model || snapshot.fingerprint != fingerprint {
            debug!(
                path = %path.display(),
                snapshot_model = %snapshot.model,
                "store snapshot is stale"
            );
            return Ok(None);
        }

        debug!(path = %path.display(), built_at = %snapshot.built_at, "loaded store snapshot");
        Ok(Some(Self {
            collection: snapshot.collection,
            model: snapshot.model,
            entries: snapshot.entries,
        }))
    }
}

fn snapshot_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{}.json", collection))
}

/// SHA-256 over the documents' content, in order.
pub fn corpus_fingerprint(docs: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in docs {
        hasher.update(doc.page_content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Load the collection from the persist directory if possible, otherwise
/// embed `docs` and (when a directory is configured) save the result.
///
/// An unreadable snapshot is logged and rebuilt rather than treated as fatal.
pub async fn build_or_load(
    docs: &[Document],
    embedder: &dyn Embedder,
    config: &StoreConfig,
) -> Result<InMemoryStore> {
    let fingerprint = corpus_fingerprint(docs);

    if let Some(dir) = &config.persist_dir {
        match InMemoryStore::load(dir, &config.collection, embedder.model_name(), &fingerprint) {
            Ok(Some(store)) => {
                info!(collection = %config.collection, "reusing persisted vector store");
                return Ok(store);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable store snapshot"),
        }
    }

    let store = InMemoryStore::from_documents(docs, embedder, &config.collection).await?;
    if store.is_empty() {
        warn!(collection = %config.collection, "vector store built from an empty corpus");
    }

    if let Some(dir) = &config.persist_dir {
        let path = store.save(dir, &fingerprint)?;
        info!(path = %path.display(), "persisted vector store");
    }
    Ok(store)
}

/// Returns the documents most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn relevant_documents(&self, query: &str) -> Result<Vec<Document>>;
}

/// Top-k retriever over an [`InMemoryStore`].
pub struct VectorStoreRetriever {
    store: InMemoryStore,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn relevant_documents(&self, query: &str) -> Result<Vec<Document>> {
        let query_vec = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed query")?;
        Ok(self
            .store
            .similarity_search(&query_vec, self.k)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }
}
