//! Core data models used throughout the quickstart.
//!
//! These types represent the documents and answers that flow through the
//! retrieval and generation pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A piece of text plus free-form metadata.
///
/// Documents are created either by the demo corpus or by the vector store's
/// result set and are read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a metadata entry, builder style.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Stable identifier derived from the content (hex SHA-256).
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.page_content.as_bytes()))
    }

    /// First `max_chars` characters of the content, for display.
    pub fn preview(&self, max_chars: usize) -> String {
        self.page_content.chars().take(max_chars).collect()
    }
}

/// The result of one question: generated text plus the documents it was
/// grounded on (empty for the quickstart chain).
#[derive(Debug, Clone, Default)]
pub struct Answer {
    pub result: String,
    pub source_documents: Vec<Document>,
}
