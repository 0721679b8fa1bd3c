//! # RAG Quickstart
//!
//! A small command-line starter for LLM applications: resolve an API key,
//! answer one question through either a deterministic offline chain or a
//! live chat-completion model, and run a retrieval-augmented question over
//! a three-document demo corpus.
//!
//! ## Architecture
//!
//! ```text
//! openai.json ─┐
//! env var ─────┼─▶ CredentialResolver ─▶ Config ─┬─▶ chain::select ─▶ FakeChain | LlmChain
//! .env ────────┘                                  │
//!                                                 └─▶ rag: Embedder ─▶ InMemoryStore ─▶ RetrievalQa
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rq quickstart                     # offline answer when no key is configured
//! rq rag --query "什么是 Chroma？"   # needs a key
//! rq key                            # show which source supplied the key
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`credentials`] | API key discovery |
//! | [`config`] | TOML configuration and environment overrides |
//! | [`chain`] | Fake/live chain selection |
//! | [`llm`] | Chat-completion client |
//! | [`embedding`] | Embedding client and cosine similarity |
//! | [`store`] | In-memory vector store and retriever |
//! | [`prompt`] | Prompt templates |
//! | [`quickstart`] | Single-question flow |
//! | [`rag`] | Retrieval-augmented flow |
//! | [`report`] | Stdout formatting |
//! | [`error`] | Typed errors |
//! | [`models`] | Documents and answers |

pub mod chain;
pub mod config;
pub mod credentials;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod quickstart;
pub mod rag;
pub mod report;
pub mod store;
