//! # RAG Quickstart CLI (`rq`)
//!
//! ## Usage
//!
//! ```bash
//! rq --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rq quickstart` | Answer one question with the fake or live chain |
//! | `rq rag` | Retrieval-augmented answer over the demo corpus |
//! | `rq key` | Report where the API key was found (masked) |
//!
//! Logs go to stderr and are controlled by `RUST_LOG` (default `warn`), so
//! stdout carries only the answer text.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_quickstart::config::{load_runtime_config, ProcessEnv};
use rag_quickstart::credentials::CredentialResolver;
use rag_quickstart::{quickstart, rag};

/// RAG quickstart: a fake-or-live LLM chain and a tiny retrieval demo.
///
/// The API key is read from `openai.json`, the `OPENAI_API_KEY` environment
/// variable or a `.env` file, in that order.
#[derive(Parser)]
#[command(name = "rq", version, about = "LLM quickstart with an offline fallback and a RAG demo")]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rag.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question.
    ///
    /// Uses the live model when a key is available. Without one, falls back
    /// to canned answers unless `USE_FAKE_LLM=0`.
    Quickstart {
        /// Question to ask.
        #[arg(long, short, default_value = quickstart::DEFAULT_QUESTION)]
        question: String,
    },

    /// Ask a question against the in-memory demo vector store.
    Rag {
        /// Query text.
        #[arg(long, short, default_value = rag::DEFAULT_RAG_QUERY)]
        query: String,

        /// Number of documents to retrieve (defaults to `retrieval.k`).
        #[arg(long, short)]
        k: Option<usize>,
    },

    /// Show which source the API key was taken from.
    Key,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_runtime_config(&cli.config, &ProcessEnv)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Quickstart { question } => {
            quickstart::run_quickstart(&config, &question, &mut out).await?;
        }
        Commands::Rag { query, k } => {
            let k = k.unwrap_or(config.retrieval.k);
            rag::run_rag(&config, &query, k, &mut out).await?;
        }
        Commands::Key => {
            let resolver = CredentialResolver::from_config(&config.credentials);
            match resolver.resolve() {
                Some(cred) => writeln!(out, "{} ({})", cred.key.masked(), cred.source)?,
                None => return Err(config.credentials.missing_error().into()),
            }
        }
    }

    out.flush()?;
    Ok(())
}
