//! Fake-vs-live chain selection.
//!
//! A [`Chain`] is either the deterministic [`FakeChain`] (no network, canned
//! answers) or an [`LlmChain`] that formats the quickstart prompt and sends
//! it to a [`CompletionModel`]. [`select`] makes the choice once per run:
//!
//! | credential | fake mode | result |
//! |------------|-----------|--------|
//! | absent | on | `Chain::Fake` |
//! | absent | off | [`ConfigError::MissingCredential`](crate::error::ConfigError::MissingCredential) |
//! | present | any | `Chain::Live` |

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, CredentialsConfig};
use crate::credentials::ApiKey;
use crate::error::CompletionError;
use crate::llm::{CompletionModel, OpenAIChat};
use crate::prompt::{PromptTemplate, QUICKSTART_TEMPLATE};

pub const BLOCKCHAIN_MARKER: &str = "区块链";
pub const BLOCKCHAIN_ANSWER: &str = "区块链的核心思想是去中心化与不可篡改的账本。";
pub const CHROMA_ANSWER: &str = "Chroma 是一个轻量的本地向量数据库。";
pub const PLACEHOLDER_ANSWER: &str = "这是一个本地模拟回答（FakeChain）";

/// Offline stand-in for the completion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeChain;

impl FakeChain {
    /// Pure lookup over the input text. `Chroma` matches in any case.
    pub fn run(&self, user_input: &str) -> String {
        let answer = if user_input.contains(BLOCKCHAIN_MARKER) {
            BLOCKCHAIN_ANSWER
        } else if user_input.to_lowercase().contains("chroma") {
            CHROMA_ANSWER
        } else {
            PLACEHOLDER_ANSWER
        };
        answer.to_string()
    }
}

/// Prompt template bound to a completion model.
pub struct LlmChain {
    model: Arc<dyn CompletionModel>,
    prompt: PromptTemplate,
}

impl LlmChain {
    pub fn new(model: Arc<dyn CompletionModel>, prompt: PromptTemplate) -> Self {
        Self { model, prompt }
    }

    /// The quickstart prompt over `model`.
    pub fn quickstart(model: Arc<dyn CompletionModel>) -> Result<Self> {
        Ok(Self::new(model, PromptTemplate::from_template(QUICKSTART_TEMPLATE)?))
    }

    pub async fn run(&self, user_input: &str) -> Result<String, CompletionError> {
        let prompt = self
            .prompt
            .format(&[("user_input", user_input)])
            .map_err(|e| CompletionError::Other(e.to_string()))?;
        self.model.complete(&prompt).await
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

pub enum Chain {
    Fake(FakeChain),
    Live(LlmChain),
}

impl Chain {
    pub async fn run(&self, user_input: &str) -> Result<String, CompletionError> {
        match self {
            Chain::Fake(fake) => Ok(fake.run(user_input)),
            Chain::Live(live) => live.run(user_input).await,
        }
    }

    pub fn is_fake(&self) -> bool {
        matches!(self, Chain::Fake(_))
    }
}

/// Decide between the fake and the live chain.
///
/// `connect` builds the completion model and is only invoked when the live
/// chain is chosen, so the fake path never constructs a network client.
pub fn select_with<F>(
    credential: Option<&ApiKey>,
    fake_override: bool,
    connect: F,
) -> Result<Chain>
where
    F: FnOnce(&ApiKey) -> Result<Arc<dyn CompletionModel>>,
{
    match credential {
        None if fake_override => {
            info!("no credential and fake mode on; using FakeChain");
            Ok(Chain::Fake(FakeChain))
        }
        None => Err(CredentialsConfig::default().missing_error().into()),
        Some(key) => {
            let chain = LlmChain::quickstart(connect(key)?)?;
            info!(model = chain.model_name(), "using live chain");
            Ok(Chain::Live(chain))
        }
    }
}

/// [`select_with`] wired to [`OpenAIChat`] and the config's credential.
pub fn select(config: &Config) -> Result<Chain> {
    if config.api_key.is_none() && !config.fake_llm {
        return Err(config.credentials.missing_error().into());
    }
    select_with(config.api_key.as_ref(), config.fake_llm, |key| {
        let chat = OpenAIChat::new(&config.llm, key.clone())?;
        Ok(Arc::new(chat) as Arc<dyn CompletionModel>)
    })
}
