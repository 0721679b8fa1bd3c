//! Typed error kinds for the seams callers need to inspect.
//!
//! Application plumbing uses `anyhow`; these enums exist where a caller has
//! to branch on the kind of failure (fatal configuration vs. recoverable
//! service errors).

use thiserror::Error;

/// Upstream error codes that mean "slow down or top up", regardless of the
/// HTTP status they arrive with.
const RATE_LIMIT_CODES: &[&str] = &["insufficient_quota", "rate_limit_exceeded"];

/// Fatal configuration problems. These terminate the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Please set {var}: no credential found in {key_file}, {env_file} or the process environment")]
    MissingCredential {
        var: String,
        key_file: String,
        env_file: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a completion call.
///
/// Callers print a friendly message for [`CompletionError::RateLimited`] and
/// a generic one (including the text) for everything else. Neither is
/// retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Other(String),
}

impl CompletionError {
    /// Classify a non-success API response.
    ///
    /// HTTP 429 is always [`RateLimited`](CompletionError::RateLimited). So is
    /// an OpenAI-style error body whose `error.code` or `error.type` names a
    /// quota or rate-limit condition, whatever the status.
    pub fn from_api(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        let code_matches = error
            .map(|e| {
                ["code", "type"].iter().any(|field| {
                    e.get(*field)
                        .and_then(|v| v.as_str())
                        .is_some_and(|c| RATE_LIMIT_CODES.contains(&c))
                })
            })
            .unwrap_or(false);

        if status == 429 || code_matches {
            CompletionError::RateLimited(format!("HTTP {}: {}", status, message))
        } else {
            CompletionError::Other(format!("OpenAI API error {}: {}", status, message))
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }
}

/// Failure of a retrieval-augmented question.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("failed to build prompt: {0:#}")]
    Prompt(anyhow::Error),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Other(format!("request failed: {}", e))
    }
}
