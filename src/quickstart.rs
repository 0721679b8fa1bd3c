//! The quickstart: one question through the selected chain.

use anyhow::Result;
use std::io::Write;
use tracing::info;

use crate::chain::{self, Chain};
use crate::config::Config;
use crate::report;

pub const DEFAULT_QUESTION: &str = "用一句话解释区块链的核心思想。";

/// Run `question` through `chain` and print the outcome.
///
/// On success prints `Question:` and `Answer:`. On failure prints only the
/// classified error line. Neither case is an `Err`.
pub async fn run_chain(chain: &Chain, question: &str, out: &mut dyn Write) -> Result<()> {
    match chain.run(question).await {
        Ok(result) => report::print_quickstart(out, question, &result)?,
        Err(e) => report::print_completion_error(out, &e)?,
    }
    Ok(())
}

/// The `quickstart` command. Chain selection errors are fatal.
pub async fn run_quickstart(config: &Config, question: &str, out: &mut dyn Write) -> Result<()> {
    let chain = chain::select(config)?;
    info!(fake = chain.is_fake(), "chain selected");
    run_chain(&chain, question, out).await
}
