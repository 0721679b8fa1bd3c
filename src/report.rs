//! User-facing output.
//!
//! Everything the flows print to stdout goes through here so the wording
//! stays identical between the quickstart and RAG commands.

use std::io::{self, Write};

use crate::error::CompletionError;
use crate::models::Answer;

/// Printed when the completion service reports a quota or rate limit.
pub const QUOTA_MESSAGE: &str =
    "OpenAI 返回配额错误（insufficient_quota / 429），请检查计费或换 key。";

/// Prefix for any other runtime error.
pub const GENERIC_ERROR_PREFIX: &str = "运行 LLM 时发生错误：";

pub fn print_completion_error(out: &mut dyn Write, err: &CompletionError) -> io::Result<()> {
    match err {
        CompletionError::RateLimited(_) => writeln!(out, "{}", QUOTA_MESSAGE),
        CompletionError::Other(msg) => print_generic_error(out, msg),
    }
}

pub fn print_generic_error(out: &mut dyn Write, msg: &str) -> io::Result<()> {
    writeln!(out, "{} {}", GENERIC_ERROR_PREFIX, msg)
}

/// `Question:` / `Answer:` lines of the quickstart.
pub fn print_quickstart(out: &mut dyn Write, question: &str, result: &str) -> io::Result<()> {
    writeln!(out, "Question: {}", question)?;
    writeln!(out, "Answer: {}", result.trim())
}

/// `Answer:` line, then a preview of each source document.
pub fn print_rag_answer(
    out: &mut dyn Write,
    answer: &Answer,
    preview_chars: usize,
) -> io::Result<()> {
    writeln!(out, "Answer: {}", answer.result.trim())?;
    if answer.source_documents.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Source documents:")?;
    for doc in &answer.source_documents {
        writeln!(out, "- {}", doc.preview(preview_chars))?;
    }
    Ok(())
}
