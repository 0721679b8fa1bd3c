//! Prompt templates with `{name}` placeholders.
//!
//! `{{` and `}}` render as literal braces. Formatting fails if a placeholder
//! has no value; extra values are ignored.

use anyhow::{bail, Result};

/// The quickstart single-question prompt.
///
/// Placeholders: `{user_input}`
pub const QUICKSTART_TEMPLATE: &str = "You are a helpful assistant.
Given the following user question, provide a concise answer.

Question: {user_input}

Answer:";

/// The RAG "stuff" prompt: all retrieved documents in one context block.
///
/// Placeholders: `{context}`, `{question}`
pub const RAG_TEMPLATE: &str = "Use the retrieved documents to answer the question succinctly.

{context}

Question: {question}
Answer:";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template string.
    ///
    /// Errors on an unclosed `{`, a stray `}` or an empty/invalid
    /// placeholder name.
    pub fn from_template(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => bail!("unclosed '{{' in prompt template"),
                        }
                    }
                    let name = name.trim().to_string();
                    if name.is_empty()
                        || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
                    {
                        bail!("invalid placeholder '{{{}}}' in prompt template", name);
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Var(name));
                }
                '}' => bail!("unmatched '}}' in prompt template"),
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    /// Placeholder names in order of first appearance.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Var(name) = seg {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder.
    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Var(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            anyhow::anyhow!("missing value for prompt variable '{}'", name)
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
