//! Retrieval-augmented question answering over the demo corpus.
//!
//! The flow embeds three short documents into an [`InMemoryStore`], retrieves
//! the top `k` for the query, stuffs them into [`RAG_TEMPLATE`] and asks the
//! completion model. There is no offline path: without a credential the
//! command fails with a configuration error.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::QaError;
use crate::llm::{CompletionModel, OpenAIChat};
use crate::models::{Answer, Document};
use crate::prompt::{PromptTemplate, RAG_TEMPLATE};
use crate::report;
use crate::store::{build_or_load, Retriever};

pub const DEFAULT_RAG_QUERY: &str = "什么是 Chroma？";

/// The three documents indexed by the demo, each tagged with its position.
pub fn demo_corpus() -> Vec<Document> {
    [
        "LangChain 是一个用于构建基于 LLM 应用的框架。它把 prompt、chains、agents、memory 组合在一起。",
        "Chroma 是一个轻量的向量数据库，常用于本地开发与测试。",
        "Embeddings 将文本转换为向量，常用 OpenAI 的 embedding 接口或本地模型。",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| Document::new(*text).with_metadata("source", format!("demo-{}", i)))
    .collect()
}

/// "Stuff" question answering: every retrieved document goes into one prompt.
pub struct RetrievalQa {
    model: Arc<dyn CompletionModel>,
    retriever: Box<dyn Retriever>,
    prompt: PromptTemplate,
}

impl RetrievalQa {
    pub fn new(model: Arc<dyn CompletionModel>, retriever: Box<dyn Retriever>) -> Result<Self> {
        Ok(Self {
            model,
            retriever,
            prompt: PromptTemplate::from_template(RAG_TEMPLATE)?,
        })
    }

    /// Replace the answering prompt. It may use `{context}` and `{question}`.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, QaError> {
        let docs = self
            .retriever
            .relevant_documents(question)
            .await
            .map_err(QaError::Retrieval)?;
        debug!(retrieved = docs.len(), "retrieved source documents");

        let context = docs
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self
            .prompt
            .format(&[("context", context.as_str()), ("question", question)])
            .map_err(QaError::Prompt)?;

        let result = self.model.complete(&prompt).await?;
        Ok(Answer {
            result,
            source_documents: docs,
        })
    }
}

/// Ask `query` and print either the answer or the classified error.
///
/// Runtime failures are reported on `out` and are not propagated; only a
/// failing writer returns `Err`.
pub async fn answer_question(
    qa: &RetrievalQa,
    query: &str,
    preview_chars: usize,
    out: &mut dyn Write,
) -> Result<()> {
    match qa.ask(query).await {
        Ok(answer) => report::print_rag_answer(out, &answer, preview_chars)?,
        Err(QaError::Completion(e)) => report::print_completion_error(out, &e)?,
        Err(e) => report::print_generic_error(out, &e.to_string())?,
    }
    Ok(())
}

/// The `rag` command.
///
/// A missing credential is returned as an error. Failures while building
/// the store or answering are printed and the function still returns `Ok`.
pub async fn run_rag(config: &Config, query: &str, k: usize, out: &mut dyn Write) -> Result<()> {
    let key = config.require_api_key()?.clone();
    let k = k.max(1);

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
        &config.embedding,
        &config.llm,
        key.clone(),
    )?);

    let store = match build_or_load(&demo_corpus(), embedder.as_ref(), &config.store).await {
        Ok(store) => store,
        Err(e) => {
            report::print_generic_error(out, &format!("{:#}", e))?;
            return Ok(());
        }
    };
    info!(collection = store.collection(), documents = store.len(), k, "vector store ready");

    let chat = OpenAIChat::new(&config.llm, key)?.with_temperature(config.llm.rag_temperature);
    let qa = RetrievalQa::new(Arc::new(chat), Box::new(store.as_retriever(embedder, k)))?;

    answer_question(&qa, query, config.retrieval.preview_chars, out).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, ConfigError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRetriever(Vec<Document>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn relevant_documents(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn relevant_documents(&self, _query: &str) -> Result<Vec<Document>> {
            anyhow::bail!("embedding endpoint unreachable")
        }
    }

    struct Scripted {
        reply: Result<String, CompletionError>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: Result<String, CompletionError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn two_docs() -> Vec<Document> {
        demo_corpus().into_iter().skip(1).collect()
    }

    #[test]
    fn test_demo_corpus() {
        let docs = demo_corpus();
        assert_eq!(docs.len(), 3);
        assert!(docs[1].page_content.starts_with("Chroma"));
        assert_eq!(docs[2].metadata["source"], "demo-2");
    }

    #[tokio::test]
    async fn test_ask_stuffs_context_into_prompt() {
        let model = Scripted::new(Ok("Chroma 是向量数据库。".into()));
        let qa = RetrievalQa::new(model.clone(), Box::new(FixedRetriever(two_docs()))).unwrap();

        let answer = qa.ask("什么是 Chroma？").await.unwrap();
        assert_eq!(answer.result, "Chroma 是向量数据库。");
        assert_eq!(answer.source_documents.len(), 2);

        let prompts = model.prompts.lock().unwrap();
        let docs = two_docs();
        let expected_context = format!("{}\n\n{}", docs[0].page_content, docs[1].page_content);
        assert!(prompts[0].contains(&expected_context));
        assert!(prompts[0].contains("Question: 什么是 Chroma？"));
    }

    #[tokio::test]
    async fn test_answer_question_prints_sources() {
        let qa = RetrievalQa::new(
            Scripted::new(Ok(" fixed answer \n".into())),
            Box::new(FixedRetriever(two_docs())),
        )
        .unwrap();
        let mut out = Vec::new();
        answer_question(&qa, "q", 120, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Answer: fixed answer");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Source documents:");
        assert_eq!(lines.iter().filter(|l| l.starts_with("- ")).count(), 2);
    }

    #[tokio::test]
    async fn test_quota_error_prints_only_friendly_message() {
        let body = r#"{"error":{"message":"quota","code":"insufficient_quota"}}"#;
        let qa = RetrievalQa::new(
            Scripted::new(Err(CompletionError::from_api(429, body))),
            Box::new(FixedRetriever(two_docs())),
        )
        .unwrap();
        let mut out = Vec::new();
        answer_question(&qa, "q", 120, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}\n", report::QUOTA_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_retrieval_error_is_generic() {
        let qa = RetrievalQa::new(Scripted::new(Ok("unused".into())), Box::new(FailingRetriever))
            .unwrap();
        let mut out = Vec::new();
        answer_question(&qa, "q", 120, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(report::GENERIC_ERROR_PREFIX));
        assert!(text.contains("embedding endpoint unreachable"));
    }

    #[tokio::test]
    async fn test_prompt_failure_is_not_a_retrieval_error() {
        let model = Scripted::new(Ok("unused".into()));
        let qa = RetrievalQa::new(model.clone(), Box::new(FixedRetriever(two_docs())))
            .unwrap()
            .with_prompt(PromptTemplate::from_template("{context} {history}").unwrap());

        let err = qa.ask("q").await.unwrap_err();
        assert!(matches!(err, QaError::Prompt(_)));
        assert!(err.to_string().starts_with("failed to build prompt:"));
        assert!(err.to_string().contains("history"));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_prompt_is_used() {
        let model = Scripted::new(Ok("ok".into()));
        let qa = RetrievalQa::new(model.clone(), Box::new(FixedRetriever(two_docs())))
            .unwrap()
            .with_prompt(PromptTemplate::from_template("Q={question}").unwrap());
        qa.ask("hi").await.unwrap();
        assert_eq!(model.prompts.lock().unwrap()[0], "Q=hi");
    }

    #[tokio::test]
    async fn test_run_rag_without_credential_is_fatal() {
        let mut cfg = Config::minimal();
        cfg.fake_llm = true;
        let mut out = Vec::new();
        let err = run_rag(&cfg, DEFAULT_RAG_QUERY, 2, &mut out).await.unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(out.is_empty());
    }
}
