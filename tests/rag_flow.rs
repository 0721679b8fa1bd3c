use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use rag_quickstart::config::StoreConfig;
use rag_quickstart::embedding::Embedder;
use rag_quickstart::error::CompletionError;
use rag_quickstart::llm::CompletionModel;
use rag_quickstart::rag::{answer_question, demo_corpus, RetrievalQa, DEFAULT_RAG_QUERY};
use rag_quickstart::report::QUOTA_MESSAGE;
use rag_quickstart::store::build_or_load;

/// Bag-of-keywords embedder: one dimension per topic word.
struct TopicEmbedder;

impl TopicEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        ["LangChain", "Chroma", "Embeddings", "向量"]
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    fn model_name(&self) -> &str {
        "topic-test"
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

struct Canned {
    reply: Result<String, CompletionError>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionModel for Canned {
    fn model_name(&self) -> &str {
        "canned"
    }
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

async fn qa_with(reply: Result<String, CompletionError>) -> (RetrievalQa, Arc<Canned>) {
    let embedder: Arc<dyn Embedder> = Arc::new(TopicEmbedder);
    let store = build_or_load(&demo_corpus(), embedder.as_ref(), &StoreConfig::default())
        .await
        .unwrap();
    let model = Arc::new(Canned {
        reply,
        prompts: Mutex::new(Vec::new()),
    });
    let qa = RetrievalQa::new(model.clone(), Box::new(store.as_retriever(embedder, 2))).unwrap();
    (qa, model)
}

#[tokio::test]
async fn test_rag_answer_lists_two_sources() {
    let (qa, model) = qa_with(Ok("Chroma 是一个轻量的向量数据库。".into())).await;
    let mut out = Vec::new();
    answer_question(&qa, DEFAULT_RAG_QUERY, 120, &mut out)
        .await
        .unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("Answer: Chroma 是一个轻量的向量数据库。\n\nSource documents:\n"));
    let sources: Vec<&str> = text.lines().filter(|l| l.starts_with("- ")).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].starts_with("- Chroma"));

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Chroma 是一个轻量的向量数据库，常用于本地开发与测试。"));
}

#[tokio::test]
async fn test_rag_quota_error_prints_friendly_message_only() {
    let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
    let (qa, _) = qa_with(Err(CompletionError::from_api(400, body))).await;
    let mut out = Vec::new();
    answer_question(&qa, DEFAULT_RAG_QUERY, 120, &mut out)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", QUOTA_MESSAGE));
}

#[tokio::test]
async fn test_rag_other_error_is_generic() {
    let (qa, _) = qa_with(Err(CompletionError::from_api(401, "bad key"))).await;
    let mut out = Vec::new();
    answer_question(&qa, DEFAULT_RAG_QUERY, 120, &mut out)
        .await
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("运行 LLM 时发生错误： "));
    assert!(text.contains("bad key"));
    assert!(!text.contains("Source documents:"));
}
