#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Retrieval, feedback-driven strategy and chat routing over a real store

mod common;

use std::path::Path;
use std::sync::Arc;

use docs_rag::chat::{ChatRequest, ChatService, ResponseType};
use docs_rag::database::Database;
use docs_rag::database::lancedb::{DocumentType, VectorStore};
use docs_rag::database::sqlite::models::{FeedbackKind, NewFeedback};
use docs_rag::embeddings::chunking::TextSegmenter;
use docs_rag::feedback::{FeedbackConfig, FeedbackLoop, FeedbackSource};
use docs_rag::indexer::DocumentIngestionPipeline;
use docs_rag::rag::{
    AnswerOutcome, DocumentRetriever, INSUFFICIENT_KNOWLEDGE_MESSAGE, RetrievalConfig,
    RetrievalOrchestrator, StrategyKind,
};
use docs_rag::router::QueryRouter;
use tempfile::TempDir;

use common::{BagOfWordsEmbedder, FixedGenerator, RecordingRetriever};

const APPLY_QUERY: &str = "How do I apply to a job?";

fn write_docs(root: &Path) {
    std::fs::create_dir_all(root).expect("should create docs dir");
    std::fs::write(
        root.join("applying.md"),
        "# Applying\n\nTo apply, click the Apply button on a job listing.\n",
    )
    .expect("should write file");
    std::fs::write(
        root.join("interviews.md"),
        "# Interviews\n\nEmployers schedule an interview after reviewing your application. \
         The interview process for employers starts with a screening call.\n",
    )
    .expect("should write file");
    std::fs::write(
        root.join("profile.txt"),
        "Update your profile photo and contact details from the settings page.",
    )
    .expect("should write file");
}

/// Ingests the sample docs and hands back the populated store
async fn ingested_store(temp_dir: &TempDir) -> VectorStore {
    let docs = temp_dir.path().join("docs");
    write_docs(&docs);
    let uri = temp_dir.path().join("vectors").to_string_lossy().into_owned();
    let mut store = VectorStore::new(uri, "help_center", Arc::new(BagOfWordsEmbedder::new(256)));
    store.initialize().await.expect("should initialize store");

    let pipeline = DocumentIngestionPipeline::new(
        TextSegmenter::new(500, 50).expect("should create segmenter"),
        store,
    );
    let report = pipeline.ingest_directory(&docs).await.expect("should ingest");
    assert_eq!(report.files_processed, 3);
    pipeline.into_store()
}

async fn feedback_loop(temp_dir: &TempDir) -> FeedbackLoop {
    let database = Database::initialize_from_config_dir(&temp_dir.path().join("config"))
        .await
        .expect("should open database");
    FeedbackLoop::new(database, FeedbackConfig::default())
}

#[tokio::test]
async fn apply_question_cites_the_apply_document() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ingested_store(&temp_dir).await;
    let generator = Arc::new(FixedGenerator::new("Click Apply on the listing."));
    let orchestrator = RetrievalOrchestrator::new(
        Arc::new(store) as Arc<dyn DocumentRetriever>,
        generator.clone(),
        RetrievalConfig::default(),
    );

    let answer = orchestrator
        .answer(APPLY_QUERY, &[])
        .await
        .expect("should answer");

    assert_eq!(answer.outcome, AnswerOutcome::Generated);
    assert_eq!(answer.response, "Click Apply on the listing.");
    assert_eq!(answer.sources[0].document, "applying.md");
    assert_eq!(answer.sources[0].metadata.document_type, DocumentType::Markdown);
    assert!(answer.sources.iter().all(|source| source.score >= 0.5));
    assert_eq!(answer.strategy, Some(StrategyKind::Default));
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn repeated_history_free_query_is_served_from_cache() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ingested_store(&temp_dir).await;
    let retriever = Arc::new(RecordingRetriever::new(store));
    let generator = Arc::new(FixedGenerator::new("Click Apply on the listing."));
    let orchestrator = RetrievalOrchestrator::new(
        retriever.clone(),
        generator.clone(),
        RetrievalConfig::default(),
    );

    let first = orchestrator
        .answer(APPLY_QUERY, &[])
        .await
        .expect("should answer");
    let second = orchestrator
        .answer(APPLY_QUERY, &[])
        .await
        .expect("should answer again");

    assert_eq!(first.response, second.response);
    assert_eq!(first.sources, second.sources);
    assert_eq!(second.outcome, AnswerOutcome::Cached);
    assert_eq!(generator.call_count(), 1);
    assert_eq!(retriever.searches().len(), 1);

    let usage = orchestrator.usage();
    assert_eq!(usage.cache_hits, 1);
    assert_eq!(usage.cache_size, 1);
}

#[tokio::test]
async fn unrelated_question_gets_the_insufficient_knowledge_reply() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ingested_store(&temp_dir).await;
    let generator = Arc::new(FixedGenerator::new("should not be used"));
    let orchestrator = RetrievalOrchestrator::new(
        Arc::new(store) as Arc<dyn DocumentRetriever>,
        generator.clone(),
        RetrievalConfig::default(),
    );

    let answer = orchestrator
        .answer(
            "Explain quantum chromodynamics lattice gauge symmetry breaking thoroughly",
            &[],
        )
        .await
        .expect("should answer");

    assert_eq!(answer.outcome, AnswerOutcome::InsufficientKnowledge);
    assert_eq!(answer.response, INSUFFICIENT_KNOWLEDGE_MESSAGE);
    assert!(answer.sources.is_empty());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn negative_feedback_switches_to_enhanced_retrieval() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ingested_store(&temp_dir).await;
    let feedback = feedback_loop(&temp_dir).await;
    for i in 0..3 {
        feedback
            .record_at(
                NewFeedback {
                    message_id: format!("msg-{i}"),
                    query: APPLY_QUERY.to_string(),
                    feedback: FeedbackKind::Negative,
                    comment: None,
                    user_id: None,
                },
                chrono::Utc::now(),
            )
            .await
            .expect("should record feedback");
    }

    let retriever = Arc::new(RecordingRetriever::new(store));
    let orchestrator = RetrievalOrchestrator::new(
        retriever.clone(),
        Arc::new(FixedGenerator::new("Click Apply on the listing.")),
        RetrievalConfig::default(),
    )
    .with_feedback(
        Arc::new(feedback) as Arc<dyn FeedbackSource>,
        FeedbackConfig::default(),
    );

    let answer = orchestrator
        .answer(APPLY_QUERY, &[])
        .await
        .expect("should answer");

    assert_eq!(answer.strategy, Some(StrategyKind::Enhanced));
    let searches = retriever.searches();
    assert_eq!(searches.len(), 1);
    let (query, top_k) = &searches[0];
    assert_eq!(*top_k, 6);
    assert!(query.starts_with("how do i apply to a job?"), "{query}");
    assert!(query.contains("application"), "{query}");
    assert!(query.contains("position"), "{query}");
    assert_eq!(answer.sources[0].document, "applying.md");
}

#[tokio::test]
async fn chat_routes_off_topic_without_touching_the_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ingested_store(&temp_dir).await;
    let retriever = Arc::new(RecordingRetriever::new(store));
    let generator = Arc::new(FixedGenerator::new("Employers start with a screening call."));
    let orchestrator = RetrievalOrchestrator::new(
        retriever.clone(),
        generator.clone(),
        RetrievalConfig::default(),
    );
    let chat = ChatService::new(QueryRouter::default(), Arc::new(orchestrator));

    for message in ["What's the weather today?", "Tell me a joke"] {
        let response = chat
            .handle(ChatRequest::new(message))
            .await
            .expect("should respond");
        assert_eq!(response.response_type, ResponseType::OffTopic, "{message}");
        assert!(response.sources.is_empty());
        assert!(!response.actions.is_empty());
    }
    assert!(retriever.searches().is_empty());
    assert_eq!(generator.call_count(), 0);

    let response = chat
        .handle(ChatRequest::new("What is the interview process for employers?"))
        .await
        .expect("should respond");
    assert_eq!(response.response_type, ResponseType::Documentation);
    assert_eq!(response.response, "Employers start with a screening call.");
    assert_eq!(response.sources[0].document, "interviews.md");
    assert_eq!(retriever.searches().len(), 1);
}
