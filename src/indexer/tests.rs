use std::sync::Arc;

use super::*;
use crate::config::OllamaConfig;
use crate::embeddings::ollama::OllamaClient;
use crate::test_support::KeywordEmbedder;
use tempfile::TempDir;

async fn create_pipeline(temp_dir: &TempDir) -> DocumentIngestionPipeline {
    let uri = temp_dir.path().join("vectors").to_string_lossy().into_owned();
    let mut store = VectorStore::new(uri, "ingest_test", Arc::new(KeywordEmbedder::new(128)));
    store.initialize().await.expect("should initialize store");
    let segmenter = TextSegmenter::new(200, 20).expect("should create segmenter");
    DocumentIngestionPipeline::new(segmenter, store)
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("should create parent dirs");
    }
    std::fs::write(path, content).expect("should write file");
}

fn long_markdown() -> String {
    (1..=8)
        .map(|i| {
            format!(
                "## Step {}\n\nOpen the jobs page and review listing number {} before you apply to it.",
                i, i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn walk_is_sorted_and_skips_hidden_and_dependency_dirs() {
    let docs = TempDir::new().expect("should create temp dir");
    let root = docs.path();
    write(root, "b.md", "b");
    write(root, "a.txt", "a");
    write(root, "notes.pdf", "ignored");
    write(root, "guides/c.markdown", "c");
    write(root, ".git/d.md", "hidden");
    write(root, "node_modules/pkg/readme.md", "dependency");
    write(root, "target/doc.md", "build output");

    let files = collect_files(root).await.expect("should collect files");
    let relative: Vec<String> = files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .expect("should be under root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    assert_eq!(relative, vec!["a.txt", "b.md", "guides/c.markdown"]);
}

#[tokio::test]
async fn process_file_builds_consistent_metadata() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = create_pipeline(&temp_dir).await;
    write(temp_dir.path(), "docs/applying.md", &long_markdown());

    let chunks = pipeline
        .process_file(&temp_dir.path().join("docs/applying.md"))
        .await
        .expect("should process file");

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.chunk_index as usize, i);
        assert_eq!(chunk.metadata.total_chunks as usize, chunks.len());
        assert_eq!(chunk.metadata.source, "applying.md");
        assert_eq!(chunk.metadata.document_type, DocumentType::Markdown);
        assert!(chunk.text.chars().count() <= 200);
        assert!(!chunk.text.contains('#'));
        assert!(chunk.metadata.id.is_none());
    }
}

#[tokio::test]
async fn ingest_reports_per_file_counts_and_failures() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = create_pipeline(&temp_dir).await;
    let docs = temp_dir.path().join("docs");
    write(&docs, "applying.md", &long_markdown());
    write(&docs, "empty.txt", "   \n");
    write(&docs, "withdraw.txt", "Withdraw an application from the My Jobs page.");

    let report = pipeline
        .ingest_directory(&docs)
        .await
        .expect("per-file failures should not abort ingestion");

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].file.ends_with("empty.txt"));
    assert_eq!(
        report.total_chunks,
        report.files.iter().map(|f| f.chunks).sum::<usize>()
    );

    let stored = pipeline.store().stats().await.expect("should get stats");
    assert_eq!(stored.count, report.total_chunks);

    let rendered = report.render();
    assert!(rendered.contains("Files processed: 2"));
    assert!(rendered.contains("empty.txt: Empty input"));
}

#[tokio::test]
async fn ingesting_after_clear_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = create_pipeline(&temp_dir).await;
    let docs = temp_dir.path().join("docs");
    write(&docs, "applying.md", &long_markdown());
    write(&docs, "profile.txt", &"Keep your profile and resume up to date. ".repeat(20));

    let first = pipeline.ingest_directory(&docs).await.expect("should ingest");
    pipeline.store().clear().await.expect("should clear");
    let second = pipeline.ingest_directory(&docs).await.expect("should ingest again");

    assert_eq!(first, second);
    assert_eq!(
        pipeline.store().stats().await.expect("should get stats").count,
        second.total_chunks
    );
}

#[tokio::test]
async fn uninitialized_store_is_a_hard_failure() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let uri = temp_dir.path().join("vectors").to_string_lossy().into_owned();
    let store = VectorStore::new(uri, "ingest_test", Arc::new(KeywordEmbedder::new(128)));
    let pipeline = DocumentIngestionPipeline::new(
        TextSegmenter::new(200, 20).expect("should create segmenter"),
        store,
    );

    assert!(matches!(
        pipeline.ingest_directory(temp_dir.path()).await,
        Err(RagError::NotInitialized)
    ));
}

#[tokio::test]
async fn unreachable_model_server_aborts_ingestion() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let docs = temp_dir.path().join("docs");
    write(&docs, "applying.md", "# Applying\n\nClick the Apply button.");
    write(&docs, "withdraw.txt", "Withdraw from the My Jobs page.");

    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("should reserve a port")
        .port();
    let client = OllamaClient::new(&OllamaConfig {
        host: "127.0.0.1".to_string(),
        port,
        embedding_dimension: 8,
        retry_attempts: 1,
        ..OllamaConfig::default()
    })
    .expect("should create client");

    let uri = temp_dir.path().join("vectors").to_string_lossy().into_owned();
    let mut store = VectorStore::new(uri, "ingest_test", Arc::new(client));
    store.initialize().await.expect("should initialize store");
    let pipeline = DocumentIngestionPipeline::new(
        TextSegmenter::new(200, 20).expect("should create segmenter"),
        store,
    );

    assert!(matches!(
        pipeline.ingest_directory(&docs).await,
        Err(RagError::Network(_))
    ));
    assert_eq!(
        pipeline.store().stats().await.expect("should get stats").count,
        0
    );
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = create_pipeline(&temp_dir).await;

    let result = pipeline
        .ingest_directory(&temp_dir.path().join("does-not-exist"))
        .await;
    assert!(matches!(result, Err(RagError::Io(_))));
}

#[test]
fn fatal_errors_are_store_level() {
    assert!(is_fatal(&RagError::Database("gone".to_string())));
    assert!(is_fatal(&RagError::Network("connection refused".to_string())));
    assert!(is_fatal(&RagError::DimensionMismatch {
        expected: 768,
        actual: 384
    }));
    assert!(!is_fatal(&RagError::EmptyInput("file is empty".to_string())));
    assert!(!is_fatal(&RagError::Embedding("bad text".to_string())));
}
