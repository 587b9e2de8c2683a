use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tracing::{info, warn};

use crate::chat::{ChatRequest, ChatService, ServiceStatus};
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::embeddings::chunking::TextSegmenter;
use crate::embeddings::ollama::OllamaClient;
use crate::feedback::{FeedbackLoop, FeedbackSource};
use crate::indexer::{DocumentIngestionPipeline, IngestionReport};
use crate::mcp::{McpServer, register_default_tools};
use crate::rag::{DocumentRetriever, RetrievalOrchestrator};
use crate::router::QueryRouter;

/// Effective configuration: `config.toml` plus `RAG_*` environment overrides
#[inline]
pub fn load_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to resolve configuration directory")?;
    Config::load_effective(&config_dir).context("Failed to load configuration")
}

fn ollama_client(config: &Config) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    Ok(Arc::new(client))
}

/// Connect to the configured collection, creating it when missing.
#[inline]
pub async fn open_vector_store(config: &Config, client: Arc<OllamaClient>) -> Result<VectorStore> {
    let mut store = VectorStore::from_config(config, client);
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to open vector store at {}", config.vector_store_uri()))?;
    Ok(store)
}

/// Wire the router, retrieval pipeline and feedback loop into one service.
#[inline]
pub async fn build_chat_service(config: &Config) -> Result<ChatService> {
    let client = ollama_client(config)?;
    let store = open_vector_store(config, Arc::clone(&client)).await?;

    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open feedback database")?;
    let feedback = FeedbackLoop::new(database, config.feedback.clone());

    let rag = RetrievalOrchestrator::new(
        Arc::new(store) as Arc<dyn DocumentRetriever>,
        client,
        config.retrieval.clone(),
    )
    .with_feedback(
        Arc::new(feedback.clone()) as Arc<dyn FeedbackSource>,
        config.feedback.clone(),
    );

    Ok(
        ChatService::new(QueryRouter::new(config.router.clone()), Arc::new(rag))
            .with_feedback(feedback),
    )
}

/// Ingest every supported file under `directory`.
///
/// Per-file failures are listed in the returned report; only failures of
/// the store or model server are errors.
#[inline]
pub async fn ingest(config: &Config, directory: &Path) -> Result<IngestionReport> {
    let client = ollama_client(config)?;
    let store = open_vector_store(config, client).await?;
    let segmenter =
        TextSegmenter::from_config(&config.chunking).context("Invalid chunking configuration")?;

    info!(
        "Ingesting {} with chunk size {} and overlap {}",
        directory.display(),
        segmenter.chunk_size(),
        segmenter.overlap()
    );

    let pipeline = DocumentIngestionPipeline::new(segmenter, store);
    let report = pipeline
        .ingest_directory(directory)
        .await
        .with_context(|| format!("Failed to ingest {}", directory.display()))?;

    println!("{}", report.render());
    if report.failures.is_empty() {
        eprintln!("{}", style("✓ Ingestion complete").green());
    } else {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Ingestion finished with {} failed files",
                report.failures.len()
            ))
            .yellow()
        );
    }
    Ok(report)
}

/// Drop every chunk in the configured collection
#[inline]
pub async fn clear(config: &Config) -> Result<()> {
    let store = open_vector_store(config, ollama_client(config)?).await?;
    store.clear().await.context("Failed to clear vector store")?;
    eprintln!(
        "{}",
        style(format!(
            "✓ Cleared collection {}",
            config.vector_store.collection_name
        ))
        .green()
    );
    Ok(())
}

#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    eprintln!("{}", style("📊 Docs RAG Status").bold().cyan());
    eprintln!();

    let client = ollama_client(config)?;
    eprintln!("{}", style("Model Server:").bold().yellow());
    match client.check_health().await {
        Ok(()) => eprintln!("  ✅ Ollama reachable at {}", client.base_url()),
        Err(e) => eprintln!("  ❌ Ollama unavailable at {}: {:#}", client.base_url(), e),
    }

    eprintln!();
    let chat = match build_chat_service(config).await {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("  ❌ Knowledge base unavailable: {:#}", e);
            return Ok(());
        }
    };

    let status = chat.status().await;
    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    match (&status.status, &status.vector_store) {
        (ServiceStatus::Ready, Some(store)) => {
            eprintln!("  ✅ Ready");
            eprintln!("  Collection: {}", style(&store.collection_name).cyan());
            eprintln!("  Chunks: {}", store.document_count);
            eprintln!(
                "  Embeddings: {} ({} dimensions)",
                store.embedding_model, store.embedding_dimension
            );
        }
        _ => eprintln!("  ❌ Unavailable"),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Similarity threshold: {}",
        status.rag_service.similarity_threshold
    );
    eprintln!("  Retrieval count: {}", status.rag_service.retrieval_count);
    eprintln!(
        "  Max conversation history: {}",
        status.rag_service.max_conversation_history
    );

    eprintln!();
    eprintln!("💡 Next Steps:");
    eprintln!("   • Use 'docs-rag ingest <dir>' to add documents");
    eprintln!("   • Use 'docs-rag ask <question>' to try the assistant");
    eprintln!("   • Use 'docs-rag serve' to expose it to MCP clients");
    Ok(())
}

/// Answer one message and print the JSON response
#[inline]
pub async fn ask(config: &Config, message: String) -> Result<()> {
    let chat = build_chat_service(config).await?;
    match chat.handle(ChatRequest::new(message)).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            warn!("Chat request failed: {}", e);
            eprintln!("{}", style(e.user_message()).red());
            Err(e.into())
        }
    }
}

/// Print the feedback summary for the last `days` days
#[inline]
pub async fn feedback_report(config: &Config, days: u32) -> Result<()> {
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open feedback database")?;
    let summary = FeedbackLoop::new(database.clone(), config.feedback.clone())
        .summary(days)
        .await;
    database.close().await;
    println!("{}", summary?.render());
    Ok(())
}

/// Run the MCP tool server on stdio until the client disconnects or Ctrl+C.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let client = ollama_client(config)?;
    if let Err(e) = client.check_health().await {
        warn!("⚠️  Ollama is not ready, answers may fail: {:#}", e);
    }

    let chat = Arc::new(build_chat_service(config).await?);
    let server = McpServer::new("docs-rag", env!("CARGO_PKG_VERSION"))
        .with_instructions("Help-center assistant answering from ingested documentation");
    register_default_tools(&server, &chat).await;
    info!(
        "MCP server initialized with tools: {}",
        server.tool_names().await.join(", ")
    );

    tokio::select! {
        result = server.serve_stdio() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received interrupt signal, shutting down"),
    }
    Ok(())
}
