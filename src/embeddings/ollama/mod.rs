
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{EmbeddingProvider, TextGenerator, check_dimension, validate_embedding_input};
use crate::{BatchFailure, RagError};

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 500;

/// Client for the embedding and generation endpoints of an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    embedding_dimension: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
    initial_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            embedding_dimension: config.embedding_dimension as usize,
            agent,
            retry_attempts: config.retry_attempts.max(1),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the second attempt; later attempts double it.
    #[inline]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_models().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} (embedding {}, generation {})",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// [`health_check`](Self::health_check) on the blocking pool
    #[inline]
    pub async fn check_health(&self) -> Result<()> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.health_check())
            .await
            .context("Health check task failed")?
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        self.agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .context("Failed to ping Ollama server")?;

        Ok(())
    }

    /// Validate that the configured embedding and generation models are available
    #[inline]
    pub fn validate_models(&self) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;
        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        for model in [&self.embedding_model, &self.generation_model] {
            if !available.contains(&model.as_str()) {
                warn!(
                    "Model {} not found. Available models: {:?}",
                    model, available
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available
                ));
            }
        }

        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// One embedding request, no retry
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, RequestFailure> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: text,
        };

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RequestFailure::Rejected(format!("invalid embedding URL: {}", e)))?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            RequestFailure::Rejected(format!("failed to serialize embedding request: {}", e))
        })?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(RequestFailure::from_ureq)?;

        let embed_response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RequestFailure::Rejected(format!("failed to parse embedding response: {}", e))
        })?;

        embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RequestFailure::Rejected("embedding response contained no vectors".to_string()))
    }

    /// Complete a prompt without streaming
    #[inline]
    pub fn generate_completion(&self, prompt: &str) -> Result<String> {
        debug!("Generating completion (prompt length: {})", prompt.len());

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: GENERATION_TEMPERATURE,
                num_predict: GENERATION_MAX_TOKENS,
            },
        };

        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build generation URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize generation request")?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow::anyhow!("Generation request failed: {}", e))?;

        let generate_response: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generation response")?;

        Ok(generate_response.response.trim().to_string())
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, RequestFailure> {
        let client = self.clone();
        let owned = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&owned))
            .await
            .map_err(|e| RequestFailure::Rejected(format!("embedding task failed: {}", e)))?
    }

    /// Embed one batch item, retrying transport and 5xx failures with exponential backoff.
    async fn embed_with_retry(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut attempt = 1;
        loop {
            match self.request_embedding(text).await {
                Ok(vector) => {
                    check_dimension(&vector, self.embedding_dimension)?;
                    return Ok(vector);
                }
                Err(failure) if failure.is_retryable() && attempt < self.retry_attempts => {
                    let delay = self
                        .initial_backoff
                        .saturating_mul(2_u32.saturating_pow(attempt - 1));
                    warn!(
                        "Embedding attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.retry_attempts, failure, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.into_embedding_error()),
            }
        }
    }
}

/// Why a single HTTP exchange with the server failed
#[derive(Debug)]
enum RequestFailure {
    /// No usable response: refused connection, unknown host, timeout or broken stream
    Transport(String),
    /// The server answered with a 5xx status
    Server(u16),
    Rejected(String),
}

impl RequestFailure {
    fn from_ureq(error: ureq::Error) -> Self {
        match &error {
            ureq::Error::StatusCode(status) if *status >= 500 => Self::Server(*status),
            ureq::Error::StatusCode(status) => {
                Self::Rejected(format!("client error: HTTP {}", status))
            }
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Transport(error.to_string()),
            _ => Self::Rejected(error.to_string()),
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    fn into_embedding_error(self) -> RagError {
        match self {
            Self::Transport(message) => {
                RagError::Network(format!("embedding server unreachable: {}", message))
            }
            other => RagError::Embedding(other.to_string()),
        }
    }
}

impl fmt::Display for RequestFailure {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "transport error: {}", message),
            Self::Server(status) => write!(f, "server error: HTTP {}", status),
            Self::Rejected(message) => write!(f, "{}", message),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    /// Single attempt: this sits on the query path
    async fn embed_one(&self, text: &str) -> crate::Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Validation("cannot embed empty text".to_string()));
        }

        let vector = self
            .request_embedding(text)
            .await
            .map_err(RequestFailure::into_embedding_error)?;

        check_dimension(&vector, self.embedding_dimension)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        validate_embedding_input(texts)?;

        let mut vectors = Vec::with_capacity(texts.len());
        let mut failures = Vec::new();

        // Sequential on purpose: the server rate-limits concurrent embedding calls
        for (index, text) in texts.iter().enumerate() {
            match self.embed_with_retry(text).await {
                Ok(vector) => vectors.push(vector),
                Err(err @ (RagError::DimensionMismatch { .. } | RagError::Network(_))) => {
                    error!("Aborting batch at item {} of {}: {}", index, texts.len(), err);
                    return Err(err);
                }
                Err(err) => {
                    warn!("Failed to embed item {}: {}", index, err);
                    failures.push(BatchFailure {
                        index,
                        error: err.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(vectors)
        } else {
            Err(RagError::EmbeddingBatch {
                failures,
                total: texts.len(),
            })
        }
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> crate::Result<String> {
        let client = self.clone();
        let owned = prompt.to_string();
        tokio::task::spawn_blocking(move || client.generate_completion(&owned))
            .await
            .map_err(|e| RagError::GenerationFailed(format!("generation task failed: {}", e)))?
            .map_err(|e| RagError::GenerationFailed(format!("{:#}", e)))
    }

    fn model_name(&self) -> &str {
        &self.generation_model
    }
}
