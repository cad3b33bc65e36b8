use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Identifies the backing implementation that powers an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Http,
}

/// Static metadata describing a particular embedder instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub provider: ProviderKind,
    pub embedding_model_id: String,
    pub dimension: usize,
}

/// Errors that can be produced by embedder operations.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("input text exceeds max length of {max_length} characters, actual length: {actual_length}")]
    InputTooLong { max_length: usize, actual_length: usize },
    #[error("provider failure: {message}")]
    ProviderFailure { message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Core interface for all embedder implementations.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;
    fn info(&self) -> &EmbedderInfo;
}

/// Configuration for the HTTP embedding client (TEI-style server).
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL of the embedding server; `/embed` is appended.
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub dimension: usize,
    pub max_input_chars: usize,
    /// Inputs per request; larger batches are split transparently.
    pub max_batch_size: usize,
    pub embedding_model_id: String,
}

/// Embedder that posts inputs to an external embedding server.
#[derive(Debug)]
pub struct HttpEmbedder {
    info: EmbedderInfo,
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    max_input_chars: usize,
    max_batch_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Vectors(Vec<Vec<f32>>),
    Wrapped { embeddings: Vec<Vec<f32>> },
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbedderError> {
        if config.dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "dimension must be greater than zero".into(),
            });
        }
        if config.max_batch_size == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "max_batch_size must be greater than zero".into(),
            });
        }
        if config.endpoint.trim().is_empty() {
            return Err(EmbedderError::InvalidConfiguration {
                message: "endpoint must not be empty".into(),
            });
        }

        let info = EmbedderInfo {
            provider: ProviderKind::Http,
            embedding_model_id: config.embedding_model_id,
            dimension: config.dimension,
        };
        Ok(Self {
            info,
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
            max_input_chars: config.max_input_chars,
            max_batch_size: config.max_batch_size,
        })
    }

    fn check_lengths(&self, texts: &[&str]) -> Result<(), EmbedderError> {
        let longest = texts.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        if longest > self.max_input_chars {
            return Err(EmbedderError::InputTooLong {
                max_length: self.max_input_chars,
                actual_length: longest,
            });
        }
        Ok(())
    }

    async fn post_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut request = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&serde_json::json!({ "inputs": texts }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        let vectors = match response.json::<EmbedResponse>().await? {
            EmbedResponse::Vectors(v) => v,
            EmbedResponse::Wrapped { embeddings } => embeddings,
        };

        if vectors.len() != texts.len() {
            return Err(EmbedderError::ProviderFailure {
                message: format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            });
        }
        for vector in &vectors {
            if vector.len() != self.info.dimension {
                return Err(EmbedderError::ProviderFailure {
                    message: format!(
                        "expected dimension {}, got {}",
                        self.info.dimension,
                        vector.len()
                    ),
                });
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| EmbedderError::ProviderFailure {
            message: "server returned no vectors".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.check_lengths(texts)?;

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch_size) {
            let vectors = self.post_batch(batch).await?;
            out.extend(vectors);
        }
        Ok(out)
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}
