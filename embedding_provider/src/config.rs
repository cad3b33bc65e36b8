use crate::embedder::HttpEmbedderConfig;

/// Default settings for the HTTP embedding client.
#[derive(Debug, Clone, Copy)]
pub struct HttpEmbedDefaults {
    pub endpoint: &'static str,
    pub embedding_dimension: usize,
    pub max_input_chars: usize,
    pub max_batch_size: usize,
    pub embedding_model_id: &'static str,
}

/// Shared defaults so the CLI, service, and tests stay in sync.
pub const HTTP_EMBED_DEFAULTS: HttpEmbedDefaults = HttpEmbedDefaults {
    endpoint: "http://localhost:8000",
    embedding_dimension: 1024,
    max_input_chars: 32_768,
    max_batch_size: 32,
    embedding_model_id: "tei-default",
};

/// Convenience helper to build an [`HttpEmbedderConfig`] from the
/// shared defaults.
pub fn default_http_config() -> HttpEmbedderConfig {
    HttpEmbedderConfig {
        endpoint: HTTP_EMBED_DEFAULTS.endpoint.into(),
        auth_token: None,
        dimension: HTTP_EMBED_DEFAULTS.embedding_dimension,
        max_input_chars: HTTP_EMBED_DEFAULTS.max_input_chars,
        max_batch_size: HTTP_EMBED_DEFAULTS.max_batch_size,
        embedding_model_id: HTTP_EMBED_DEFAULTS.embedding_model_id.into(),
    }
}
