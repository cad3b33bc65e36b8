//! Embedding seam: the `Embedder` trait and the HTTP client used to
//! reach an external text-embedding service.

pub mod config;
pub mod embedder;

pub use config::{default_http_config, HTTP_EMBED_DEFAULTS};
pub use embedder::{Embedder, EmbedderError, EmbedderInfo, HttpEmbedder, HttpEmbedderConfig, ProviderKind};
