use embedding_provider::{
    default_http_config, Embedder, EmbedderError, HttpEmbedder, ProviderKind, HTTP_EMBED_DEFAULTS,
};

#[test]
fn default_config_builds_and_reports_metadata() {
    let embedder = HttpEmbedder::new(default_http_config()).expect("default configuration is valid");
    let info = embedder.info();
    assert_eq!(info.provider, ProviderKind::Http);
    assert_eq!(info.dimension, HTTP_EMBED_DEFAULTS.embedding_dimension);
    assert_eq!(info.embedding_model_id, HTTP_EMBED_DEFAULTS.embedding_model_id);
}

#[test]
fn zero_dimension_is_rejected() {
    let mut config = default_http_config();
    config.dimension = 0;
    let err = HttpEmbedder::new(config).expect_err("zero dimension must be rejected");
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}

#[test]
fn empty_endpoint_is_rejected() {
    let mut config = default_http_config();
    config.endpoint = "   ".into();
    let err = HttpEmbedder::new(config).expect_err("blank endpoint must be rejected");
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut config = default_http_config();
    config.max_batch_size = 0;
    let err = HttpEmbedder::new(config).expect_err("zero batch size must be rejected");
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}

#[tokio::test]
async fn empty_batch_short_circuits_without_a_request() {
    // Endpoint points nowhere; an empty batch must not touch it.
    let mut config = default_http_config();
    config.endpoint = "http://127.0.0.1:1".into();
    let embedder = HttpEmbedder::new(config).expect("configuration is valid");

    let empty: [&str; 0] = [];
    let vectors = embedder.embed_batch(&empty).await.expect("empty batches are allowed");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn overlong_input_fails_before_any_request() {
    let mut config = default_http_config();
    config.endpoint = "http://127.0.0.1:1".into();
    config.max_input_chars = 8;
    let embedder = HttpEmbedder::new(config).expect("configuration is valid");

    let err = embedder
        .embed("much longer than eight characters")
        .await
        .expect_err("inputs exceeding the limit should fail");
    match err {
        EmbedderError::InputTooLong { max_length, actual_length } => {
            assert_eq!(max_length, 8);
            assert!(actual_length > max_length);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
