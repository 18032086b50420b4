//! Embedding provider client and the adapter the rest of docent talks to.
//!
//! [`EmbeddingClient`] speaks the OpenAI-compatible `/v1/embeddings` API.
//! [`Embedder`] wraps any [`EmbeddingService`] with batching, retry, and L2
//! normalization so that similarity at query time is a plain dot product.

use std::future::Future;
use std::time::Duration;

use docent_core::{DocentError, EmbeddingConfig, Provider};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Norms below this are treated as zero and the vector is left unscaled.
const MIN_NORM: f32 = 1e-12;

/// An external model that turns texts into vectors, one per input, in input
/// order.
pub trait EmbeddingService: Send + Sync {
    /// Name of the model; recorded in the index and checked at query time.
    fn model(&self) -> &str;

    /// Embed `texts` in a single request.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, DocentError>> + Send;
}

/// Client for an OpenAI-compatible embeddings endpoint.
///
/// # Examples
///
/// ```
/// use docent_index::embedding::{EmbeddingClient, EmbeddingService};
///
/// let client = EmbeddingClient::new("test-key", "text-embedding-3-small");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingClient {
    /// Create a client against the default endpoint.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.to_string()),
            base_url: Provider::OpenAi.default_base_url().to_string(),
            model: model.to_string(),
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Without a configured key, the provider's env var is read
    /// (`OPENAI_API_KEY` for `openai`). `ollama` needs no key.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Config`] if the provider needs a key and none
    /// is available, or the HTTP client cannot be constructed.
    ///
    /// # Examples
    ///
    /// ```
    /// use docent_core::{EmbeddingConfig, Provider};
    /// use docent_index::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig {
    ///     api_key: Some("sk-test".into()),
    ///     base_url: Some("http://10.0.0.5:8000/".into()),
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// assert_eq!(client.base_url(), "http://10.0.0.5:8000");
    ///
    /// let local = EmbeddingConfig {
    ///     provider: Provider::Ollama,
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = EmbeddingClient::with_config(&local).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:11434");
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, DocentError> {
        let api_key = config.provider.resolve_api_key(config.api_key.as_deref());
        if let (None, Some(var)) = (&api_key, config.provider.api_key_env()) {
            return Err(DocentError::Config(format!(
                "embedding API key not found for provider {}: set embedding.api_key in .docent.toml or {var} env var",
                config.provider
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| config.provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
        })
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl EmbeddingService for EmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(format!("{}/v1/embeddings", self.base_url));
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }
        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            let message = format!("embedding API returned {status}: {body}");
            return Err(if status.as_u16() == 429 {
                DocentError::RateLimited(message)
            } else if status.is_server_error() {
                DocentError::ServiceUnavailable(message)
            } else {
                DocentError::Embedding(message)
            });
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DocentError::Embedding(format!("failed to parse response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(DocentError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn map_transport_error(err: reqwest::Error) -> DocentError {
    if err.is_timeout() {
        DocentError::Timeout(format!("embedding request: {err}"))
    } else if err.is_connect() {
        DocentError::ServiceUnavailable(format!("embedding request: {err}"))
    } else {
        DocentError::Embedding(format!("HTTP request failed: {err}"))
    }
}

/// Scale `v` to unit length in place. Near-zero vectors are left as they are.
///
/// # Examples
///
/// ```
/// use docent_index::embedding::l2_normalize;
///
/// let mut v = vec![3.0, 4.0];
/// l2_normalize(&mut v);
/// assert!((v[0] - 0.6).abs() < 1e-6);
/// assert!((v[1] - 0.8).abs() < 1e-6);
/// ```
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > MIN_NORM {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Batching, retrying, normalizing front for an [`EmbeddingService`].
///
/// # Examples
///
/// ```no_run
/// use docent_core::EmbeddingConfig;
/// use docent_index::embedding::{Embedder, EmbeddingClient};
///
/// # async fn example() {
/// let config = EmbeddingConfig::default();
/// let embedder = Embedder::from_config(EmbeddingClient::with_config(&config).unwrap(), &config);
/// let q = embedder.embed_one("how many vacation days do I get?").await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct Embedder<S> {
    service: S,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<S: EmbeddingService> Embedder<S> {
    pub fn new(service: S, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            service,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn from_config(service: S, config: &EmbeddingConfig) -> Self {
        Self::new(service, config.batch_size, RetryPolicy::from_config(config))
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Embed `texts` in order, batch by batch.
    ///
    /// # Errors
    ///
    /// Fails on the first batch that fails permanently or exhausts its
    /// retries; nothing is returned for earlier batches.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocentError> {
        self.embed_batch_with_progress(texts, |_| {}).await
    }

    /// Like [`Embedder::embed_batch`], calling `on_batch` with the number of
    /// texts finished after each batch.
    pub async fn embed_batch_with_progress<F>(
        &self,
        texts: &[String],
        mut on_batch: F,
    ) -> Result<Vec<Vec<f32>>, DocentError>
    where
        F: FnMut(usize),
    {
        let mut all = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let label = format!("embedding batch {}", i + 1);
            let vectors = self
                .retry
                .run(&label, || self.service.embed(batch))
                .await?;

            if vectors.len() != batch.len() {
                return Err(DocentError::Embedding(format!(
                    "{label}: expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for mut v in vectors {
                l2_normalize(&mut v);
                all.push(v);
            }
            on_batch(all.len());
            tracing::debug!(batch = i + 1, done = all.len(), total = texts.len(), "embedded batch");
        }

        Ok(all)
    }

    /// Embed a single text, typically a query.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| DocentError::Embedding("empty response from embedding service".into()))
    }
}
