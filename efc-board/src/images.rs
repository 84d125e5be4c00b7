//! Image materialization
//!
//! Turns remote pictogram URLs into inline `data:` URIs so pictograms render
//! without network access. Materialization never fails: on any fetch error
//! the original pictogram is returned and still points at its URL.
//!
//! Each URL is fetched at most once per materializer; concurrent requests
//! for the same URL share one fetch.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use efc_common::{Phrase, Pictogram};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("efc-board/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 15;

/// Image fetch failures
#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Not an image (content type {0})")]
    NotAnImage(String),

    #[error("Empty response body")]
    Empty,

    #[error("Offline")]
    Offline,
}

/// Raw image bytes with their MIME type
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Retrieves image bytes for a URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageFetchError>;
}

/// Fetches images over HTTP
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self, ImageFetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| ImageFetchError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageFetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageFetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/png".to_string());

        if !content_type.starts_with("image/") {
            return Err(ImageFetchError::NotAnImage(content_type));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageFetchError::Network(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ImageFetchError::Empty);
        }

        Ok(FetchedImage {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Fetcher that never reaches the network
///
/// Used when materialization is disabled; pictograms keep their URLs.
pub struct OfflineImageFetcher;

#[async_trait]
impl ImageFetcher for OfflineImageFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, ImageFetchError> {
        Err(ImageFetchError::Offline)
    }
}

/// Encode image bytes as a `data:` URI
pub fn encode_data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// Materializes pictograms, deduplicating fetches by URL
pub struct ImageMaterializer {
    fetcher: Arc<dyn ImageFetcher>,
    cache: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ImageMaterializer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineImageFetcher))
    }

    /// Pictogram guaranteed renderable offline when the fetch succeeds
    ///
    /// Already-inline pictograms are returned unchanged.
    pub async fn materialize(&self, pictogram: &Pictogram) -> Pictogram {
        if pictogram.is_materialized() || pictogram.url.is_empty() {
            return pictogram.clone();
        }

        let cell = match self.cache.lock() {
            Ok(mut cache) => cache.entry(pictogram.url.clone()).or_default().clone(),
            Err(_) => Arc::new(OnceCell::new()),
        };

        let fetcher = &self.fetcher;
        let url = pictogram.url.as_str();
        let encoded = cell
            .get_or_try_init(|| async move {
                let image = fetcher.fetch(url).await?;
                debug!(url, bytes = image.bytes.len(), "Materialized pictogram image");
                Ok::<_, ImageFetchError>(encode_data_uri(&image.content_type, &image.bytes))
            })
            .await;

        match encoded {
            Ok(data_uri) => pictogram.with_inline(data_uri.clone()),
            Err(e) => {
                warn!(url = %pictogram.url, "Image fetch failed, keeping URL: {}", e);
                pictogram.clone()
            }
        }
    }

    /// Materialize a pictogram sequence concurrently, preserving order
    pub async fn materialize_all(&self, pictograms: &[Pictogram]) -> Vec<Pictogram> {
        join_all(pictograms.iter().map(|p| self.materialize(p))).await
    }

    pub async fn materialize_phrase(&self, mut phrase: Phrase) -> Phrase {
        if !phrase.is_materialized() {
            phrase.pictograms = self.materialize_all(&phrase.pictograms).await;
        }
        phrase
    }

    /// Materialize every phrase of a library concurrently
    pub async fn materialize_library(&self, phrases: Vec<Phrase>) -> Vec<Phrase> {
        join_all(phrases.into_iter().map(|p| self.materialize_phrase(p))).await
    }

    /// Number of distinct URLs seen
    pub fn cached_urls(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
