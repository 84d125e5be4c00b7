//! Pictogram search collaborator
//!
//! Looks up pictograms by keyword in the ARASAAC catalogue. Errors and empty
//! responses mean "no suggestions" and are never fatal. Suggestions for
//! typed input are debounced so that only a pause in typing issues a
//! request.

use async_trait::async_trait;
use efc_common::config::PictogramConfig;
use efc_common::Pictogram;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::debounce::Debouncer;

const USER_AGENT: &str = concat!("efc-board/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// ARASAAC ids of pictograms offered before anything is typed
const COMMON_PICTOGRAM_IDS: &[(&str, u64)] = &[
    ("Quiero", 36994),
    ("agua", 2349),
    ("comer", 5486),
    ("jugar", 28308),
    ("dormir", 28309),
    ("baño", 28310),
    ("sí", 28311),
    ("no", 28312),
    ("mamá", 28313),
    ("papá", 28314),
    ("Hola", 5510),
    ("Adiós", 2340),
    ("Gracias", 5505),
    ("Por favor", 10000),
];

#[derive(Debug, Error)]
pub enum PictogramSearchError {
    #[error("Invalid pictogram service URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait PictogramSearch: Send + Sync {
    /// Up to `limit` pictograms for `keyword`, best match first
    ///
    /// Implementations return an empty list on failure.
    async fn search(&self, keyword: &str, limit: usize) -> Vec<Pictogram>;
}

#[derive(Debug, Deserialize)]
struct ArasaacKeyword {
    keyword: String,
}

#[derive(Debug, Deserialize)]
struct ArasaacHit {
    #[serde(rename = "_id")]
    id: u64,
    #[serde(default)]
    keywords: Vec<ArasaacKeyword>,
}

/// Image URL of an ARASAAC pictogram
pub fn pictogram_url(base_url: &str, id: u64) -> String {
    format!(
        "{}/pictograms/{}?download=false",
        base_url.trim_end_matches('/'),
        id
    )
}

/// Frequently used pictograms, offered when there is nothing to search
pub fn common_pictograms(base_url: &str) -> Vec<Pictogram> {
    COMMON_PICTOGRAM_IDS
        .iter()
        .map(|(word, id)| Pictogram::new(*word, pictogram_url(base_url, *id)))
        .collect()
}

/// ARASAAC REST client
pub struct ArasaacClient {
    http_client: reqwest::Client,
    base_url: String,
    locale: String,
}

impl ArasaacClient {
    pub fn new(config: &PictogramConfig) -> Result<Self, PictogramSearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PictogramSearchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            locale: config.locale.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/pictograms/{locale}/search/{keyword}`, keyword percent-encoded
    fn search_url(&self, keyword: &str) -> Result<reqwest::Url, PictogramSearchError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| PictogramSearchError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| PictogramSearchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["pictograms", self.locale.as_str(), "search", keyword]);
        Ok(url)
    }

    async fn try_search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<Pictogram>, PictogramSearchError> {
        let url = self.search_url(keyword)?;
        debug!(%url, "Searching pictograms");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| PictogramSearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PictogramSearchError::Status(status.as_u16()));
        }

        let hits: Vec<ArasaacHit> = response
            .json()
            .await
            .map_err(|e| PictogramSearchError::Parse(e.to_string()))?;

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|hit| {
                let word = hit
                    .keywords
                    .into_iter()
                    .next()
                    .map(|k| k.keyword)
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| keyword.to_string());
                Pictogram::new(word, pictogram_url(&self.base_url, hit.id))
            })
            .collect())
    }
}

#[async_trait]
impl PictogramSearch for ArasaacClient {
    async fn search(&self, keyword: &str, limit: usize) -> Vec<Pictogram> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Vec::new();
        }

        match self.try_search(&keyword, limit).await {
            Ok(pictograms) => pictograms,
            Err(e) => {
                warn!(keyword = %keyword, "Pictogram search failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Suggestions published for a query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suggestions {
    pub query: String,
    pub pictograms: Vec<Pictogram>,
    /// True when the common list stands in for missing search results
    pub fallback: bool,
}

/// Debounced pictogram suggestions for typed input
///
/// Must be created within a Tokio runtime.
pub struct PictogramSuggestions {
    debouncer: Mutex<Debouncer<String>>,
    current: watch::Receiver<Suggestions>,
    publisher: Arc<watch::Sender<Suggestions>>,
    common: Vec<Pictogram>,
}

impl PictogramSuggestions {
    pub fn new(
        search: Arc<dyn PictogramSearch>,
        common: Vec<Pictogram>,
        limit: usize,
        delay: Duration,
    ) -> Self {
        let (debouncer, mut queries) = Debouncer::<String>::new(delay);
        let initial = Suggestions {
            query: String::new(),
            pictograms: common.clone(),
            fallback: true,
        };
        let (tx, rx) = watch::channel(initial);
        let publisher = Arc::new(tx);

        let task_publisher = publisher.clone();
        let task_common = common.clone();
        tokio::spawn(async move {
            while let Some(query) = queries.recv().await {
                let found = search.search(&query, limit).await;
                let suggestions = if found.is_empty() {
                    Suggestions {
                        query,
                        pictograms: task_common.clone(),
                        fallback: true,
                    }
                } else {
                    Suggestions {
                        query,
                        pictograms: found,
                        fallback: false,
                    }
                };
                debug!(
                    query = %suggestions.query,
                    count = suggestions.pictograms.len(),
                    "Publishing pictogram suggestions"
                );
                task_publisher.send_replace(suggestions);
            }
        });

        Self {
            debouncer: Mutex::new(debouncer),
            current: rx,
            publisher,
            common,
        }
    }

    /// Register new input; blank input shows the common list immediately
    pub fn query(&self, input: &str) {
        let Ok(mut debouncer) = self.debouncer.lock() else {
            warn!("Pictogram debouncer unavailable");
            return;
        };

        if input.trim().is_empty() {
            debouncer.cancel();
            self.publisher.send_replace(Suggestions {
                query: String::new(),
                pictograms: self.common.clone(),
                fallback: true,
            });
        } else {
            debouncer.call(input.to_string());
        }
    }

    pub fn current(&self) -> Suggestions {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.current.clone()
    }
}
