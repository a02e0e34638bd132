use crate::cache::ContentCache;
use crate::error::MillError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Rewrites an image reference into the URL it is downloaded from.
pub type UrlTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Builds the usual transform for a CDN-hosted image store: bare keys and
/// hashes get `prefix` in front, and URLs under `prefix` without a query get
/// `query` appended (typically an image processing directive).
pub fn prefixed_url_transform(prefix: impl Into<String>, query: impl Into<String>) -> UrlTransform {
    let prefix = prefix.into();
    let query = query.into();
    Arc::new(move |reference: &str| {
        let mut url = if reference.len() > 4 && reference.starts_with("http") {
            reference.to_string()
        } else {
            format!("{}{}", prefix, reference)
        };
        if !query.is_empty() && !url.contains('?') && url.contains(prefix.as_str()) {
            url.push_str(&query);
        }
        url
    })
}

/// Content ready for submission, with the cache key it is held under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub key: String,
    pub content: String,
}

/// Turns image references into base64 content.
pub struct ContentResolver {
    client: Client,
    transform: Option<UrlTransform>,
    cache: Arc<ContentCache>,
}

impl ContentResolver {
    pub fn new(
        timeout: Duration,
        transform: Option<UrlTransform>,
        cache: Arc<ContentCache>,
    ) -> Result<Self, MillError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MillError::InvalidConfig(format!("cannot build download client: {}", e)))?;
        Ok(Self {
            client,
            transform,
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn download_url(&self, reference: &str, use_transform: bool) -> String {
        match &self.transform {
            Some(transform) if use_transform => transform(reference),
            _ => reference.to_string(),
        }
    }

    /// Downloads and encodes `reference`, bypassing the cache.
    pub async fn resolve(&self, reference: &str, use_transform: bool) -> Result<String, MillError> {
        let url = self.download_url(reference, use_transform);
        self.fetch_base64(&url).await
    }

    /// Submit path: serves repeated lookups of the same picture from the
    /// cache until [`ContentResolver::release`] is called for its key.
    pub async fn resolve_cached(&self, reference: &str) -> Result<ResolvedContent, MillError> {
        let key = self.download_url(reference, true);
        if let Some(content) = self.cache.load(&key) {
            log::trace!("Serving {} from content cache", key);
            return Ok(ResolvedContent { key, content });
        }
        let content = self.fetch_base64(&key).await?;
        self.cache.store(&key, content.clone());
        Ok(ResolvedContent { key, content })
    }

    pub fn release(&self, key: &str) {
        self.cache.delete(key);
    }

    /// Drops whatever the submit path cached for `reference`.
    pub fn release_reference(&self, reference: &str) {
        self.release(&self.download_url(reference, true));
    }

    async fn fetch_base64(&self, url: &str) -> Result<String, MillError> {
        log::debug!("Downloading image: {}", url);
        let fetch_error = |source: reqwest::Error| MillError::Fetch {
            url: url.to_string(),
            source,
        };
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;
        log::trace!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(STANDARD.encode(&bytes))
    }
}
