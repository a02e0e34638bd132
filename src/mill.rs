use crate::cache::ContentCache;
use crate::config::AppConfig;
use crate::error::MillError;
use crate::image::{
    BatchAttachment, ImageItem, SearchParam, SearchResult, SyncOperation, SyncReport,
};
use crate::resolver::{prefixed_url_transform, ContentResolver, UrlTransform};
use crate::search::ImageSearcher;
use crate::service::ImageSearchService;
use crate::service_clients::http::HttpImageSearchClient;
use crate::sync::{BatchSynchronizer, SyncPolicy};
use std::sync::Arc;
use std::time::Duration;

/// Entry point for keeping a remote image index in step with a catalogue
/// and searching it by picture.
pub struct ImageMill {
    synchronizer: BatchSynchronizer,
    searcher: ImageSearcher,
    cache: Arc<ContentCache>,
}

impl ImageMill {
    /// Builds a mill talking HTTP to `config.endpoint`. The download URL
    /// transform comes from `download_prefix`/`download_query` when set.
    pub fn new(config: &AppConfig) -> Result<Self, MillError> {
        let query = config.download_query.clone().unwrap_or_default();
        let transform = config
            .download_prefix
            .as_ref()
            .map(|prefix| prefixed_url_transform(prefix.as_str(), query));
        let service = HttpImageSearchClient::new(&config.endpoint, config.request_timeout())?;
        Self::with_service(
            Arc::new(service),
            transform,
            config.fetch_timeout(),
            config.sync_policy(),
        )
    }

    pub fn with_service(
        service: Arc<dyn ImageSearchService>,
        transform: Option<UrlTransform>,
        fetch_timeout: Duration,
        policy: SyncPolicy,
    ) -> Result<Self, MillError> {
        let cache = Arc::new(ContentCache::new());
        let resolver = Arc::new(ContentResolver::new(fetch_timeout, transform, cache.clone())?);
        Ok(Self {
            synchronizer: BatchSynchronizer::new(service.clone(), resolver.clone(), policy),
            searcher: ImageSearcher::new(service, resolver),
            cache,
        })
    }

    /// Adds `images` to the index and returns the names that made it in.
    pub async fn add_images(
        &self,
        images: &[ImageItem],
        attachment: &BatchAttachment,
    ) -> Result<Vec<String>, MillError> {
        Ok(self.sync_images(images, attachment, SyncOperation::Add).await?.succeeded)
    }

    /// Removes `images` from the index and returns the names that were removed.
    pub async fn delete_images(
        &self,
        images: &[ImageItem],
        attachment: &BatchAttachment,
    ) -> Result<Vec<String>, MillError> {
        Ok(self.sync_images(images, attachment, SyncOperation::Delete).await?.succeeded)
    }

    /// Like [`ImageMill::add_images`]/[`ImageMill::delete_images`], but with
    /// per-item failures, dropped and exhausted items spelled out.
    pub async fn sync_images(
        &self,
        images: &[ImageItem],
        attachment: &BatchAttachment,
        operation: SyncOperation,
    ) -> Result<SyncReport, MillError> {
        let max_attempts = images.len() as i64 + 1;
        self.synchronizer
            .sync(images, attachment, operation, max_attempts)
            .await
    }

    pub async fn search_image(&self, param: &SearchParam) -> Result<SearchResult, MillError> {
        self.searcher.search(param).await
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }
}
