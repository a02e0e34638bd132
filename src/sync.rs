use crate::error::MillError;
use crate::image::{BatchAttachment, FailedImage, ImageItem, SyncOperation, SyncReport};
use crate::resolver::ContentResolver;
use crate::service::{AddImageRequest, DeleteImageRequest, ImageSearchService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

pub const ROUND_TIMEOUT: Duration = Duration::from_secs(5);
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Wall-clock limit for one round, measured from its start.
    pub round_timeout: Duration,
    /// Pause before a throttled subset is sent again.
    pub retry_delay: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            round_timeout: ROUND_TIMEOUT,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Result of one worker for one item in one round.
#[derive(Debug)]
struct SyncOutcome {
    image: ImageItem,
    error: Option<MillError>,
    /// The failure was rate limiting and the item should go into the next round.
    retry: bool,
    slot: usize,
}

impl SyncOutcome {
    fn new(slot: usize, image: ImageItem, result: Result<(), MillError>) -> Self {
        match result {
            Ok(()) => Self {
                image,
                error: None,
                retry: false,
                slot,
            },
            Err(error) => Self {
                image,
                retry: error.is_rate_limited(),
                error: Some(error),
                slot,
            },
        }
    }
}

#[derive(Debug, Default)]
struct Round {
    succeeded: Vec<String>,
    retry: Vec<ImageItem>,
    failed: Vec<FailedImage>,
    dropped: Vec<ImageItem>,
}

impl Round {
    fn record(&mut self, outcome: SyncOutcome, operation: SyncOperation) {
        match outcome.error {
            None => self.succeeded.push(outcome.image.pic_name),
            Some(error) if outcome.retry => {
                log::debug!(
                    "Throttled on {} of image '{}': {}",
                    operation,
                    outcome.image.pic_name,
                    error
                );
                self.retry.push(outcome.image);
            }
            Some(error) => {
                log::error!(
                    "Failed to {} image '{}': {}",
                    operation,
                    outcome.image.pic_name,
                    error
                );
                self.failed.push(FailedImage {
                    image: outcome.image,
                    reason: error.to_string(),
                });
            }
        }
    }
}

/// Performs one item operation. Cheap to clone into every task of a round.
#[derive(Clone)]
struct ImageWorker {
    service: Arc<dyn ImageSearchService>,
    resolver: Arc<ContentResolver>,
    attachment: Arc<BatchAttachment>,
    operation: SyncOperation,
}

impl ImageWorker {
    async fn run(&self, image: &ImageItem) -> Result<(), MillError> {
        match self.operation {
            SyncOperation::Add => self.add(image).await,
            SyncOperation::Delete => self.delete(image).await,
        }
    }

    async fn add(&self, image: &ImageItem) -> Result<(), MillError> {
        let resolved = self.resolver.resolve_cached(&image.image_url).await?;
        let request = AddImageRequest {
            instance_name: self.attachment.instance_name.clone(),
            pic_name: image.pic_name.clone(),
            product_id: image.product_id.clone(),
            category_id: self.attachment.category_id,
            pic_content: resolved.content,
            str_attr: self.attachment.str_attr.clone(),
        };
        let result = self.service.add_image(request).await;
        // Throttled content stays cached for the next round.
        if !matches!(&result, Err(e) if e.is_rate_limited()) {
            self.resolver.release(&resolved.key);
        }
        result.map_err(MillError::from)
    }

    async fn delete(&self, image: &ImageItem) -> Result<(), MillError> {
        let request = DeleteImageRequest {
            instance_name: self.attachment.instance_name.clone(),
            pic_name: image.pic_name.clone(),
            product_id: image.product_id.clone(),
        };
        self.service
            .delete_image(request)
            .await
            .map_err(MillError::from)
    }
}

/// Pushes batches of adds or deletes to the service concurrently and
/// re-sends the throttled part until it goes through or the attempt budget
/// runs out.
pub struct BatchSynchronizer {
    service: Arc<dyn ImageSearchService>,
    resolver: Arc<ContentResolver>,
    policy: SyncPolicy,
}

impl BatchSynchronizer {
    pub fn new(
        service: Arc<dyn ImageSearchService>,
        resolver: Arc<ContentResolver>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            service,
            resolver,
            policy,
        }
    }

    /// Runs rounds over `images` until nothing is left to retry.
    ///
    /// Each retry round costs one attempt; once `max_attempts` is used up the
    /// still-throttled items are reported as exhausted. Per-item failures
    /// never make this return `Err`; only a non-positive budget does.
    pub async fn sync(
        &self,
        images: &[ImageItem],
        attachment: &BatchAttachment,
        operation: SyncOperation,
        max_attempts: i64,
    ) -> Result<SyncReport, MillError> {
        let mut report = SyncReport::default();
        if images.is_empty() {
            return Ok(report);
        }
        if max_attempts <= 0 {
            return Err(MillError::RecursionExhausted);
        }

        let attachment = Arc::new(attachment.clone());
        let mut pending = images.to_vec();
        let mut attempts_left = max_attempts;

        loop {
            let requested = pending.len();
            let round = self.run_round(pending, &attachment, operation).await;
            report.rounds += 1;

            log::info!(
                "Round {}: requested {}, succeeded {}, retrying {}, failed {}, dropped {}, operation {}-{}",
                report.rounds,
                requested,
                round.succeeded.len(),
                round.retry.len(),
                round.failed.len(),
                round.dropped.len(),
                operation,
                attachment.str_attr
            );

            report.succeeded.extend(round.succeeded);
            report.failed.extend(round.failed);
            report.dropped.extend(round.dropped);

            if round.retry.is_empty() {
                break;
            }

            time::sleep(self.policy.retry_delay).await;
            attempts_left -= 1;
            if attempts_left <= 0 {
                log::warn!(
                    "Attempt budget used up, giving up on {} throttled images",
                    round.retry.len()
                );
                self.evict(&round.retry, operation);
                report.exhausted = round.retry;
                break;
            }
            pending = round.retry;
        }

        Ok(report)
    }

    async fn run_round(
        &self,
        images: Vec<ImageItem>,
        attachment: &Arc<BatchAttachment>,
        operation: SyncOperation,
    ) -> Round {
        let deadline = Instant::now() + self.policy.round_timeout;
        let worker = ImageWorker {
            service: self.service.clone(),
            resolver: self.resolver.clone(),
            attachment: attachment.clone(),
            operation,
        };

        let (outcome_tx, mut outcome_rx) = mpsc::channel(images.len().max(1));
        let mut workers = JoinSet::new();
        for (slot, image) in images.iter().cloned().enumerate() {
            let worker = worker.clone();
            let outcome_tx = outcome_tx.clone();
            workers.spawn(async move {
                let result = worker.run(&image).await;
                let _ = outcome_tx.send(SyncOutcome::new(slot, image, result)).await;
            });
        }
        drop(outcome_tx);

        let mut round = Round::default();
        let mut reported = vec![false; images.len()];
        loop {
            match time::timeout_at(deadline, outcome_rx.recv()).await {
                Ok(Some(outcome)) => {
                    reported[outcome.slot] = true;
                    round.record(outcome, operation);
                }
                // Every worker is done.
                Ok(None) => break,
                Err(_) => {
                    log::error!(
                        "Image {} round timed out after {:?}",
                        operation,
                        self.policy.round_timeout
                    );
                    break;
                }
            }
        }
        // Late workers are cancelled; their items are neither retried nor reported as failed.
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        round.dropped = images
            .into_iter()
            .zip(reported)
            .filter_map(|(image, seen)| (!seen).then_some(image))
            .collect();
        self.evict(&round.dropped, operation);
        round
    }

    /// Forgets cached content of items that will not be submitted again.
    fn evict(&self, images: &[ImageItem], operation: SyncOperation) {
        if operation != SyncOperation::Add {
            return;
        }
        for image in images {
            self.resolver.release_reference(&image.image_url);
        }
    }
}
