//! Concurrent ingestion of dropped item batches.
//!
//! Every item runs classify → resolve → extract as its own task. The batch
//! result set is published once, after every task has finished, and replaces
//! the previous set wholesale. Progress is published after each completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier::{self, ResolvedFile, Strategy};
use crate::config::Config;
use crate::error::{ExtractError, IngestError, ResolveError};
use crate::icon_extractor::{IconExtractor, IconImage, IconProvider, SystemIconProvider};
use crate::reference::ItemReference;

/// An extracted icon and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    source: ResolvedFile,
    icon: IconImage,
}

impl ExtractionResult {
    pub fn new(source: ResolvedFile, icon: IconImage) -> Self {
        Self { source, icon }
    }

    pub fn source(&self) -> &ResolvedFile {
        &self.source
    }

    pub fn source_url(&self) -> &Url {
        self.source.url()
    }

    pub fn icon(&self) -> &IconImage {
        &self.icon
    }

    /// Source file name without extension, used to name exports.
    pub fn source_label(&self) -> Option<String> {
        self.source.label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatus {
    pub processing: bool,
    pub completed: usize,
    pub total: usize,
}

impl IngestStatus {
    /// Completed share of the current batch in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub total: usize,
    pub extracted: usize,
    pub unsupported: usize,
    pub resolution_failures: usize,
    pub extraction_failures: usize,
}

impl IngestSummary {
    pub fn skipped(&self) -> usize {
        self.unsupported + self.resolution_failures + self.extraction_failures
    }
}

/// Updates in the order they happened for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IngestEvent {
    Started { total: usize },
    Progress { completed: usize, total: usize, fraction: f64 },
    Completed { summary: IngestSummary },
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub results: Arc<[ExtractionResult]>,
    /// `false` when the batch was empty and nothing was published.
    pub completed: bool,
    pub summary: IngestSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Logical size stamped on every extracted icon.
    pub icon_dimensions: u32,
    pub max_concurrent_items: usize,
    pub event_capacity: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            icon_dimensions: 1024,
            max_concurrent_items: 8,
            event_capacity: 64,
        }
    }
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            icon_dimensions: config.icon_dimensions,
            max_concurrent_items: config.max_concurrent_items,
            event_capacity: config.event_capacity,
        }
    }
}

enum ItemOutcome {
    Extracted(ExtractionResult),
    Unsupported,
    ResolutionFailed(ResolveError),
    ExtractionFailed(ExtractError),
}

/// Owns the published result set. Share it behind an `Arc` with whatever
/// needs to read or drive it.
pub struct IngestionCoordinator<P = SystemIconProvider> {
    extractor: Arc<IconExtractor<P>>,
    settings: IngestSettings,
    results_tx: watch::Sender<Arc<[ExtractionResult]>>,
    status_tx: watch::Sender<IngestStatus>,
    events_tx: broadcast::Sender<IngestEvent>,
    in_flight: AtomicBool,
}

impl IngestionCoordinator<SystemIconProvider> {
    pub fn new(settings: IngestSettings) -> Self {
        Self::with_extractor(settings, IconExtractor::new())
    }
}

impl<P: IconProvider + 'static> IngestionCoordinator<P> {
    pub fn with_extractor(settings: IngestSettings, extractor: IconExtractor<P>) -> Self {
        let (results_tx, _) = watch::channel(Arc::from(Vec::new()));
        let (status_tx, _) = watch::channel(IngestStatus::default());
        let (events_tx, _) = broadcast::channel(settings.event_capacity.max(1));

        Self {
            extractor: Arc::new(extractor),
            settings,
            results_tx,
            status_tx,
            events_tx,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// The last published result set.
    pub fn current_results(&self) -> Arc<[ExtractionResult]> {
        self.results_tx.borrow().clone()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Arc<[ExtractionResult]>> {
        self.results_tx.subscribe()
    }

    pub fn status(&self) -> IngestStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<IngestStatus> {
        self.status_tx.subscribe()
    }

    /// Events emitted after subscription. Slow receivers may lag and lose the
    /// oldest events, but never see them out of order.
    pub fn subscribe_events(&self) -> broadcast::Receiver<IngestEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Publishes an empty result set.
    pub fn clear(&self) {
        self.results_tx.send_replace(Arc::from(Vec::new()));
        debug!("cleared published icons");
    }

    /// Ingests one batch and publishes its results, in input order, once every
    /// item has finished. Failing and unsupported items are counted and left
    /// out.
    ///
    /// A second batch started while one is running is rejected. An empty batch
    /// is a no-op.
    pub async fn ingest(
        &self,
        items: Vec<Box<dyn ItemReference>>,
    ) -> Result<IngestReport, IngestError> {
        let _guard = BatchGuard::acquire(&self.in_flight, &self.status_tx)?;

        let total = items.len();
        if total == 0 {
            debug!("empty drop, nothing to ingest");
            return Ok(IngestReport {
                results: self.current_results(),
                completed: false,
                summary: IngestSummary::default(),
            });
        }

        info!(total, "ingesting dropped items");
        self.status_tx.send_replace(IngestStatus {
            processing: true,
            completed: 0,
            total,
        });
        self.emit(IngestEvent::Started { total });

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_items.max(1)));
        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let extractor = Arc::clone(&self.extractor);
            let icon_dimensions = self.settings.icon_dimensions;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, process_item(index, item, extractor, icon_dimensions).await)
            });
        }

        // Single consumer: every completion is recorded and reported here, in
        // the order the tasks finish.
        let mut summary = IngestSummary {
            total,
            ..Default::default()
        };
        let mut extracted = Vec::with_capacity(total);
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, ItemOutcome::Extracted(result))) => {
                    summary.extracted += 1;
                    extracted.push((index, result));
                }
                Ok((_, ItemOutcome::Unsupported)) => summary.unsupported += 1,
                Ok((_, ItemOutcome::ResolutionFailed(_))) => summary.resolution_failures += 1,
                Ok((_, ItemOutcome::ExtractionFailed(_))) => summary.extraction_failures += 1,
                Err(e) => {
                    warn!(error = %e, "ingestion task aborted");
                    summary.extraction_failures += 1;
                }
            }

            completed += 1;
            self.status_tx.send_replace(IngestStatus {
                processing: true,
                completed,
                total,
            });
            self.emit(IngestEvent::Progress {
                completed,
                total,
                fraction: completed as f64 / total as f64,
            });
        }

        extracted.sort_by_key(|(index, _)| *index);
        let results: Arc<[ExtractionResult]> =
            extracted.into_iter().map(|(_, result)| result).collect();

        self.results_tx.send_replace(Arc::clone(&results));
        self.status_tx.send_replace(IngestStatus {
            processing: false,
            completed,
            total,
        });
        self.emit(IngestEvent::Completed { summary });

        info!(
            extracted = summary.extracted,
            skipped = summary.skipped(),
            "ingestion complete"
        );

        Ok(IngestReport {
            results,
            completed: true,
            summary,
        })
    }

    fn emit(&self, event: IngestEvent) {
        // Nobody listening is fine.
        let _ = self.events_tx.send(event);
    }
}

async fn process_item<P: IconProvider + 'static>(
    index: usize,
    item: Box<dyn ItemReference>,
    extractor: Arc<IconExtractor<P>>,
    icon_dimensions: u32,
) -> ItemOutcome {
    let loader = match classifier::classify(item.as_ref()) {
        Strategy::DirectUrl(loader) => loader,
        Strategy::Unsupported => {
            debug!(index, "unsupported item skipped");
            return ItemOutcome::Unsupported;
        }
    };

    let file = match classifier::resolve(item.as_ref(), loader).await {
        Ok(file) => file,
        Err(e) => {
            warn!(index, error = %e, "item resolution failed");
            return ItemOutcome::ResolutionFailed(e);
        }
    };
    drop(item);

    let path = file.path().to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || {
        extractor
            .extract(&file, icon_dimensions)
            .map(|icon| ExtractionResult::new(file, icon))
    })
    .await;

    match extracted {
        Ok(Ok(result)) => ItemOutcome::Extracted(result),
        Ok(Err(e)) => {
            warn!(index, error = %e, "icon extraction failed");
            ItemOutcome::ExtractionFailed(e)
        }
        Err(e) => {
            warn!(index, error = %e, "icon extraction panicked");
            ItemOutcome::ExtractionFailed(ExtractError::Unavailable {
                path,
                reason: e.to_string(),
            })
        }
    }
}

/// Marks a batch as running until dropped. A batch whose future is dropped
/// before it finishes leaves a non-processing status behind.
struct BatchGuard<'a> {
    flag: &'a AtomicBool,
    status_tx: &'a watch::Sender<IngestStatus>,
}

impl<'a> BatchGuard<'a> {
    fn acquire(
        flag: &'a AtomicBool,
        status_tx: &'a watch::Sender<IngestStatus>,
    ) -> Result<Self, IngestError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IngestError::BatchInFlight)?;
        Ok(Self { flag, status_tx })
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.status_tx.send_if_modified(|status| {
            if !status.processing {
                return false;
            }
            warn!(
                completed = status.completed,
                total = status.total,
                "ingestion cancelled before completion"
            );
            status.processing = false;
            true
        });
        self.flag.store(false, Ordering::Release);
    }
}
