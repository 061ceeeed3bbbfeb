//! Resumable image optimization.
//!
//! Generates WebP variants for every original in the content index, one
//! bounded chunk per call. There is no background worker: a client (the
//! admin UI, or `optimize-all`) calls [`Optimizer::optimize_batch`] with
//! `nextOffset` until `hasMore` is false.
//!
//! ## Runs
//!
//! ```text
//! offset=0, no runId      → new run: fresh runId, counter reset to 0/N
//! offset=0, current runId → retry of the first chunk, counter kept
//! offset>0, current runId → resume
//! offset>0, no runId      → 400
//! any other runId         → 409
//! ```
//!
//! ## Per-candidate work
//!
//! 1. Cleanup mode: delete every variant of the original in its folder.
//!    Otherwise skip it if the variant at the smallest ladder width exists.
//! 2. Fetch the original, render the planned widths on the blocking pool,
//!    store each variant next to the original, widest first. The
//!    representative is written last so a partial write is retried by the
//!    next run. An original too narrow for any width counts as skipped.
//! 3. Advance the persisted counter.
//!
//! Up to `optimizer.concurrency` candidates run at once. A failure (missing
//! original, codec error, storage error) counts as `failed` and the chunk
//! carries on. Failed candidates are not retried within the run; a later run
//! visits them again because their variants are still missing.

mod candidates;
mod progress;

pub use candidates::collect_candidates;
pub use progress::{ProgressRecord, ProgressStore, parse_progress};

use crate::config::{ImagesConfig, OptimizerConfig};
use crate::imaging::{CodecError, ImageCodec, VariantConfig, render_variants, representative_width};
use crate::index::{ContentIndexCache, IndexError};
use crate::naming;
use crate::storage::{self, StorageError, StorageHandle, content_type};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("runId is required when offset > 0")]
    MissingRunId,
    #[error("run {given} is not the current run {current}")]
    RunMismatch { given: Uuid, current: Uuid },
    #[error("run {0} is unknown")]
    UnknownRun(Uuid),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl OptimizeError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OptimizeError::InvalidRequest(_) | OptimizeError::MissingRunId => 400,
            OptimizeError::RunMismatch { .. } | OptimizeError::UnknownRun(_) => 409,
            OptimizeError::Index(IndexError::GalleryNotFound(_)) => 404,
            OptimizeError::Index(_) | OptimizeError::Storage(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Body of `POST /optimize-batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchRequest {
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cleanup: bool,
    #[serde(default)]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub variants_created: usize,
}

impl BatchCounts {
    fn add(&mut self, other: &BatchCounts) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.variants_created += other.variants_created;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub total_images: usize,
    pub processed_so_far: usize,
    pub percent_complete: f64,
}

/// Response of `POST /optimize-batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch: BatchCounts,
    pub progress: BatchProgress,
    pub has_more: bool,
    pub next_offset: usize,
    pub run_id: Uuid,
}

/// Response of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total_images: usize,
    pub images_with_variants: usize,
    pub images_needing_optimization: usize,
    pub percent_optimized: f64,
    /// Present when read from the persisted counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
}

/// Response of `POST /cleanup-old-sizes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub deleted_count: usize,
}

/// Totals of [`Optimizer::run_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub chunks: usize,
    pub totals: BatchCounts,
    pub total_images: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Processed { variants: usize },
    Skipped,
}

#[derive(Error, Debug)]
enum ItemError {
    #[error("original not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("codec task failed: {0}")]
    Task(String),
}

/// Percentage with one decimal. An empty set counts as fully done.
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

/// The optimization job coordinator.
pub struct Optimizer<C: ImageCodec> {
    storage: StorageHandle,
    index: Arc<ContentIndexCache>,
    codec: Arc<C>,
    variants: VariantConfig,
    representative: Option<u32>,
    retired: Vec<u32>,
    settings: OptimizerConfig,
    progress: ProgressStore,
}

impl<C: ImageCodec + 'static> Optimizer<C> {
    pub fn new(
        storage: StorageHandle,
        index: Arc<ContentIndexCache>,
        codec: C,
        images: &ImagesConfig,
        settings: &OptimizerConfig,
    ) -> Self {
        let variants = images.variant_config();
        let progress = ProgressStore::new(storage.clone(), settings.progress_key.clone());
        Self {
            storage,
            index,
            codec: Arc::new(codec),
            representative: representative_width(&variants.widths),
            variants,
            retired: images.retired_widths.clone(),
            settings: settings.clone(),
            progress,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Process one chunk of the candidate list.
    pub async fn optimize_batch(&self, request: BatchRequest) -> Result<BatchResponse> {
        let limit = self.effective_limit(request.limit)?;
        let index = self.index.get().await?;
        let candidates = collect_candidates(&index);
        let total = candidates.len();
        let run_id = self.resolve_run(&request, total).await?;

        let start = request.offset.min(total);
        let end = request.offset.saturating_add(limit).min(total);
        let cleanup = request.cleanup;
        info!(
            run = %run_id,
            offset = request.offset,
            limit,
            total,
            cleanup,
            "optimizing chunk"
        );

        let mut batch = BatchCounts::default();
        let mut handled = 0;
        let mut outcomes = stream::iter(&candidates[start..end])
            .map(|path| async move { (path, self.process(path, cleanup).await) })
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some((path, outcome)) = outcomes.next().await {
            handled += 1;
            match outcome {
                Ok(ItemOutcome::Processed { variants }) => {
                    batch.processed += 1;
                    batch.variants_created += variants;
                }
                Ok(ItemOutcome::Skipped) => batch.skipped += 1,
                Err(e) => {
                    batch.failed += 1;
                    warn!(path = %path, error = %e, "image optimization failed");
                }
            }
            if let Err(e) = self.progress.advance(run_id, start + handled, total).await {
                warn!(error = %e, "could not persist optimization progress");
            }
        }

        let has_more = end < total;
        if !has_more {
            if let Err(e) = self.progress.finish(run_id, total).await {
                warn!(error = %e, "could not mark optimization run complete");
            }
            info!(run = %run_id, total, "optimization run complete");
        }

        Ok(BatchResponse {
            batch,
            progress: BatchProgress {
                total_images: total,
                processed_so_far: end,
                percent_complete: percent(end, total),
            },
            has_more,
            next_offset: end,
            run_id,
        })
    }

    /// Drive chunks until the candidate list is exhausted, the way the admin
    /// UI does. `on_chunk` sees every response.
    pub async fn run_all(
        &self,
        limit: Option<usize>,
        cleanup: bool,
        mut on_chunk: impl FnMut(&BatchResponse),
    ) -> Result<RunSummary> {
        let mut request = BatchRequest {
            offset: 0,
            limit,
            cleanup,
            run_id: None,
        };
        let mut summary = RunSummary {
            run_id: None,
            chunks: 0,
            totals: BatchCounts::default(),
            total_images: 0,
        };
        loop {
            let response = self.optimize_batch(request.clone()).await?;
            on_chunk(&response);
            summary.run_id = Some(response.run_id);
            summary.chunks += 1;
            summary.totals.add(&response.batch);
            summary.total_images = response.progress.total_images;
            if !response.has_more {
                return Ok(summary);
            }
            request.offset = response.next_offset;
            request.run_id = Some(response.run_id);
        }
    }

    /// Optimization status.
    ///
    /// With a persisted counter this is one read. Without one, the candidate
    /// count comes from the index and `imagesWithVariants` is extrapolated
    /// from a random sample of candidates.
    pub async fn status(&self) -> Result<StatusResponse> {
        if let Some(record) = self.progress.load().await? {
            let total = record.total;
            let done = record.processed.min(total);
            return Ok(StatusResponse {
                total_images: total,
                images_with_variants: done,
                images_needing_optimization: total - done,
                percent_optimized: percent(done, total),
                is_running: Some(record.running),
            });
        }

        let index = self.index.get().await?;
        let candidates = collect_candidates(&index);
        let total = candidates.len();
        let sample: Vec<String> = {
            let mut rng = rand::thread_rng();
            candidates
                .choose_multiple(&mut rng, self.settings.status_sample_size)
                .cloned()
                .collect()
        };

        let mut hits = 0usize;
        if let Some(width) = self.representative {
            for path in &sample {
                if self.storage.exists(&naming::variant_path(path, width)).await? {
                    hits += 1;
                }
            }
        }
        let done = if sample.is_empty() {
            0
        } else {
            ((hits as f64 / sample.len() as f64) * total as f64).round() as usize
        }
        .min(total);
        debug!(total, sampled = sample.len(), hits, "estimated optimization status");

        Ok(StatusResponse {
            total_images: total,
            images_with_variants: done,
            images_needing_optimization: total - done,
            percent_optimized: percent(done, total),
            is_running: None,
        })
    }

    /// Delete variants at old widths under the galleries prefix and next to
    /// every post cover.
    ///
    /// With `images.retired_widths` set, only those widths are removed.
    /// Otherwise every width outside the current ladder is.
    pub async fn cleanup_old_sizes(&self) -> Result<CleanupResponse> {
        let prefix = storage::normalize_prefix(&self.index.content().galleries_prefix)?;
        let index = self.index.get().await?;
        let mut dirs = vec![prefix.clone()];
        for path in collect_candidates(&index) {
            let dir = storage::parent(&path);
            if !storage::is_under(dir, &prefix) && !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_string());
            }
        }

        let mut seen = HashSet::new();
        let mut deleted = 0;
        for dir in &dirs {
            for entry in self.storage.list(dir).await? {
                if !seen.insert(entry.path.clone()) {
                    continue;
                }
                let Some(variant) = naming::parse_variant(storage::file_name(&entry.path)) else {
                    continue;
                };
                if !self.is_old_width(variant.width) {
                    continue;
                }
                match self.storage.delete(&entry.path).await {
                    Ok(()) => {
                        deleted += 1;
                        debug!(path = %entry.path, width = variant.width, "old variant deleted");
                    }
                    Err(e) => warn!(path = %entry.path, error = %e, "could not delete old variant"),
                }
            }
        }
        info!(deleted, folders = dirs.len(), "old variant sizes removed");
        Ok(CleanupResponse {
            deleted_count: deleted,
        })
    }

    fn is_old_width(&self, width: u32) -> bool {
        if self.retired.is_empty() {
            !self.variants.widths.contains(&width)
        } else {
            self.retired.contains(&width)
        }
    }

    fn effective_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(OptimizeError::InvalidRequest(
                "limit must be greater than zero".into(),
            )),
            Some(limit) => Ok(limit.min(self.settings.max_limit)),
            None => Ok(self.settings.default_limit.min(self.settings.max_limit)),
        }
    }

    async fn resolve_run(&self, request: &BatchRequest, total: usize) -> Result<Uuid> {
        match (request.offset, request.run_id) {
            (0, None) => {
                let run_id = Uuid::new_v4();
                self.progress.start(run_id, total).await?;
                info!(run = %run_id, total, "optimization run started");
                Ok(run_id)
            }
            (_, None) => Err(OptimizeError::MissingRunId),
            (_, Some(given)) => {
                let current = self.progress.load().await?.and_then(|r| r.run_id);
                match current {
                    Some(current) if current == given => Ok(given),
                    Some(current) => Err(OptimizeError::RunMismatch { given, current }),
                    None => Err(OptimizeError::UnknownRun(given)),
                }
            }
        }
    }

    async fn process(&self, path: &str, cleanup: bool) -> std::result::Result<ItemOutcome, ItemError> {
        if cleanup {
            let removed = self.delete_variants_of(path).await?;
            debug!(path, removed, "existing variants cleared");
        } else if let Some(width) = self.representative {
            if self.storage.exists(&naming::variant_path(path, width)).await? {
                debug!(path, "variants present, skipped");
                return Ok(ItemOutcome::Skipped);
            }
        }

        let bytes = self.storage.get(path).await?.ok_or(ItemError::NotFound)?;
        let codec = Arc::clone(&self.codec);
        let config = self.variants.clone();
        let outcome =
            tokio::task::spawn_blocking(move || render_variants(codec.as_ref(), &bytes, &config))
                .await
                .map_err(|e| ItemError::Task(e.to_string()))??;

        if outcome.variants.is_empty() {
            debug!(path, width = outcome.original.width, "narrower than every width, skipped");
            return Ok(ItemOutcome::Skipped);
        }
        for variant in outcome.variants.iter().rev() {
            let key = naming::variant_path(path, variant.width);
            self.storage
                .put(&key, &variant.bytes, content_type::WEBP)
                .await?;
        }
        debug!(
            path,
            width = outcome.original.width,
            variants = outcome.variants.len(),
            "image optimized"
        );
        Ok(ItemOutcome::Processed {
            variants: outcome.variants.len(),
        })
    }

    /// Delete every variant of `original` in its folder, whatever the width.
    async fn delete_variants_of(&self, original: &str) -> std::result::Result<usize, StorageError> {
        let dir = storage::parent(original);
        let base = naming::strip_extension(storage::file_name(original));
        let mut removed = 0;
        for entry in self.storage.list(dir).await? {
            if storage::parent(&entry.path) != dir {
                continue;
            }
            match naming::parse_variant(storage::file_name(&entry.path)) {
                Some(variant) if variant.base == base => {
                    self.storage.delete(&entry.path).await?;
                    removed += 1;
                }
                _ => {}
            }
        }
        Ok(removed)
    }
}
