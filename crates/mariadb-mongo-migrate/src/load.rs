//! Batched writes of the document stream into the target collection.

use std::time::Instant;

use bson::{Bson, Document};
use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connectors::DocumentSink;
use crate::error::{Error, Result};

/// Default number of documents per `insert_many`.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome of a completed load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadResult {
    /// Documents committed to the target.
    pub inserted_count: u64,
    /// Generated `_id`s in insertion order.
    #[serde(skip)]
    pub inserted_ids: Vec<Bson>,
    /// Rows read from the source.
    pub extracted: u64,
    /// Insert calls issued.
    pub batches: u64,
    /// Wall time of the load in seconds.
    pub duration_secs: f64,
    /// Nothing was written.
    pub dry_run: bool,
}

impl LoadResult {
    /// Calculate throughput (documents per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.extracted as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Writes documents to a sink in ordered batches.
///
/// Without a sink the loader runs dry: documents are consumed and counted but
/// never written.
pub struct BatchLoader<'s> {
    sink: Option<&'s mut dyn DocumentSink>,
    database: String,
    collection: String,
    batch_size: usize,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl<'s> BatchLoader<'s> {
    /// Create a loader targeting `database.collection`.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            sink: None,
            database: database.into(),
            collection: collection.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: CancellationToken::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Write through `sink`. Leaving it unset is a dry run.
    #[must_use]
    pub fn with_sink(mut self, sink: Option<&'s mut dyn DocumentSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Documents per insert call. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stop between documents once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Consume `documents`, flushing every `batch_size` documents.
    ///
    /// # Errors
    ///
    /// - `Error::Load` when a batch is rejected. Its `inserted_count` covers
    ///   every earlier batch plus the committed prefix of the failed one.
    /// - `Error::Cancelled` when the token fires.
    /// - `Error::ExtractionAborted` when the stream yields an error, carrying
    ///   the documents already committed. The pending partial batch is dropped
    ///   and earlier batches stay written.
    pub async fn load<S>(&mut self, mut documents: S) -> Result<LoadResult>
    where
        S: Stream<Item = Result<Document>> + Unpin,
    {
        let start = Instant::now();
        let mut result = LoadResult {
            dry_run: self.sink.is_none(),
            ..LoadResult::default()
        };
        let mut batch: Vec<Document> = Vec::with_capacity(self.batch_size);

        if result.dry_run {
            info!("Dry run mode - not writing to target");
        }

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!(
                        "Migration cancelled after {} documents inserted",
                        result.inserted_count
                    );
                    self.progress.abandon_with_message("cancelled");
                    return Err(Error::Cancelled {
                        inserted_count: result.inserted_count,
                    });
                }
                next = documents.next() => next,
            };

            match next {
                Some(Ok(document)) => {
                    result.extracted += 1;
                    self.progress.inc(1);
                    batch.push(document);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, &mut result).await?;
                    }
                }
                Some(Err(e)) => {
                    error!(
                        "Extraction failed after {} rows ({} inserted): {}",
                        result.extracted, result.inserted_count, e
                    );
                    self.progress.abandon_with_message("failed");
                    let message = match e {
                        Error::Extraction(message) => message,
                        other => other.to_string(),
                    };
                    return Err(Error::ExtractionAborted {
                        inserted_count: result.inserted_count,
                        message,
                    });
                }
                None => break,
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut result).await?;
        }

        result.duration_secs = start.elapsed().as_secs_f64();
        self.progress.finish_with_message("done");

        info!(
            "Load complete: {} extracted, {} inserted in {} batches, {:.2}s ({:.0} docs/sec)",
            result.extracted,
            result.inserted_count,
            result.batches,
            result.duration_secs,
            result.throughput()
        );

        Ok(result)
    }

    async fn flush(&mut self, batch: &mut Vec<Document>, result: &mut LoadResult) -> Result<()> {
        let documents = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        let Some(sink) = self.sink.as_deref_mut() else {
            return Ok(());
        };

        let len = documents.len() as u64;
        result.batches += 1;
        debug!(
            batch = result.batches,
            documents = len,
            "inserting batch into {}.{}",
            self.database,
            self.collection
        );

        match sink
            .insert_batch(&self.database, &self.collection, documents)
            .await
        {
            Ok(ids) => {
                result.inserted_count += len;
                result.inserted_ids.extend(ids);
                Ok(())
            }
            Err(e) => {
                let (committed, message) = match e {
                    Error::Load {
                        inserted_count,
                        message,
                    } => (inserted_count, message),
                    other => (0, other.to_string()),
                };
                let total = result.inserted_count + committed;
                error!(
                    "Batch {} rejected, {} documents inserted in total: {}",
                    result.batches, total, message
                );
                self.progress.abandon_with_message("failed");
                Err(Error::load(total, message))
            }
        }
    }
}

/// Spinner counting processed documents, hidden unless `enabled`.
#[must_use]
pub fn create_progress_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} documents ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
