//! Migration pipeline orchestration.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{MigrationConfig, TargetConfig};
use crate::connectors::common::{validate_mongo_collection, validate_mongo_database};
use crate::connectors::mariadb::MariaDbSource;
use crate::connectors::mongodb::MongoSink;
use crate::connectors::{DocumentSink, RelationalSource};
use crate::error::Result;
use crate::extract::RowExtractor;
use crate::load::{create_progress_bar, BatchLoader, LoadResult};
use crate::transform::TypeNormalizer;

/// Migration pipeline.
///
/// Owns both connections for the duration of a run and releases them on every
/// exit path.
pub struct Pipeline {
    config: MigrationConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `cancel` to stop the run between documents.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Copy `source_table` into `target_db.target_collection`.
    ///
    /// Connects to MariaDB first, then to MongoDB. In dry-run mode MongoDB is
    /// never contacted.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run. Both connections are closed
    /// before returning.
    pub async fn run(
        &self,
        source_table: &str,
        target_db: &str,
        target_collection: &str,
    ) -> Result<LoadResult> {
        validate_mongo_database(target_db)?;
        validate_mongo_collection(target_collection)?;

        let timeout = self.config.options.connect_timeout();
        info!(
            "Starting migration: {}.{} -> {}.{}",
            self.config.source.database, source_table, target_db, target_collection
        );

        let mut source: Box<dyn RelationalSource> =
            Box::new(MariaDbSource::connect(&self.config.source, timeout).await?);

        let sink: Option<Box<dyn DocumentSink>> = if self.config.options.dry_run {
            None
        } else {
            let target = TargetConfig {
                uri: self.config.target.uri.clone(),
                database: target_db.to_string(),
                collection: target_collection.to_string(),
            };
            match MongoSink::connect(&target, timeout).await {
                Ok(sink) => Some(Box::new(sink)),
                Err(e) => {
                    release_source(source.as_mut()).await;
                    return Err(e);
                }
            }
        };

        self.run_with(source, sink, source_table, target_db, target_collection)
            .await
    }

    /// Run with already acquired connections. `sink: None` is a dry run.
    ///
    /// Takes ownership of both handles and closes them whatever the outcome.
    /// A failed close is logged and never replaces the run's own result.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run.
    pub async fn run_with(
        &self,
        mut source: Box<dyn RelationalSource>,
        mut sink: Option<Box<dyn DocumentSink>>,
        source_table: &str,
        target_db: &str,
        target_collection: &str,
    ) -> Result<LoadResult> {
        let outcome = self
            .transfer(
                source.as_mut(),
                sink.as_mut().map(|s| &mut **s as &mut dyn DocumentSink),
                source_table,
                target_db,
                target_collection,
            )
            .await;

        release_source(source.as_mut()).await;
        if let Some(sink) = sink.as_mut() {
            release_sink(&mut **sink).await;
        }

        outcome
    }

    async fn transfer(
        &self,
        source: &mut dyn RelationalSource,
        sink: Option<&mut dyn DocumentSink>,
        source_table: &str,
        target_db: &str,
        target_collection: &str,
    ) -> Result<LoadResult> {
        let options = &self.config.options;
        let extractor = RowExtractor::new(TypeNormalizer::new(options.interval_policy));
        let extraction = extractor.extract(source, source_table).await?;

        let mut loader = BatchLoader::new(target_db, target_collection)
            .with_sink(sink)
            .with_batch_size(options.batch_size)
            .with_cancellation(self.cancel.clone())
            .with_progress(create_progress_bar(options.show_progress));

        loader.load(extraction.documents).await
    }
}

async fn release_source(source: &mut dyn RelationalSource) {
    if let Err(e) = source.close().await {
        warn!("Failed to close {} source: {}", source.source_type(), e);
    }
}

async fn release_sink(sink: &mut dyn DocumentSink) {
    if let Err(e) = sink.close().await {
        warn!("Failed to close {} target: {}", sink.sink_type(), e);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
