//! MongoDB destination connector.
//!
//! Writes batches with ordered `insert_many`. The collection is created by
//! the server on first insert.

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use ::mongodb::error::ErrorKind;
use ::mongodb::options::ClientOptions;
use ::mongodb::Client;
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::connectors::common::{redact_uri, validate_mongo_uri};
use crate::connectors::DocumentSink;
use crate::error::{Error, Result};

/// Application name reported to the server.
const APP_NAME: &str = "mariadb-mongo-migrate";

/// MongoDB sink holding one exclusively owned client.
pub struct MongoSink {
    client: Option<Client>,
}

impl MongoSink {
    /// Create a client and ping the deployment so failures surface now.
    pub async fn connect(config: &TargetConfig, timeout: Duration) -> Result<Self> {
        validate_mongo_uri(&config.uri)?;
        let shown = redact_uri(&config.uri);

        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            Error::DestinationConnection(format!("invalid MongoDB URI {}: {}", shown, e))
        })?;
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).map_err(|e| {
            Error::DestinationConnection(format!("failed to create MongoDB client: {}", e))
        })?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| {
                Error::DestinationConnection(format!("cannot reach {}: {}", shown, e))
            })?;

        info!("Connected to MongoDB target: {}", shown);
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::DestinationConnection("Not connected".to_string()))
    }
}

#[async_trait]
impl DocumentSink for MongoSink {
    fn sink_type(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_batch(
        &mut self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>> {
        let batch_len = documents.len();
        let target = self
            .client()?
            .database(database)
            .collection::<Document>(collection);

        match target.insert_many(documents).await {
            Ok(result) => {
                let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
                ids.sort_by_key(|(index, _)| *index);
                debug!(database, collection, inserted = ids.len(), "batch inserted");
                Ok(ids.into_iter().map(|(_, id)| id).collect())
            }
            Err(e) => {
                let indices = match e.kind.as_ref() {
                    ErrorKind::InsertMany(failure) => Some(
                        failure
                            .write_errors
                            .as_ref()
                            .map(|errors| errors.iter().map(|w| w.index).collect::<Vec<_>>())
                            .unwrap_or_default(),
                    ),
                    _ => None,
                };
                let committed = committed_before_failure(indices.as_deref(), batch_len);
                Err(Error::load(committed as u64, e.to_string()))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
        Ok(())
    }
}

/// Documents of a batch committed before an ordered insert stopped.
///
/// `write_error_indices` is `None` when the failure carried no per-document
/// information (network errors, for instance), in which case nothing of the
/// batch is counted. An empty slice means only the write concern failed after
/// every document was written.
pub fn committed_before_failure(write_error_indices: Option<&[usize]>, batch_len: usize) -> usize {
    match write_error_indices {
        None => 0,
        Some([]) => batch_len,
        Some(indices) => indices
            .iter()
            .copied()
            .min()
            .unwrap_or(0)
            .min(batch_len),
    }
}
