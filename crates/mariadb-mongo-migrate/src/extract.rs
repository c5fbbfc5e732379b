//! Row extraction: catalog lookup, table scan and document assembly.

use bson::Document;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info};

use crate::connectors::common::validate_identifier;
use crate::connectors::RelationalSource;
use crate::error::{Error, Result};
use crate::transform::TypeNormalizer;

/// Lazy, single-pass stream of documents, one per source row.
pub type DocumentStream<'a> = BoxStream<'a, Result<Document>>;

/// An open extraction over one table.
pub struct Extraction<'a> {
    /// Column names in catalog order. Every document uses them as field names.
    pub columns: Vec<String>,
    /// Documents in cursor order. Not restartable.
    pub documents: DocumentStream<'a>,
}

impl std::fmt::Debug for Extraction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extraction")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Turns a table scan into a stream of documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowExtractor {
    normalizer: TypeNormalizer,
}

impl RowExtractor {
    /// Create an extractor using `normalizer` for every value.
    #[must_use]
    pub fn new(normalizer: TypeNormalizer) -> Self {
        Self { normalizer }
    }

    /// Start extracting `table` from `source`.
    ///
    /// The table name is validated before anything is sent to the server and
    /// the column list is fetched exactly once.
    ///
    /// # Errors
    ///
    /// `Error::Extraction` for a malformed table name or a failed scan,
    /// `Error::Schema` when the table does not exist.
    pub async fn extract<'a>(
        &self,
        source: &'a mut dyn RelationalSource,
        table: &str,
    ) -> Result<Extraction<'a>> {
        validate_identifier(table)?;

        let columns = source.columns(table).await?;
        info!(
            "Discovered {} columns in '{}': {}",
            columns.len(),
            table,
            columns.join(", ")
        );

        let rows = source.scan(table)?;
        let normalizer = self.normalizer;
        debug!(
            interval_policy = normalizer.interval_policy().as_str(),
            "streaming rows from '{}'", table
        );
        let names = columns.clone();
        let documents = rows
            .map(move |row| {
                let row = row?;
                if row.len() != names.len() {
                    return Err(Error::Extraction(format!(
                        "row has {} values but the table has {} columns",
                        row.len(),
                        names.len()
                    )));
                }
                Ok(normalizer.to_document(&names, row))
            })
            .boxed();

        Ok(Extraction { columns, documents })
    }
}
