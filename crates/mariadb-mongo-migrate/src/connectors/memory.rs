//! In-memory connectors used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use futures::stream::{self, StreamExt};

use crate::connectors::{DocumentSink, RelationalSource, Row, RowStream};
use crate::error::{Error, Result};

/// Tables held in memory, keyed by name.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<String, (Vec<String>, Vec<Row>)>,
    fail_after: Option<usize>,
    /// Number of `close` calls observed.
    pub closed: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.tables.insert(name.to_string(), (columns, rows));
        self
    }

    /// Make the scan fail once `rows` rows have been produced.
    pub fn fail_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }
}

#[async_trait]
impl RelationalSource for MemorySource {
    fn source_type(&self) -> &'static str {
        "memory"
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.tables
            .get(table)
            .map(|(columns, _)| columns.clone())
            .ok_or_else(|| Error::Schema(format!("table '{}' does not exist", table)))
    }

    fn scan<'a>(&'a mut self, table: &str) -> Result<RowStream<'a>> {
        let (_, rows) = self
            .tables
            .get(table)
            .ok_or_else(|| Error::Extraction(format!("cannot scan '{}'", table)))?;

        let mut items: Vec<Result<Row>> = rows.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(Error::Extraction("connection lost".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A collection held in memory.
#[derive(Default)]
pub struct MemorySink {
    /// Every committed document, in insertion order.
    pub documents: Arc<Mutex<Vec<Document>>>,
    /// Number of `insert_batch` calls observed.
    pub insert_calls: Arc<AtomicUsize>,
    /// Number of `close` calls observed.
    pub closed: Arc<AtomicUsize>,
    unique_field: Option<String>,
    fail_close: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate a unique index on `field`.
    pub fn with_unique(mut self, field: &str) -> Self {
        self.unique_field = Some(field.to_string());
        self
    }

    /// Make `close` return an error.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    fn sink_type(&self) -> &'static str {
        "memory"
    }

    async fn insert_batch(
        &mut self,
        _database: &str,
        _collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self
            .documents
            .lock()
            .map_err(|_| Error::DestinationConnection("poisoned".to_string()))?;

        let mut ids = Vec::with_capacity(documents.len());
        for (index, mut doc) in documents.into_iter().enumerate() {
            if let Some(field) = &self.unique_field {
                let key = doc.get(field).cloned();
                if key.is_some() && stored.iter().any(|d| d.get(field) == key.as_ref()) {
                    return Err(Error::load(
                        index as u64,
                        format!("E11000 duplicate key error index: {}_1", field),
                    ));
                }
            }
            let id = Bson::ObjectId(ObjectId::new());
            doc.insert("_id", id.clone());
            stored.push(doc);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::DestinationConnection("close failed".to_string()));
        }
        Ok(())
    }
}
