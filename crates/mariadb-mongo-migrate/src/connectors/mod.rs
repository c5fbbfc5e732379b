//! Source and destination connectors.
//!
//! The pipeline only talks to the two traits defined here. `mariadb` and
//! `mongodb` provide the real implementations.

pub mod common;
pub mod mariadb;
pub mod mongodb;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use futures::stream::BoxStream;

use crate::error::Result;

/// A raw value as read from the relational source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// SQL NULL.
    Null,
    /// `BOOLEAN` / `TINYINT(1)`.
    Bool(bool),
    /// Signed integer types.
    Int(i64),
    /// Unsigned integer types and `YEAR`.
    UInt(u64),
    /// `FLOAT`.
    Float(f32),
    /// `DOUBLE`.
    Double(f64),
    /// Fixed-point `DECIMAL`, as the exact digit string sent by the server.
    Decimal(String),
    /// Character data, `ENUM`, `SET` and `JSON`.
    Text(String),
    /// Binary data, `BIT` and spatial types.
    Bytes(Vec<u8>),
    /// `DATE`.
    Date(NaiveDate),
    /// `DATETIME`.
    DateTime(NaiveDateTime),
    /// `TIMESTAMP`.
    Timestamp(DateTime<Utc>),
    /// `TIME`, which in MariaDB is a signed duration.
    Interval(TimeDelta),
}

/// Positional values for one source row.
pub type Row = Vec<SourceValue>;

/// Lazy, single-pass stream of rows from a table scan.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// A relational database holding the table to migrate.
#[async_trait]
pub trait RelationalSource: Send {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// Ordered column names for `table`, as reported by the catalog.
    ///
    /// Fails with `Error::Schema` if the table does not exist.
    async fn columns(&mut self, table: &str) -> Result<Vec<String>>;

    /// Full-table scan returning rows in cursor order.
    ///
    /// `table` must already be a validated identifier.
    fn scan<'a>(&'a mut self, table: &str) -> Result<RowStream<'a>>;

    /// Close the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// A document store receiving the migrated rows.
#[async_trait]
pub trait DocumentSink: Send {
    /// Get the sink type name.
    fn sink_type(&self) -> &'static str;

    /// Insert one batch with an ordered insert.
    ///
    /// Returns the generated ids in insertion order. On rejection returns
    /// `Error::Load` whose `inserted_count` is the number of documents of
    /// *this batch* committed before the failure.
    async fn insert_batch(
        &mut self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>>;

    /// Close the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}
