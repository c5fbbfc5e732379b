//! MariaDB/MySQL source connector.
//!
//! Holds a single `sqlx` connection (no pool). Column discovery goes through
//! `INFORMATION_SCHEMA` with a bound parameter. The table scan streams rows
//! from the server cursor without buffering the result set.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use futures::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column, ConnectOptions, Connection, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::connectors::common::quote_identifier;
use crate::connectors::{RelationalSource, Row, RowStream, SourceValue};
use crate::error::{Error, Result};

/// Ordered column names of a table in the connected database.
///
/// `CAST` keeps the column a character type on servers where the catalog
/// reports `COLUMN_NAME` as binary.
const COLUMNS_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

/// How a column's values are decoded, derived from the reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Signed integers, including `BOOLEAN` (an alias of `TINYINT(1)`).
    Int,
    /// Unsigned integers.
    UInt,
    /// `YEAR`.
    Year,
    /// `FLOAT`.
    Float,
    /// `DOUBLE`.
    Double,
    /// `DECIMAL`.
    Decimal,
    /// `DATE`.
    Date,
    /// `DATETIME`.
    DateTime,
    /// `TIMESTAMP`.
    Timestamp,
    /// `TIME`.
    Time,
    /// Binary strings, blobs, `BIT` and spatial data.
    Binary,
    /// Everything else is read as text.
    Text,
    /// Columns of type `NULL` (e.g. `SELECT NULL`).
    Null,
}

impl ColumnKind {
    /// Classify a MySQL type name such as `"BIGINT UNSIGNED"` or `"VARCHAR"`.
    pub fn from_type_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        let unsigned = upper.ends_with(" UNSIGNED");
        let base = upper.trim_end_matches(" UNSIGNED");

        match base {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" if unsigned => {
                ColumnKind::UInt
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "BOOLEAN" => {
                ColumnKind::Int
            }
            "YEAR" => ColumnKind::Year,
            "FLOAT" => ColumnKind::Float,
            "DOUBLE" => ColumnKind::Double,
            "DECIMAL" | "NUMERIC" => ColumnKind::Decimal,
            "DATE" => ColumnKind::Date,
            "DATETIME" => ColumnKind::DateTime,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "TIME" => ColumnKind::Time,
            "NULL" => ColumnKind::Null,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => ColumnKind::Binary,
            _ => ColumnKind::Text,
        }
    }
}

/// MariaDB source holding one exclusively owned connection.
pub struct MariaDbSource {
    conn: Option<MySqlConnection>,
    database: String,
    scan_sql: String,
}

impl MariaDbSource {
    /// Open a connection, failing fast on unreachable hosts or bad credentials.
    pub async fn connect(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let conn = tokio::time::timeout(timeout, options.connect())
            .await
            .map_err(|_| {
                Error::SourceConnection(format!(
                    "timed out after {}s connecting to {}:{}",
                    timeout.as_secs(),
                    config.host,
                    config.port
                ))
            })?
            .map_err(|e| {
                Error::SourceConnection(format!(
                    "{}@{}:{}/{}: {}",
                    config.user, config.host, config.port, config.database, e
                ))
            })?;

        info!(
            "Connected to MariaDB source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            conn: Some(conn),
            database: config.database.clone(),
            scan_sql: String::new(),
        })
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::SourceConnection("Not connected".to_string()))
    }
}

#[async_trait]
impl RelationalSource for MariaDbSource {
    fn source_type(&self) -> &'static str {
        "mariadb"
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let rows: Vec<MySqlRow> = sqlx::query(COLUMNS_QUERY)
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::Schema(format!("catalog query for '{}' failed: {}", table, e)))?;

        let columns = rows
            .iter()
            .map(|row| row.try_get::<String, _>("COLUMN_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Schema(format!("reading column names of '{}': {}", table, e)))?;

        if columns.is_empty() {
            return Err(Error::Schema(format!(
                "table '{}' does not exist in database '{}'",
                table, self.database
            )));
        }

        debug!(table, columns = ?columns, "loaded column descriptor");
        Ok(columns)
    }

    fn scan<'a>(&'a mut self, table: &str) -> Result<RowStream<'a>> {
        let sql = format!("SELECT * FROM {}", quote_identifier(table)?);
        debug!(%sql, "opening table scan");

        let Self { conn, scan_sql, .. } = self;
        *scan_sql = sql;
        let conn = conn
            .as_mut()
            .ok_or_else(|| Error::SourceConnection("Not connected".to_string()))?;

        let rows = sqlx::query(scan_sql.as_str())
            .fetch(conn)
            .map(|row| match row {
                Ok(row) => decode_row(&row),
                Err(e) => Err(Error::Extraction(format!("cursor read failed: {}", e))),
            })
            .boxed();

        Ok(rows)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::SourceConnection(format!("closing connection: {}", e)))?;
            debug!("MariaDB connection closed");
        }
        Ok(())
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    (0..row.len())
        .map(|idx| {
            decode_value(row, idx).map_err(|e| {
                Error::Extraction(format!(
                    "column {} ('{}'): {}",
                    idx,
                    row.column(idx).name(),
                    e
                ))
            })
        })
        .collect()
}

fn decode_value(row: &MySqlRow, idx: usize) -> std::result::Result<SourceValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SourceValue::Null);
    }

    let kind = ColumnKind::from_type_name(row.column(idx).type_info().name());
    let value = match kind {
        // Integer widths vary per column; the unchecked decoders read any width.
        ColumnKind::Int => SourceValue::Int(row.try_get_unchecked::<i64, _>(idx)?),
        ColumnKind::UInt => SourceValue::UInt(row.try_get_unchecked::<u64, _>(idx)?),
        ColumnKind::Year => SourceValue::UInt(u64::from(row.try_get_unchecked::<u16, _>(idx)?)),
        ColumnKind::Float => SourceValue::Float(row.try_get::<f32, _>(idx)?),
        ColumnKind::Double => SourceValue::Double(row.try_get::<f64, _>(idx)?),
        // DECIMAL travels as its exact decimal text in both protocols.
        ColumnKind::Decimal => SourceValue::Decimal(row.try_get_unchecked::<String, _>(idx)?),
        ColumnKind::Date => match row.try_get::<NaiveDate, _>(idx) {
            Ok(date) => SourceValue::Date(date),
            Err(_) if is_zero_date(row, idx) => SourceValue::Null,
            Err(e) => return Err(e),
        },
        ColumnKind::DateTime => match row.try_get::<NaiveDateTime, _>(idx) {
            Ok(dt) => SourceValue::DateTime(dt),
            Err(_) if is_zero_date(row, idx) => SourceValue::Null,
            Err(e) => return Err(e),
        },
        ColumnKind::Timestamp => match row.try_get::<DateTime<Utc>, _>(idx) {
            Ok(ts) => SourceValue::Timestamp(ts),
            Err(_) if is_zero_date(row, idx) => SourceValue::Null,
            Err(e) => return Err(e),
        },
        ColumnKind::Time => match row.try_get::<TimeDelta, _>(idx) {
            Ok(delta) => SourceValue::Interval(delta),
            // A zero TIME has the same empty binary payload as a zero date.
            Err(_) if is_zero_date(row, idx) => SourceValue::Interval(TimeDelta::zero()),
            Err(e) => return Err(e),
        },
        ColumnKind::Binary => SourceValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        ColumnKind::Text => bytes_to_text(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        ColumnKind::Null => SourceValue::Null,
    };
    Ok(value)
}

/// Zero dates (`0000-00-00`) read as NULL.
fn is_zero_date(row: &MySqlRow, idx: usize) -> bool {
    row.try_get_unchecked::<Vec<u8>, _>(idx)
        .map(|bytes| is_zero_date_payload(&bytes))
        .unwrap_or(false)
}

/// Binary rows keep the length byte of temporal values, so a zero date is
/// `[0x00]`. Text rows spell it out.
fn is_zero_date_payload(bytes: &[u8]) -> bool {
    match bytes {
        [] | [0] => true,
        text => text.starts_with(b"0000-00-00"),
    }
}

fn bytes_to_text(bytes: Vec<u8>) -> SourceValue {
    match String::from_utf8(bytes) {
        Ok(text) => SourceValue::Text(text),
        Err(e) => SourceValue::Bytes(e.into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kind_integers() {
        assert_eq!(ColumnKind::from_type_name("INT"), ColumnKind::Int);
        assert_eq!(ColumnKind::from_type_name("BIGINT"), ColumnKind::Int);
        assert_eq!(ColumnKind::from_type_name("BOOLEAN"), ColumnKind::Int);
        assert_eq!(
            ColumnKind::from_type_name("BIGINT UNSIGNED"),
            ColumnKind::UInt
        );
        assert_eq!(
            ColumnKind::from_type_name("tinyint unsigned"),
            ColumnKind::UInt
        );
        assert_eq!(ColumnKind::from_type_name("YEAR"), ColumnKind::Year);
    }

    #[test]
    fn test_column_kind_temporal_and_decimal() {
        assert_eq!(ColumnKind::from_type_name("DECIMAL"), ColumnKind::Decimal);
        assert_eq!(ColumnKind::from_type_name("DATE"), ColumnKind::Date);
        assert_eq!(ColumnKind::from_type_name("DATETIME"), ColumnKind::DateTime);
        assert_eq!(
            ColumnKind::from_type_name("TIMESTAMP"),
            ColumnKind::Timestamp
        );
        assert_eq!(ColumnKind::from_type_name("TIME"), ColumnKind::Time);
    }

    #[test]
    fn test_column_kind_strings_and_binary() {
        assert_eq!(ColumnKind::from_type_name("VARCHAR"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type_name("TEXT"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type_name("ENUM"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type_name("JSON"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type_name("VARBINARY"), ColumnKind::Binary);
        assert_eq!(ColumnKind::from_type_name("LONGBLOB"), ColumnKind::Binary);
        assert_eq!(ColumnKind::from_type_name("BIT"), ColumnKind::Binary);
        assert_eq!(ColumnKind::from_type_name("NULL"), ColumnKind::Null);
    }

    #[test]
    fn test_bytes_to_text() {
        assert_eq!(
            bytes_to_text(b"hello".to_vec()),
            SourceValue::Text("hello".to_string())
        );
        assert_eq!(
            bytes_to_text(vec![0xff, 0xfe]),
            SourceValue::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn test_zero_date_payloads() {
        // Binary protocol: length byte only.
        assert!(is_zero_date_payload(&[0x00]));
        assert!(is_zero_date_payload(&[]));
        // Text protocol.
        assert!(is_zero_date_payload(b"0000-00-00"));
        assert!(is_zero_date_payload(b"0000-00-00 00:00:00"));

        // 2024-03-15 in binary form: length 4, year LE, month, day.
        assert!(!is_zero_date_payload(&[0x04, 0xe8, 0x07, 0x03, 0x0f]));
        assert!(!is_zero_date_payload(b"2024-03-15"));
    }

    #[test]
    fn test_columns_query_is_parameterized() {
        assert!(COLUMNS_QUERY.contains("TABLE_NAME = ?"));
        assert!(COLUMNS_QUERY.contains("TABLE_SCHEMA = DATABASE()"));
        assert!(COLUMNS_QUERY.contains("ORDER BY ORDINAL_POSITION"));
    }
}
