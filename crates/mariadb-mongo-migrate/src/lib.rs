// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # MariaDB to MongoDB Migration Tool
//!
//! `mariadb-mongo-migrate` is a CLI tool and library that copies a single
//! MariaDB (or MySQL) table into a MongoDB collection.
//!
//! One run is a one-shot, full-table copy:
//!
//! 1. read the ordered column list from `INFORMATION_SCHEMA.COLUMNS`,
//! 2. stream `SELECT *` rows,
//! 3. normalize every value to BSON,
//! 4. write ordered `insert_many` batches.
//!
//! ## Type Mapping
//!
//! | MariaDB | BSON |
//! |---------|------|
//! | `DECIMAL` | `Decimal128` (exact), string when wider than 34 digits |
//! | `DATE` | `DateTime` at midnight UTC |
//! | `DATETIME` / `TIMESTAMP` | `DateTime` (UTC, millisecond precision) |
//! | `TIME` | per `IntervalPolicy`: null, text, micros or wall-clock |
//! | integers | `Int32` when it fits, else `Int64`, else `Decimal128` |
//! | `FLOAT` / `DOUBLE` | `Double` |
//! | text, `ENUM`, `SET`, `JSON` | `String` |
//! | binary, `BIT`, spatial | `Binary` (generic) |
//!
//! ## Quick Start
//!
//! ```bash
//! MARIADB_PASSWORD=secret mariadb-mongo-migrate \
//!     -m db.local -u etl -s shop -t orders \
//!     -o mongodb://localhost:27017 -d archive -c orders
//!
//! # Dry run (read and normalize only)
//! mariadb-mongo-migrate ... --dry-run
//! ```
//!
//! ## Exit Codes
//!
//! `0` on success, `1` for usage or configuration errors, `100` for any
//! failure once the run has started.

#![warn(missing_docs)]

pub mod config;
pub mod connectors;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod transform;

pub use config::{MigrationConfig, MigrationOptions, SourceConfig, TargetConfig};
pub use connectors::{DocumentSink, RelationalSource, SourceValue};
pub use error::{Error, Result};
pub use extract::{Extraction, RowExtractor};
pub use load::{BatchLoader, LoadResult};
pub use pipeline::Pipeline;
pub use transform::{IntervalPolicy, TypeNormalizer};
