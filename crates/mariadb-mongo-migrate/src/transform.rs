//! Value normalization from relational values to BSON.
//!
//! Decimal, date and interval values have no direct document-model
//! equivalent, so each is mapped explicitly. Everything else passes through.

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Decimal128, Document};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connectors::SourceValue;

/// How `TIME` (interval) values are written to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalPolicy {
    /// Intervals become `null`.
    #[default]
    Null,
    /// Intervals become `[-]HH:MM:SS.ffffff` strings. Hours may exceed 24.
    Text,
    /// Intervals become signed microsecond counts.
    Micros,
    /// Intervals become the current wall-clock time at conversion.
    ///
    /// This reproduces what older exports did and is not deterministic.
    WallClock,
}

impl IntervalPolicy {
    /// Name as accepted on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalPolicy::Null => "null",
            IntervalPolicy::Text => "text",
            IntervalPolicy::Micros => "micros",
            IntervalPolicy::WallClock => "wall-clock",
        }
    }
}

impl std::str::FromStr for IntervalPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "null" => Ok(IntervalPolicy::Null),
            "text" => Ok(IntervalPolicy::Text),
            "micros" => Ok(IntervalPolicy::Micros),
            "wall-clock" | "wallclock" => Ok(IntervalPolicy::WallClock),
            other => Err(format!(
                "unknown interval policy '{}' (expected null, text, micros or wall-clock)",
                other
            )),
        }
    }
}

/// Maps source values to BSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeNormalizer {
    interval_policy: IntervalPolicy,
}

impl TypeNormalizer {
    /// Create a normalizer with the given interval policy.
    #[must_use]
    pub fn new(interval_policy: IntervalPolicy) -> Self {
        Self { interval_policy }
    }

    /// Interval policy in effect.
    #[must_use]
    pub fn interval_policy(&self) -> IntervalPolicy {
        self.interval_policy
    }

    /// Normalize a single value. Never fails.
    pub fn normalize(&self, value: SourceValue) -> Bson {
        match value {
            SourceValue::Decimal(digits) => decimal_to_bson(digits),
            SourceValue::Date(date) => {
                let midnight = NaiveDateTime::from(date);
                Bson::DateTime(bson::DateTime::from_millis(
                    midnight.and_utc().timestamp_millis(),
                ))
            }
            SourceValue::Interval(delta) => self.interval_to_bson(delta),

            SourceValue::Null => Bson::Null,
            SourceValue::Bool(b) => Bson::Boolean(b),
            SourceValue::Int(i) => int_to_bson(i),
            SourceValue::UInt(u) => match i64::try_from(u) {
                Ok(i) => int_to_bson(i),
                Err(_) => decimal_to_bson(u.to_string()),
            },
            SourceValue::Float(f) => Bson::Double(f64::from(f)),
            SourceValue::Double(d) => Bson::Double(d),
            SourceValue::Text(s) => Bson::String(s),
            SourceValue::Bytes(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            }),
            SourceValue::DateTime(dt) => {
                Bson::DateTime(bson::DateTime::from_millis(dt.and_utc().timestamp_millis()))
            }
            SourceValue::Timestamp(ts) => {
                Bson::DateTime(bson::DateTime::from_millis(ts.timestamp_millis()))
            }
        }
    }

    /// Zip column names with a row's values into a document.
    ///
    /// Field order follows `columns`. The caller guarantees equal lengths.
    pub fn to_document(&self, columns: &[String], row: Vec<SourceValue>) -> Document {
        let mut doc = Document::new();
        for (name, value) in columns.iter().zip(row) {
            doc.insert(name.clone(), self.normalize(value));
        }
        doc
    }

    fn interval_to_bson(&self, delta: TimeDelta) -> Bson {
        match self.interval_policy {
            IntervalPolicy::Null => Bson::Null,
            IntervalPolicy::Text => Bson::String(format_interval(delta)),
            IntervalPolicy::Micros => match delta.num_microseconds() {
                Some(us) => Bson::Int64(us),
                None => Bson::Null,
            },
            IntervalPolicy::WallClock => Bson::DateTime(bson::DateTime::now()),
        }
    }
}

/// Integers that fit in 32 bits are stored as Int32, the rest as Int64.
fn int_to_bson(i: i64) -> Bson {
    match i32::try_from(i) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i),
    }
}

/// Decimal128 holds at most 34 significant digits.
const DECIMAL128_MAX_DIGITS: usize = 34;

fn significant_digits(digits: &str) -> usize {
    digits
        .trim_start_matches(['-', '+'])
        .replace('.', "")
        .trim_start_matches('0')
        .len()
}

fn decimal_to_bson(digits: String) -> Bson {
    if significant_digits(&digits) > DECIMAL128_MAX_DIGITS {
        warn!(value = %digits, "decimal exceeds 34 digits, keeping exact digits as a string");
        return Bson::String(digits);
    }
    match digits.parse::<Decimal128>() {
        Ok(dec) => Bson::Decimal128(dec),
        Err(e) => {
            warn!(
                value = %digits,
                error = %e,
                "decimal does not parse as Decimal128, keeping exact digits as a string"
            );
            Bson::String(digits)
        }
    }
}

/// Format an interval as `[-]HH:MM:SS.ffffff`.
pub fn format_interval(delta: TimeDelta) -> String {
    let total_us = delta.num_microseconds().unwrap_or(0);
    let sign = if total_us < 0 { "-" } else { "" };
    let abs = total_us.unsigned_abs();
    let secs = abs / 1_000_000;
    format!(
        "{}{:02}:{:02}:{:02}.{:06}",
        sign,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        abs % 1_000_000
    )
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
