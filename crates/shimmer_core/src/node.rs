//! Typed reads from semi-structured provider documents.
//!
//! Paths are dot separated object keys (`"data.items"`). The `require_*`
//! functions return a [`NodeError`] when a field is missing, null or of the
//! wrong type. The `optional_*` functions never fail: they return `None` and
//! log a warning when a field is explicitly null or present but unusable, so
//! that one drifting record can be skipped without discarding the rest of a
//! page. A missing field only logs at debug.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::error::NodeError;

#[derive(Debug, PartialEq)]
enum Lookup<'a> {
    Absent,
    /// The last segment exists and is explicitly `null`.
    Null,
    Present(&'a Value),
}

/// Walk `path` from `parent`, stopping at the first missing or null segment.
fn lookup<'a>(parent: &'a Value, path: &str) -> Lookup<'a> {
    let mut node = parent;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        match node.get(segment) {
            None => return Lookup::Absent,
            Some(Value::Null) if segments.peek().is_none() => return Lookup::Null,
            Some(Value::Null) => return Lookup::Absent,
            Some(child) => node = child,
        }
    }
    Lookup::Present(node)
}

fn walk<'a>(parent: &'a Value, path: &str) -> Result<&'a Value, NodeError> {
    match lookup(parent, path) {
        Lookup::Present(node) => Ok(node),
        Lookup::Absent | Lookup::Null => Err(NodeError::MissingField {
            path: path.to_string(),
        }),
    }
}

fn mismatch(path: &str, expected: &'static str, value: &Value) -> NodeError {
    NodeError::TypeMismatch {
        path: path.to_string(),
        expected,
        value: value.to_string(),
    }
}

/// The child node at `path`; missing and explicit null are both errors.
pub fn require_node<'a>(parent: &'a Value, path: &str) -> Result<&'a Value, NodeError> {
    walk(parent, path)
}

pub fn require_string<'a>(parent: &'a Value, path: &str) -> Result<&'a str, NodeError> {
    let node = walk(parent, path)?;
    node.as_str().ok_or_else(|| mismatch(path, "string", node))
}

pub fn require_bool(parent: &Value, path: &str) -> Result<bool, NodeError> {
    let node = walk(parent, path)?;
    node.as_bool().ok_or_else(|| mismatch(path, "boolean", node))
}

/// An integral number that fits `i64`. Fractional values are a mismatch,
/// never truncated.
pub fn require_long(parent: &Value, path: &str) -> Result<i64, NodeError> {
    let node = walk(parent, path)?;
    node.as_i64().ok_or_else(|| mismatch(path, "long", node))
}

/// Any JSON number, integral or not.
pub fn require_double(parent: &Value, path: &str) -> Result<f64, NodeError> {
    let node = walk(parent, path)?;
    node.as_f64().ok_or_else(|| mismatch(path, "double", node))
}

/// An RFC 3339 date-time with an explicit offset.
pub fn require_date_time(parent: &Value, path: &str) -> Result<DateTime<FixedOffset>, NodeError> {
    let node = walk(parent, path)?;
    node.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .ok_or_else(|| mismatch(path, "date-time", node))
}

/// An ISO `YYYY-MM-DD` calendar date.
pub fn require_local_date(parent: &Value, path: &str) -> Result<NaiveDate, NodeError> {
    let node = walk(parent, path)?;
    node.as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or_else(|| mismatch(path, "date", node))
}

/// An ISO local date-time without offset, e.g. `2015-06-12T08:30:00`.
pub fn require_local_date_time(parent: &Value, path: &str) -> Result<NaiveDateTime, NodeError> {
    let node = walk(parent, path)?;
    node.as_str()
        .and_then(|s| s.parse::<NaiveDateTime>().ok())
        .ok_or_else(|| mismatch(path, "local date-time", node))
}

/// A local date-time assembled from separate date and time fields.
pub fn require_local_date_time_from_parts(
    parent: &Value,
    date_path: &str,
    time_path: &str,
) -> Result<NaiveDateTime, NodeError> {
    let date = require_local_date(parent, date_path)?;
    let time = require_local_time(parent, time_path)?;
    Ok(date.and_time(time))
}

/// An ISO local time such as `08:30` or `08:30:00.250`.
pub fn require_local_time(parent: &Value, path: &str) -> Result<NaiveTime, NodeError> {
    let node = walk(parent, path)?;
    node.as_str()
        .and_then(parse_local_time)
        .ok_or_else(|| mismatch(path, "local time", node))
}

/// The child node at `path`, or `None` when any segment is missing or null.
pub fn optional_node<'a>(parent: &'a Value, path: &str) -> Option<&'a Value> {
    match walk(parent, path) {
        Ok(node) => Some(node),
        Err(_) => {
            tracing::debug!(path, "field missing or null");
            None
        }
    }
}

/// Shared shape of every optional scalar read: absent stays quiet, null or a
/// value of the wrong kind is logged.
fn optional_value<'a, T>(
    parent: &'a Value,
    path: &str,
    expected: &'static str,
    convert: impl FnOnce(&'a Value) -> Option<T>,
) -> Option<T> {
    let node = match lookup(parent, path) {
        Lookup::Present(node) => node,
        Lookup::Null => {
            tracing::warn!(path, expected, "field is null");
            return None;
        }
        Lookup::Absent => {
            tracing::debug!(path, "field missing");
            return None;
        }
    };
    let converted = convert(node);
    if converted.is_none() {
        tracing::warn!(path, expected, value = %node, "field isn't compatible");
    }
    converted
}

pub fn optional_string<'a>(parent: &'a Value, path: &str) -> Option<&'a str> {
    optional_value(parent, path, "string", Value::as_str)
}

pub fn optional_bool(parent: &Value, path: &str) -> Option<bool> {
    optional_value(parent, path, "boolean", Value::as_bool)
}

pub fn optional_long(parent: &Value, path: &str) -> Option<i64> {
    optional_value(parent, path, "long", Value::as_i64)
}

/// An integral number that fits `i32`.
pub fn optional_integer(parent: &Value, path: &str) -> Option<i32> {
    optional_value(parent, path, "integer", |v| {
        v.as_i64().and_then(|n| i32::try_from(n).ok())
    })
}

pub fn optional_double(parent: &Value, path: &str) -> Option<f64> {
    optional_value(parent, path, "double", Value::as_f64)
}

/// Parse the string at `path` with `parse`; unparsable values are logged and
/// treated as absent.
fn optional_parsed<T>(
    parent: &Value,
    path: &str,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let raw = optional_string(parent, path)?;
    let parsed = parse(raw);
    if parsed.is_none() {
        tracing::warn!(path, expected, value = raw, "field couldn't be parsed");
    }
    parsed
}

pub fn optional_date_time(parent: &Value, path: &str) -> Option<DateTime<FixedOffset>> {
    optional_parsed(parent, path, "date-time", |s| {
        DateTime::parse_from_rfc3339(s).ok()
    })
}

pub fn optional_local_date(parent: &Value, path: &str) -> Option<NaiveDate> {
    optional_parsed(parent, path, "date", |s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    })
}

/// An ISO local date-time without offset, e.g. `2015-06-12T08:30:00`.
pub fn optional_local_date_time(parent: &Value, path: &str) -> Option<NaiveDateTime> {
    optional_parsed(parent, path, "local date-time", |s| {
        s.parse::<NaiveDateTime>().ok()
    })
}

pub fn optional_local_time(parent: &Value, path: &str) -> Option<NaiveTime> {
    optional_parsed(parent, path, "local time", parse_local_time)
}

fn parse_local_time(s: &str) -> Option<NaiveTime> {
    s.parse::<NaiveTime>()
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// A local date-time assembled from separate date and time fields.
pub fn optional_local_date_time_from_parts(
    parent: &Value,
    date_path: &str,
    time_path: &str,
) -> Option<NaiveDateTime> {
    let date = optional_string(parent, date_path)?;
    let time = optional_string(parent, time_path)?;
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .zip(parse_local_time(time))
        .map(|(d, t)| d.and_time(t));
    if parsed.is_none() {
        tracing::warn!(
            date_path,
            time_path,
            date,
            time,
            "fields don't make up a valid timestamp"
        );
    }
    parsed
}

/// A zone offset such as `+02:00`, `-0500` or `Z`.
pub fn optional_fixed_offset(parent: &Value, path: &str) -> Option<FixedOffset> {
    optional_parsed(parent, path, "time zone offset", parse_fixed_offset)
}

pub(crate) fn parse_fixed_offset(s: &str) -> Option<FixedOffset> {
    if s == "Z" || s == "z" {
        return FixedOffset::east_opt(0);
    }
    s.parse::<FixedOffset>().ok()
}
