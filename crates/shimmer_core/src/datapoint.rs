//! Canonical data point model.
//!
//! Every provider document is normalized into one or more [`DataPoint`]s: a
//! header describing what the body is and where it came from, plus a body
//! shaped by the schema named in the header.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the measurement was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Modality {
    #[serde(rename = "sensed")]
    Sensed,
    #[serde(rename = "self-reported")]
    SelfReported,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AcquisitionProvenance {
    source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modality: Option<Modality>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    additional_properties: BTreeMap<String, Value>,
}

impl AcquisitionProvenance {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            modality: None,
            additional_properties: BTreeMap::new(),
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    pub fn with_additional_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_properties.insert(key.into(), value);
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn modality(&self) -> Option<Modality> {
        self.modality
    }

    pub fn additional_properties(&self) -> &BTreeMap<String, Value> {
        &self.additional_properties
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataPointHeader {
    body_schema_id: String,
    acquisition_provenance: AcquisitionProvenance,
    creation_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    additional_properties: BTreeMap<String, Value>,
}

impl DataPointHeader {
    pub fn new(
        body_schema_id: impl Into<String>,
        acquisition_provenance: AcquisitionProvenance,
        creation_date_time: DateTime<Utc>,
    ) -> Self {
        Self {
            body_schema_id: body_schema_id.into(),
            acquisition_provenance,
            creation_date_time,
            additional_properties: BTreeMap::new(),
        }
    }

    pub fn with_additional_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_properties.insert(key.into(), value);
        self
    }

    pub fn body_schema_id(&self) -> &str {
        &self.body_schema_id
    }

    pub fn acquisition_provenance(&self) -> &AcquisitionProvenance {
        &self.acquisition_provenance
    }

    pub fn creation_date_time(&self) -> DateTime<Utc> {
        self.creation_date_time
    }

    pub fn additional_properties(&self) -> &BTreeMap<String, Value> {
        &self.additional_properties
    }
}

/// A normalized measurement. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataPoint {
    header: DataPointHeader,
    body: Value,
}

impl DataPoint {
    pub fn new(header: DataPointHeader, body: Value) -> Self {
        Self { header, body }
    }

    pub fn header(&self) -> &DataPointHeader {
        &self.header
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_parts(self) -> (DataPointHeader, Value) {
        (self.header, self.body)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DurationUnit {
    #[serde(rename = "ps")]
    Picosecond,
    #[serde(rename = "ns")]
    Nanosecond,
    #[serde(rename = "us")]
    Microsecond,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "sec")]
    Second,
    #[serde(rename = "min")]
    Minute,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "wk")]
    Week,
    #[serde(rename = "Mo")]
    Month,
    #[serde(rename = "yr")]
    Year,
}

impl DurationUnit {
    /// Nanoseconds per unit; calendar units have no fixed length.
    fn nanos(self) -> Option<f64> {
        let nanos = match self {
            DurationUnit::Picosecond => 1e-3,
            DurationUnit::Nanosecond => 1.0,
            DurationUnit::Microsecond => 1e3,
            DurationUnit::Millisecond => 1e6,
            DurationUnit::Second => 1e9,
            DurationUnit::Minute => 60e9,
            DurationUnit::Hour => 3_600e9,
            DurationUnit::Day => 86_400e9,
            DurationUnit::Week => 604_800e9,
            DurationUnit::Month | DurationUnit::Year => return None,
        };
        Some(nanos)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DurationUnitValue {
    pub value: f64,
    pub unit: DurationUnit,
}

impl DurationUnitValue {
    pub fn new(value: f64, unit: DurationUnit) -> Self {
        Self { value, unit }
    }

    /// The equivalent fixed-length duration, or `None` for months and years.
    pub fn to_duration(&self) -> Option<chrono::Duration> {
        let nanos = self.value * self.unit.nanos()?;
        if !nanos.is_finite() || nanos.abs() > i64::MAX as f64 {
            return None;
        }
        Some(chrono::Duration::nanoseconds(nanos.round() as i64))
    }
}

/// A span of time. Exactly one of the three shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimeInterval {
    /// Half-open: `start` inclusive, `end` exclusive.
    StartEnd {
        start_date_time: DateTime<FixedOffset>,
        end_date_time: DateTime<FixedOffset>,
    },
    StartDuration {
        start_date_time: DateTime<FixedOffset>,
        duration: DurationUnitValue,
    },
    Date {
        date: NaiveDate,
    },
}

impl TimeInterval {
    pub fn start_end(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        TimeInterval::StartEnd {
            start_date_time: start,
            end_date_time: end,
        }
    }

    pub fn start_duration(start: DateTime<FixedOffset>, duration: DurationUnitValue) -> Self {
        TimeInterval::StartDuration {
            start_date_time: start,
            duration,
        }
    }

    pub fn date(date: NaiveDate) -> Self {
        TimeInterval::Date { date }
    }

    pub fn start_date_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeInterval::StartEnd {
                start_date_time, ..
            }
            | TimeInterval::StartDuration {
                start_date_time, ..
            } => Some(*start_date_time),
            TimeInterval::Date { .. } => None,
        }
    }

    /// The exclusive end instant, computed from the duration when needed.
    pub fn end_date_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeInterval::StartEnd { end_date_time, .. } => Some(*end_date_time),
            TimeInterval::StartDuration {
                start_date_time,
                duration,
            } => start_date_time.checked_add_signed(duration.to_duration()?),
            TimeInterval::Date { .. } => None,
        }
    }
}

/// When a measurement applies: an instant or an interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrame {
    DateTime(DateTime<FixedOffset>),
    TimeInterval(TimeInterval),
}

impl From<DateTime<FixedOffset>> for TimeFrame {
    fn from(value: DateTime<FixedOffset>) -> Self {
        TimeFrame::DateTime(value)
    }
}

impl From<TimeInterval> for TimeFrame {
    fn from(value: TimeInterval) -> Self {
        TimeFrame::TimeInterval(value)
    }
}
