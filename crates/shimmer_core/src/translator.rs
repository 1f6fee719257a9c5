//! Rendering query bounds into the date-time formats providers accept.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};

/// Wire format of a date-time query parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeFormat {
    #[default]
    Iso8601,
    UnixSeconds,
    UnixMillis,
    /// `YYYY-MM-DD`, the calendar day in the bound's own offset.
    LocalDate,
    /// `YYYY-MM-DDTHH:MM:SS` in the bound's own offset.
    LocalDateTime,
}

const LOCAL_DATE: &str = "%Y-%m-%d";
const LOCAL_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S";

impl DateTimeFormat {
    pub fn translate(&self, instant: &DateTime<FixedOffset>) -> String {
        match self {
            DateTimeFormat::Iso8601 => instant.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            DateTimeFormat::UnixSeconds => instant.timestamp().to_string(),
            DateTimeFormat::UnixMillis => instant.timestamp_millis().to_string(),
            DateTimeFormat::LocalDate => instant.format(LOCAL_DATE).to_string(),
            DateTimeFormat::LocalDateTime => instant.format(LOCAL_DATE_TIME).to_string(),
        }
    }

    /// Inverse of [`translate`](Self::translate). Values without an offset of
    /// their own are read in `offset`.
    pub fn parse(&self, value: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self {
            DateTimeFormat::Iso8601 => DateTime::parse_from_rfc3339(value).ok(),
            DateTimeFormat::UnixSeconds => {
                let secs = value.trim().parse::<i64>().ok()?;
                DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&offset))
            }
            DateTimeFormat::UnixMillis => {
                let millis = value.trim().parse::<i64>().ok()?;
                DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&offset))
            }
            DateTimeFormat::LocalDate => {
                let midnight = NaiveDate::parse_from_str(value, LOCAL_DATE)
                    .ok()?
                    .and_hms_opt(0, 0, 0)?;
                offset.from_local_datetime(&midnight).single()
            }
            DateTimeFormat::LocalDateTime => {
                let local = NaiveDateTime::parse_from_str(value, LOCAL_DATE_TIME).ok()?;
                offset.from_local_datetime(&local).single()
            }
        }
    }
}
