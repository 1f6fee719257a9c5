//! Query ranges and their reconciliation with provider time zones.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::ShimmerError;

/// A caller's date-time window. Left-closed, right-open when both bounds are
/// present; either bound may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRange {
    pub lower: Option<DateTime<FixedOffset>>,
    pub upper: Option<DateTime<FixedOffset>>,
}

impl QueryRange {
    pub fn new(
        lower: Option<DateTime<FixedOffset>>,
        upper: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self { lower, upper }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn at_least(lower: DateTime<FixedOffset>) -> Self {
        Self::new(Some(lower), None)
    }

    pub fn less_than(upper: DateTime<FixedOffset>) -> Self {
        Self::new(None, Some(upper))
    }

    pub fn closed_open(lower: DateTime<FixedOffset>, upper: DateTime<FixedOffset>) -> Self {
        Self::new(Some(lower), Some(upper))
    }

    pub fn has_lower_bound(&self) -> bool {
        self.lower.is_some()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.upper.is_some()
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Both bounds present and the lower one is after the upper one.
    pub fn is_reversed(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l > u)
    }

    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.lower.is_none_or(|l| instant >= l) && self.upper.is_none_or(|u| instant < u)
    }

    pub fn require_bounded(&self) -> Result<(), ShimmerError> {
        if self.is_unbounded() {
            return Err(ShimmerError::UnboundedRange);
        }
        Ok(())
    }
}

/// Rewrites a query range into the form a provider expects.
pub trait DateTimeRangeTransformer: Send + Sync {
    fn transform_range(&self, range: &QueryRange) -> QueryRange;
}

/// Re-expresses every present bound in one fixed offset. Instants are
/// unchanged; absent bounds stay absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedTimeZoneTransformer(pub FixedOffset);

impl DateTimeRangeTransformer for FixedTimeZoneTransformer {
    fn transform_range(&self, range: &QueryRange) -> QueryRange {
        let zone = self.0;
        QueryRange {
            lower: range.lower.map(|l| l.with_timezone(&zone)),
            upper: range.upper.map(|u| u.with_timezone(&zone)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentityTransformer;

impl DateTimeRangeTransformer for IdentityTransformer {
    fn transform_range(&self, range: &QueryRange) -> QueryRange {
        *range
    }
}
