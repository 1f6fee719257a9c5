//! Turning provider documents into canonical data points.
//!
//! A mapper sees a batch of raw documents and yields any number of points.
//! Most providers are written one document (or one list entry) at a time and
//! lifted with [`per_document`] or [`per_item`], which skip a bad input
//! without discarding its siblings.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::datapoint::{
    AcquisitionProvenance, DataPoint, DataPointHeader, TimeFrame, TimeInterval,
};
use crate::error::NodeError;
use crate::node;
use crate::observability;

/// Values stamped on every header of one mapping pass.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingContext {
    pub source_name: String,
    pub created_at: DateTime<Utc>,
}

impl MappingContext {
    pub fn new(source_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            source_name: source_name.into(),
            created_at,
        }
    }

    pub fn now(source_name: impl Into<String>) -> Self {
        Self::new(source_name, Utc::now())
    }

    pub fn provenance(&self) -> AcquisitionProvenance {
        AcquisitionProvenance::new(self.source_name.as_str())
    }

    /// A header for `body_schema_id` carrying this context's source and time.
    pub fn header(&self, body_schema_id: impl Into<String>) -> DataPointHeader {
        DataPointHeader::new(body_schema_id, self.provenance(), self.created_at)
    }
}

pub trait DataPointMapper: Send + Sync {
    fn map(&self, inputs: &[Value], ctx: &MappingContext) -> Vec<DataPoint>;
}

impl<F> DataPointMapper for F
where
    F: Fn(&[Value], &MappingContext) -> Vec<DataPoint> + Send + Sync,
{
    fn map(&self, inputs: &[Value], ctx: &MappingContext) -> Vec<DataPoint> {
        self(inputs, ctx)
    }
}

/// Result of mapping one document: `Ok(None)` drops it quietly.
pub type MapOne = Result<Option<DataPoint>, NodeError>;

/// Batch mapper built from a single-document function.
pub struct PerDocument<F> {
    map_one: F,
}

pub fn per_document<F>(map_one: F) -> PerDocument<F>
where
    F: Fn(&Value, &MappingContext) -> MapOne + Send + Sync,
{
    PerDocument { map_one }
}

impl<F> DataPointMapper for PerDocument<F>
where
    F: Fn(&Value, &MappingContext) -> MapOne + Send + Sync,
{
    fn map(&self, inputs: &[Value], ctx: &MappingContext) -> Vec<DataPoint> {
        inputs
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| keep(&self.map_one, doc, ctx, index))
            .collect()
    }
}

/// Batch mapper over the array at `items_path` of every document.
pub struct PerItem<F> {
    items_path: String,
    map_one: F,
}

pub fn per_item<F>(items_path: impl Into<String>, map_one: F) -> PerItem<F>
where
    F: Fn(&Value, &MappingContext) -> MapOne + Send + Sync,
{
    PerItem {
        items_path: items_path.into(),
        map_one,
    }
}

impl<F> DataPointMapper for PerItem<F>
where
    F: Fn(&Value, &MappingContext) -> MapOne + Send + Sync,
{
    fn map(&self, inputs: &[Value], ctx: &MappingContext) -> Vec<DataPoint> {
        let mut points = Vec::new();
        for doc in inputs {
            let items = match node::require_node(doc, &self.items_path) {
                Ok(Value::Array(items)) => items,
                Ok(_) | Err(NodeError::TypeMismatch { .. }) => {
                    tracing::warn!(
                        path = %self.items_path,
                        source = %ctx.source_name,
                        "document item list isn't an array, skipping"
                    );
                    observability::document_skipped(&ctx.source_name);
                    continue;
                }
                Err(NodeError::MissingField { .. }) => {
                    tracing::debug!(path = %self.items_path, "document has no items");
                    continue;
                }
            };
            points.extend(
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| keep(&self.map_one, item, ctx, index)),
            );
        }
        points
    }
}

fn keep<F>(map_one: &F, doc: &Value, ctx: &MappingContext, index: usize) -> Option<DataPoint>
where
    F: Fn(&Value, &MappingContext) -> MapOne,
{
    match map_one(doc, ctx) {
        Ok(point) => point,
        Err(error) => {
            tracing::warn!(
                %error,
                index,
                source = %ctx.source_name,
                "skipping document that couldn't be mapped"
            );
            observability::document_skipped(&ctx.source_name);
            None
        }
    }
}

/// Effective time of a record with optional start and end fields: an
/// interval when both are present, an instant for start alone, otherwise
/// `None`.
pub fn effective_time_frame(doc: &Value, start_path: &str, end_path: &str) -> Option<TimeFrame> {
    let start = node::optional_date_time(doc, start_path)?;
    Some(match node::optional_date_time(doc, end_path) {
        Some(end) => TimeInterval::start_end(start, end).into(),
        None => start.into(),
    })
}
