//! Counters emitted while normalizing. No recorder is installed here; hosts
//! that want them register an exporter of their choice.

use metrics::{Unit, counter, describe_counter};

pub const PAGES_FETCHED: &str = "shimmer_pages_fetched_total";
pub const DATA_POINTS_MAPPED: &str = "shimmer_data_points_mapped_total";
pub const FETCH_FAILURES: &str = "shimmer_fetch_failures_total";
pub const DOCUMENTS_SKIPPED: &str = "shimmer_documents_skipped_total";

/// Register descriptions with the installed recorder. Safe to call more than
/// once.
pub fn describe_metrics() {
    describe_counter!(PAGES_FETCHED, Unit::Count, "Provider pages fetched");
    describe_counter!(
        DATA_POINTS_MAPPED,
        Unit::Count,
        "Canonical data points produced"
    );
    describe_counter!(FETCH_FAILURES, Unit::Count, "Page fetches that failed");
    describe_counter!(
        DOCUMENTS_SKIPPED,
        Unit::Count,
        "Provider documents skipped by a mapper"
    );
}

pub(crate) fn page_fetched(provider: &str) {
    counter!(PAGES_FETCHED, "provider" => provider.to_string()).increment(1);
}

pub(crate) fn data_points_mapped(provider: &str, count: usize) {
    counter!(DATA_POINTS_MAPPED, "provider" => provider.to_string()).increment(count as u64);
}

pub(crate) fn fetch_failed(provider: &str) {
    counter!(FETCH_FAILURES, "provider" => provider.to_string()).increment(1);
}

pub(crate) fn document_skipped(source: &str) {
    counter!(DOCUMENTS_SKIPPED, "provider" => source.to_string()).increment(1);
}
