//! # Internal Metrics
//!
//! Metric names and descriptions emitted through the `metrics` facade. No
//! recorder is installed by the library; embedders install their own, and
//! without one every call here is a no-op.

use crate::core::RecordKind;
use metrics::Unit;
use std::time::Duration;

/// Registers descriptions for all metrics with the global recorder.
pub fn describe() {
    metrics::describe_counter!("dns_queries_total", Unit::Count, "Total number of upstream DNS query attempts, labeled by record type and outcome.");
    metrics::describe_counter!("dns_query_retries_total", Unit::Count, "Total number of query retries after a transient failure.");
    metrics::describe_counter!("dns_cache_lookups_total", Unit::Count, "Batch cache lookups, labeled hit or miss.");
    metrics::describe_counter!("domains_resolved_total", Unit::Count, "Domains that finished resolution, labeled by status.");
    metrics::describe_histogram!("dns_resolution_duration_seconds", Unit::Seconds, "Time taken to resolve one domain, across all of its queries.");
}

/// Counts one query attempt.
pub fn record_query(kind: RecordKind, outcome: &'static str) {
    metrics::counter!("dns_queries_total", "record_type" => kind.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Counts one retry.
pub fn record_retry(kind: RecordKind) {
    metrics::counter!("dns_query_retries_total", "record_type" => kind.as_str()).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("dns_cache_lookups_total", "result" => result).increment(1);
}

/// Records a finished domain.
pub fn record_domain(status: &'static str, duration: Duration) {
    metrics::counter!("domains_resolved_total", "status" => status).increment(1);
    metrics::histogram!("dns_resolution_duration_seconds").record(duration.as_secs_f64());
}
