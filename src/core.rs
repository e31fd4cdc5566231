//! Core domain types and service traits for batchdns
//!
//! This module defines the per-domain result shape returned to callers and
//! the transport contract every DNS query goes through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of resolving a single input domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainResult {
    /// The domain exactly as it was supplied by the caller.
    pub domain: String,
    /// True iff at least one A or AAAA record was obtained.
    pub resolvable: bool,
    /// IPv4 addresses first, then IPv6, in discovery order without duplicates.
    pub ip_addresses: Vec<String>,
    /// Authoritative nameservers of the input domain.
    pub name_servers: Vec<String>,
    /// DNSSEC presence heuristic.
    pub dnssec: DnssecStatus,
    /// The terminal failure for this domain, if any.
    pub error: Option<ErrorInfo>,
    pub metrics: ResolutionMetrics,
    pub trace: TraceInfo,
}

impl DomainResult {
    /// Creates an empty, unresolved result for `domain`.
    pub fn unresolved(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            resolvable: false,
            ip_addresses: Vec::new(),
            name_servers: Vec::new(),
            dnssec: DnssecStatus::Unknown,
            error: None,
            metrics: ResolutionMetrics::default(),
            trace: TraceInfo::default(),
        }
    }
}

/// Result of the DNSSEC presence check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DnssecStatus {
    /// At least one RRSIG or DNSKEY record was returned.
    SignedPresent,
    /// Both queries completed and neither returned a record.
    Unsigned,
    /// The check could not be completed.
    #[default]
    Unknown,
}

/// A structured per-domain error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    /// Attempts spent on the query that produced this error.
    pub attempts: u32,
    pub last_nameserver: Option<String>,
}

/// The closed set of error types reported in `ErrorInfo`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[serde(rename = "NXDOMAIN")]
    NxDomain,
    NoAnswer,
    Timeout,
    NoNameservers,
    LoopDetected,
    ResolutionError,
    Panicked,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NxDomain => "NXDOMAIN",
            ErrorKind::NoAnswer => "NoAnswer",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::NoNameservers => "NoNameservers",
            ErrorKind::LoopDetected => "LoopDetected",
            ErrorKind::ResolutionError => "ResolutionError",
            ErrorKind::Panicked => "Panicked",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and effort accounting for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResolutionMetrics {
    pub duration_ms: u64,
    /// Retries consumed across every query issued for this domain.
    pub retries: u32,
    /// Upstream query attempts issued; answers served from cache cost nothing.
    pub query_count: u32,
    pub resolved_by_nameserver: Option<String>,
}

/// Trace identifiers attached to every result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TraceInfo {
    pub trace_id: Option<String>,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub nameserver: Option<String>,
}

/// Caller-supplied trace context propagated into every result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TraceContext {
    pub trace_id: Option<String>,
    pub parent_span_id: Option<String>,
}

// =============================================================================
// Query-level types
// =============================================================================

/// The record types the resolver issues queries for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordKind {
    A,
    AAAA,
    CNAME,
    NS,
    RRSIG,
    DNSKEY,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::AAAA => "AAAA",
            RecordKind::CNAME => "CNAME",
            RecordKind::NS => "NS",
            RecordKind::RRSIG => "RRSIG",
            RecordKind::DNSKEY => "DNSKEY",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful answer to a single query.
///
/// An empty `records` list is a verified empty answer, which is a success.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Answer {
    /// Record data rendered as text: addresses for A/AAAA, host names without
    /// the trailing dot for CNAME/NS, presentation format otherwise.
    pub records: Vec<String>,
    /// The smallest TTL in the answer set, if the upstream supplied one.
    pub ttl: Option<u32>,
}

impl Answer {
    pub fn new(records: Vec<String>, ttl: Option<u32>) -> Self {
        Self { records, ttl }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A failed query, as reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("the DNS query name does not exist")]
    NxDomain,
    #[error("the DNS response does not contain an answer to the question")]
    NoAnswer,
    #[error("the DNS operation timed out")]
    Timeout,
    #[error("all nameservers failed to answer the query: {0}")]
    NoNameservers(String),
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Service Traits
// =============================================================================

/// Issues single DNS queries against upstream nameservers.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Queries `name` for records of type `kind`.
    ///
    /// # Arguments
    /// * `name` - A canonical domain name without the trailing dot
    /// * `kind` - The record type to ask for
    ///
    /// # Returns
    /// * `Ok(Answer)` with the matching records, possibly none
    /// * `Err(QueryError)` when the name does not exist, has no data of this
    ///   type, or the upstream could not be reached
    async fn query(&self, name: &str, kind: RecordKind) -> Result<Answer, QueryError>;

    /// The nameserver queries are sent to, for reporting purposes.
    fn nameserver(&self) -> Option<String> {
        None
    }
}
