//! Per-domain resolution.
//!
//! A `DomainWorker` walks one input domain through a fixed sequence of
//! stages: follow the CNAME chain, query A and AAAA for the final name,
//! query NS for the input name, then probe for DNSSEC records. A terminal
//! failure in the CNAME or address stage ends the walk early. Every query
//! goes through the batch cache and the retry scheduler.

use crate::{
    config::{DnssecMode, ResolveOptions},
    core::{
        Answer, DnsTransport, DnssecStatus, DomainResult, ErrorInfo, ErrorKind, RecordKind,
        ResolutionMetrics, TraceContext, TraceInfo,
    },
    dns::{
        cache::BatchCache,
        retry::{RetryConfig, RetryScheduler, TerminalFailure},
        MAX_CNAME_DEPTH,
    },
    internal_metrics,
};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Effort spent by one worker, kept outside the state machine so it survives
/// a per-domain timeout.
#[derive(Debug, Default)]
struct Ledger {
    retries: u32,
    query_count: u32,
}

impl Ledger {
    fn record(&mut self, attempts: u32) {
        self.query_count += attempts;
        self.retries += attempts.saturating_sub(1);
    }
}

enum Stage {
    Start,
    FollowCname { name: String, chain: Vec<String> },
    QueryAddresses { name: String },
    QueryNameservers { name: String },
    QueryDnssec { name: String },
    Done,
    Errored(TerminalFailure),
}

/// What the stages have found so far.
#[derive(Debug, Default)]
struct Findings {
    ip_addresses: Vec<String>,
    name_servers: Vec<String>,
    dnssec: DnssecStatus,
    error: Option<TerminalFailure>,
    ns_failure: Option<TerminalFailure>,
}

/// Resolves single domains. Shared by every task of a batch.
pub struct DomainWorker {
    transport: Arc<dyn DnsTransport>,
    cache: Arc<BatchCache>,
    scheduler: RetryScheduler,
    dnssec_mode: DnssecMode,
    per_domain_timeout: Option<Duration>,
    trace: TraceContext,
}

impl DomainWorker {
    pub fn new(
        transport: Arc<dyn DnsTransport>,
        cache: Arc<BatchCache>,
        options: &ResolveOptions,
        trace: TraceContext,
    ) -> Self {
        Self {
            transport,
            cache,
            scheduler: RetryScheduler::new(RetryConfig::from(options)),
            dnssec_mode: options.dnssec_mode,
            per_domain_timeout: options.per_domain_timeout(),
            trace,
        }
    }

    /// Resolves `domain`, the input at position `index` of the batch.
    #[instrument(skip_all, fields(domain = %domain))]
    pub async fn run(&self, index: usize, domain: &str) -> DomainResult {
        let started = Instant::now();
        let mut ledger = Ledger::default();
        let name = canonicalize(domain);

        let findings = match self.per_domain_timeout {
            Some(limit) => {
                let finished = tokio::time::timeout(limit, self.drive(&name, &mut ledger)).await;
                finished.unwrap_or_else(|_| {
                    debug!(limit_ms = limit.as_millis() as u64, "Per-domain timeout fired");
                    Findings {
                        error: Some(TerminalFailure::new(
                            ErrorKind::Timeout,
                            format!(
                                "resolution of {} did not finish within {}ms",
                                name,
                                limit.as_millis()
                            ),
                            ledger.query_count.max(1),
                        )),
                        ..Default::default()
                    }
                })
            }
            None => self.drive(&name, &mut ledger).await,
        };

        let duration = started.elapsed();
        let result = self.assemble(index, domain, findings, &ledger, duration);
        let status = match &result.error {
            Some(error) => error.kind.as_str(),
            None if result.resolvable => "resolved",
            None => "unresolvable",
        };
        internal_metrics::record_domain(status, duration);
        debug!(
            status,
            addresses = result.ip_addresses.len(),
            retries = ledger.retries,
            queries = ledger.query_count,
            "Domain finished"
        );
        result
    }

    /// Builds the result reported when the task running `domain` died.
    pub fn panicked(&self, index: usize, domain: &str, reason: String) -> DomainResult {
        let findings = Findings {
            error: Some(TerminalFailure::new(ErrorKind::Panicked, reason, 1)),
            ..Default::default()
        };
        self.assemble(index, domain, findings, &Ledger::default(), Duration::ZERO)
    }

    async fn drive(&self, domain: &str, ledger: &mut Ledger) -> Findings {
        let mut findings = Findings::default();
        let mut stage = Stage::Start;

        loop {
            stage = match stage {
                Stage::Start => Stage::FollowCname {
                    name: domain.to_string(),
                    chain: vec![domain.to_string()],
                },
                Stage::FollowCname { name, mut chain } => {
                    match self.query(&name, RecordKind::CNAME, ledger).await {
                        Ok(answer) => match answer.records.first() {
                            Some(target) => {
                                let target = canonicalize(target);
                                if chain.contains(&target) {
                                    chain.push(target);
                                    Stage::Errored(TerminalFailure::new(
                                        ErrorKind::LoopDetected,
                                        format!("CNAME loop detected: {}", chain.join(" -> ")),
                                        1,
                                    ))
                                } else if chain.len() > MAX_CNAME_DEPTH {
                                    Stage::Errored(TerminalFailure::new(
                                        ErrorKind::LoopDetected,
                                        format!(
                                            "CNAME chain from {} exceeds {} hops",
                                            domain, MAX_CNAME_DEPTH
                                        ),
                                        1,
                                    ))
                                } else {
                                    trace!(from = %name, to = %target, "Following CNAME");
                                    chain.push(target.clone());
                                    Stage::FollowCname {
                                        name: target,
                                        chain,
                                    }
                                }
                            }
                            None => Stage::QueryAddresses { name },
                        },
                        Err(failure) if failure.kind == ErrorKind::NoAnswer => {
                            Stage::QueryAddresses { name }
                        }
                        Err(failure) => Stage::Errored(failure),
                    }
                }
                Stage::QueryAddresses { name } => {
                    let v4 = self.query(&name, RecordKind::A, ledger).await;
                    let v6 = self.query(&name, RecordKind::AAAA, ledger).await;

                    for answer in [&v4, &v6].into_iter().flatten() {
                        for address in &answer.records {
                            if !findings.ip_addresses.contains(address) {
                                findings.ip_addresses.push(address.clone());
                            }
                        }
                    }

                    if !findings.ip_addresses.is_empty() {
                        for failure in [&v4, &v6].into_iter().filter_map(|r| r.as_ref().err()) {
                            trace!(error = %failure, "Partial address failure recovered");
                        }
                        Stage::QueryNameservers { name }
                    } else {
                        match address_failure(v4, v6) {
                            Some(failure) => Stage::Errored(failure),
                            None => Stage::QueryNameservers { name },
                        }
                    }
                }
                Stage::QueryNameservers { name } => {
                    match self.query(domain, RecordKind::NS, ledger).await {
                        Ok(answer) => findings.name_servers = answer.records,
                        Err(failure) if failure.is_negative_answer() => {
                            trace!(error = %failure, "No NS records");
                        }
                        Err(failure) => {
                            debug!(error = %failure, "NS lookup failed");
                            findings.ns_failure = Some(failure);
                        }
                    }
                    Stage::QueryDnssec { name }
                }
                Stage::QueryDnssec { name } => {
                    findings.dnssec = match self.dnssec_mode {
                        DnssecMode::Presence => self.detect_dnssec(&name, domain, ledger).await,
                        DnssecMode::Disabled => DnssecStatus::Unknown,
                    };
                    Stage::Done
                }
                Stage::Done => break,
                Stage::Errored(failure) => {
                    debug!(error = %failure, "Resolution failed");
                    findings.ip_addresses.clear();
                    findings.error = Some(failure);
                    break;
                }
            };
        }

        // With nothing else found, a failed NS lookup is the best explanation.
        if findings.error.is_none() && findings.ip_addresses.is_empty() {
            findings.error = findings.ns_failure.take();
        }
        findings
    }

    /// Presence-only check: RRSIG on the resolved name, then DNSKEY on the
    /// input name's zone.
    async fn detect_dnssec(&self, name: &str, zone: &str, ledger: &mut Ledger) -> DnssecStatus {
        let rrsig = self.query(name, RecordKind::RRSIG, ledger).await;
        if has_records(&rrsig) {
            return DnssecStatus::SignedPresent;
        }
        let dnskey = self.query(zone, RecordKind::DNSKEY, ledger).await;
        if has_records(&dnskey) {
            return DnssecStatus::SignedPresent;
        }
        if is_verified_empty(&rrsig) && is_verified_empty(&dnskey) {
            DnssecStatus::Unsigned
        } else {
            DnssecStatus::Unknown
        }
    }

    /// Issues one query through the cache and the retry scheduler.
    async fn query(
        &self,
        name: &str,
        kind: RecordKind,
        ledger: &mut Ledger,
    ) -> Result<Answer, TerminalFailure> {
        let mut spent = 0;
        let lookup = self
            .cache
            .get_or_fetch(name, kind, async {
                let attempted = self
                    .scheduler
                    .attempt(self.transport.as_ref(), name, kind)
                    .await;
                spent = attempted.attempts;
                attempted.outcome
            })
            .await;
        ledger.record(spent);

        match &lookup {
            Ok(found) if found.hit => trace!(name, %kind, "Answer served from cache"),
            Ok(_) => {}
            Err(failure) => trace!(name, %kind, error = %failure, "Query failed"),
        }
        lookup.map(|found| found.answer)
    }

    fn assemble(
        &self,
        index: usize,
        domain: &str,
        findings: Findings,
        ledger: &Ledger,
        duration: Duration,
    ) -> DomainResult {
        let nameserver = self.transport.nameserver();
        let error = findings.error.map(|failure| ErrorInfo {
            kind: failure.kind,
            message: failure.message,
            attempts: failure.attempts,
            last_nameserver: nameserver.clone(),
        });
        let ip_addresses = if error.is_some() {
            Vec::new()
        } else {
            findings.ip_addresses
        };
        DomainResult {
            domain: domain.to_string(),
            resolvable: !ip_addresses.is_empty(),
            ip_addresses,
            name_servers: findings.name_servers,
            dnssec: findings.dnssec,
            error,
            metrics: ResolutionMetrics {
                duration_ms: duration.as_millis() as u64,
                retries: ledger.retries,
                query_count: ledger.query_count,
                resolved_by_nameserver: nameserver.clone(),
            },
            trace: TraceInfo {
                trace_id: self.trace.trace_id.clone(),
                span_id: span_id(self.trace.trace_id.as_deref(), index, domain),
                parent_span_id: self.trace.parent_span_id.clone(),
                nameserver,
            },
        }
    }
}

/// Picks the error to report when neither address family yielded anything.
///
/// NXDOMAIN wins, then a failure that outlived its retries, then NoAnswer.
/// Two verified empty answers are not an error.
fn address_failure(
    v4: Result<Answer, TerminalFailure>,
    v6: Result<Answer, TerminalFailure>,
) -> Option<TerminalFailure> {
    let failures: Vec<TerminalFailure> = [v4, v6].into_iter().filter_map(Result::err).collect();
    let position = failures
        .iter()
        .position(|f| f.kind == ErrorKind::NxDomain)
        .or_else(|| failures.iter().position(|f| !f.is_negative_answer()))
        .or_else(|| (!failures.is_empty()).then_some(0))?;
    failures.into_iter().nth(position)
}

fn has_records(result: &Result<Answer, TerminalFailure>) -> bool {
    matches!(result, Ok(answer) if !answer.is_empty())
}

fn is_verified_empty(result: &Result<Answer, TerminalFailure>) -> bool {
    match result {
        Ok(answer) => answer.is_empty(),
        Err(failure) => failure.is_negative_answer(),
    }
}

/// Lowercases, trims and drops the root label's trailing dot.
pub fn canonicalize(domain: &str) -> String {
    let trimmed = domain.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Span identifiers are derived, not random, so identical batches produce
/// identical results.
fn span_id(trace_id: Option<&str>, index: usize, domain: &str) -> String {
    let seed = format!("{}/{}/{}", trace_id.unwrap_or_default(), index, domain);
    let hash = blake3::hash(seed.as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}
