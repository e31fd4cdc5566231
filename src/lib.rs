/// batchdns - concurrent batch DNS resolution
///
/// Resolves a list of domains to their addresses and nameservers, follows
/// CNAME chains, detects DNSSEC signing presence and reports one structured
/// result per input domain.
pub mod cli;
pub mod config;
pub mod core;
pub mod dns;
pub mod internal_metrics;

// Re-export core types for convenience
pub use crate::core::*;
pub use config::{DnssecMode, ResolveOptions};
pub use dns::{BatchResolver, DnsError};

/// Resolves `domains` with the system resolver, or `options.nameservers` when
/// given. Results are in input order.
pub async fn resolve_domains(
    domains: &[String],
    options: ResolveOptions,
) -> Result<Vec<DomainResult>, DnsError> {
    BatchResolver::from_options(options)?.resolve(domains).await
}
