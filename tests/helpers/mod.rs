#![allow(dead_code)]

pub mod test_metrics;

use batchdns::{
    dns::{test_utils::FakeDnsTransport, BatchResolver},
    ResolveOptions,
};
use std::sync::Arc;

/// Turns string literals into an owned domain list.
pub fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Creates a resolver over a shared fake transport so tests can inspect the
/// calls it received.
pub fn fake_resolver(options: ResolveOptions) -> (BatchResolver, Arc<FakeDnsTransport>) {
    let transport = Arc::new(FakeDnsTransport::new());
    let resolver = BatchResolver::new(transport.clone(), options);
    (resolver, transport)
}
