#[path = "../helpers/mod.rs"]
mod helpers;

use batchdns::{
    core::RecordKind,
    dns::{test_utils::FakeDnsTransport, BatchResolver},
    ResolveOptions,
};
use std::{sync::Arc, time::Duration};

#[tokio::test(start_paused = true)]
async fn test_in_flight_queries_never_exceed_concurrency() {
    let concurrency_limit = 50;
    let total_domains = 500;

    let transport = Arc::new(FakeDnsTransport::new().with_delay(Duration::from_millis(20)));
    let domains: Vec<String> = (0..total_domains)
        .map(|i| format!("domain{}.example", i))
        .collect();
    for domain in &domains {
        transport.set_records(domain, RecordKind::A, &["192.0.2.1"]);
    }

    let options = ResolveOptions {
        concurrency: concurrency_limit,
        ..Default::default()
    };
    let resolver = BatchResolver::new(transport.clone(), options);
    let results = resolver.resolve(&domains).await.unwrap();

    assert_eq!(results.len(), total_domains);
    assert!(results.iter().all(|r| r.resolvable));
    let max_in_flight = transport.max_in_flight();
    assert!(
        max_in_flight <= concurrency_limit,
        "max in flight {} exceeded limit {}",
        max_in_flight,
        concurrency_limit
    );
    assert!(max_in_flight > 1, "domains were not resolved concurrently");
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_of_one_is_sequential() {
    let transport = Arc::new(FakeDnsTransport::new().with_delay(Duration::from_millis(5)));
    let options = ResolveOptions {
        concurrency: 1,
        ..Default::default()
    };
    let resolver = BatchResolver::new(transport.clone(), options);

    let results = resolver
        .resolve(&helpers::domains(&["a.example", "b.example", "c.example"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_domain_times_out_without_stalling_the_batch() {
    let transport = Arc::new(FakeDnsTransport::new().with_delay(Duration::from_millis(400)));
    transport.set_records("slow.example", RecordKind::A, &["192.0.2.9"]);

    let options = ResolveOptions {
        per_domain_timeout_ms: Some(1_000),
        ..Default::default()
    };
    let resolver = BatchResolver::new(transport, options);
    let results = resolver
        .resolve(&helpers::domains(&["slow.example", "other.example"]))
        .await
        .unwrap();

    for result in &results {
        let error = result.error.as_ref().unwrap();
        assert_eq!(error.kind, batchdns::ErrorKind::Timeout);
        assert!(result.ip_addresses.is_empty());
        assert!(!result.resolvable);
    }
}
