//! Live resolution against public nameservers.
//!
//! This test requires network access and is enabled with the `live-tests`
//! feature flag.
//!
//! `cargo test --test live_resolution --features live-tests -- --nocapture`
#![cfg(feature = "live-tests")]

use batchdns::{resolve_domains, DnssecStatus, ErrorKind, ResolveOptions};

#[tokio::test]
async fn test_live_resolution() {
    let options = ResolveOptions {
        nameservers: Some(vec!["1.1.1.1".to_string()]),
        timeout_ms: 5000,
        ..Default::default()
    };
    let domains = vec![
        "cloudflare.com".to_string(),
        "this-domain-does-not-exist-batchdns.invalid".to_string(),
    ];

    let results = resolve_domains(&domains, options).await.unwrap();
    println!("{}", serde_json::to_string_pretty(&results).unwrap());

    assert!(results[0].resolvable);
    assert!(!results[0].name_servers.is_empty());
    assert_eq!(results[0].dnssec, DnssecStatus::SignedPresent);
    assert_eq!(results[0].metrics.resolved_by_nameserver.as_deref(), Some("1.1.1.1"));

    assert!(!results[1].resolvable);
    assert_eq!(results[1].error.as_ref().unwrap().kind, ErrorKind::NxDomain);
}
