//! batchdns - resolve a batch of domains and print the results as JSON.

use anyhow::{Context, Result};
use batchdns::{
    cli::Cli,
    config::Config,
    core::TraceContext,
    dns::{BatchResolver, HickoryDnsTransport},
    internal_metrics,
};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).context("failed to load configuration")?;

    // Logs go to stderr; stdout carries only the results.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    internal_metrics::describe();

    let domains = cli.collect_domains()?;

    info!("-------------------- Configuration --------------------");
    info!("Domains: {}", domains.len());
    info!("Concurrency: {}", config.dns.concurrency);
    info!("Query Timeout: {}ms", config.dns.timeout_ms);
    if let Some(timeout) = config.dns.per_domain_timeout_ms {
        info!("Per-Domain Timeout: {}ms", timeout);
    }
    info!("Retries: {}", config.dns.retries);
    info!("Backoff Base: {}ms", config.dns.backoff_base_ms);
    info!("Default Cache TTL: {}s", config.dns.cache_ttl_default_secs);
    info!("DNSSEC Mode: {:?}", config.dns.dnssec_mode);

    let transport = HickoryDnsTransport::from_options(&config.dns)?;
    let ns_str: Vec<String> = transport
        .nameservers()
        .iter()
        .map(|s| s.to_string())
        .collect();
    if config.dns.nameservers.is_some() {
        info!("DNS Resolver: {}", ns_str.join(", "));
    } else {
        info!("DNS Resolver: System Default ({})", ns_str.join(", "));
    }
    info!("-------------------------------------------------------");

    let resolver = BatchResolver::new(Arc::new(transport), config.dns.clone())
        .with_trace_context(TraceContext {
            trace_id: cli.trace_id.clone(),
            parent_span_id: cli.parent_span_id.clone(),
        });
    let results = resolver.resolve(&domains).await?;

    let output = if config.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", output);
    Ok(())
}
