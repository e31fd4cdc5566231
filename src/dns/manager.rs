use crate::{
    config::ResolveOptions,
    core::{DnsTransport, DomainResult, TraceContext},
    dns::{cache::BatchCache, resolver::HickoryDnsTransport, worker::DomainWorker, DnsError},
};
use futures::stream::{self, StreamExt};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Callback invoked once for every finished domain.
pub type ResultHook = Arc<dyn Fn(&DomainResult) + Send + Sync>;

/// Resolves batches of domains with bounded concurrency.
///
/// Every call to [`BatchResolver::resolve`] gets a fresh cache; nothing is
/// shared between batches.
pub struct BatchResolver {
    transport: Arc<dyn DnsTransport>,
    options: ResolveOptions,
    trace: TraceContext,
    hook: Option<ResultHook>,
}

impl BatchResolver {
    /// Creates a resolver that sends its queries through `transport`.
    pub fn new(transport: Arc<dyn DnsTransport>, options: ResolveOptions) -> Self {
        Self {
            transport,
            options,
            trace: TraceContext::default(),
            hook: None,
        }
    }

    /// Creates a resolver backed by hickory, honouring `options.nameservers`.
    pub fn from_options(options: ResolveOptions) -> Result<Self, DnsError> {
        let transport = HickoryDnsTransport::from_options(&options)?;
        Ok(Self::new(Arc::new(transport), options))
    }

    /// Copies the caller's trace identifiers into every result.
    pub fn with_trace_context(mut self, trace: TraceContext) -> Self {
        self.trace = trace;
        self
    }

    /// Installs a callback that observes each result as it completes.
    pub fn with_hook(mut self, hook: ResultHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolves `domains`, returning exactly one result per input in input
    /// order. Per-domain DNS failures are reported inside the results; only
    /// malformed input is an error.
    #[instrument(skip_all, fields(domains = domains.len()))]
    pub async fn resolve(&self, domains: &[String]) -> Result<Vec<DomainResult>, DnsError> {
        self.validate(domains)?;

        let started = Instant::now();
        let concurrency = self.options.concurrency;
        info!(concurrency, "Starting batch resolution");

        let cache = Arc::new(BatchCache::new(
            self.options.cache_ttl_default(),
            self.options.cache_capacity,
        ));
        let worker = Arc::new(DomainWorker::new(
            self.transport.clone(),
            cache,
            &self.options,
            self.trace.clone(),
        ));

        let mut slots: Vec<Option<DomainResult>> = vec![None; domains.len()];
        // Tasks are spawned lazily, so at most `concurrency` exist at once.
        let mut completions = stream::iter(domains.iter().cloned().enumerate())
            .map(|(index, domain)| {
                let worker = worker.clone();
                async move {
                    let task = tokio::spawn({
                        let worker = worker.clone();
                        let domain = domain.clone();
                        async move { worker.run(index, &domain).await }
                    });
                    let result = match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(domain = %domain, error = %e, "Resolution task failed");
                            worker.panicked(index, &domain, e.to_string())
                        }
                    };
                    (index, result)
                }
            })
            .buffer_unordered(concurrency);

        let mut failed = 0;
        while let Some((index, result)) = completions.next().await {
            if result.error.is_some() {
                failed += 1;
            }
            if let Some(hook) = &self.hook {
                if catch_unwind(AssertUnwindSafe(|| hook(&result))).is_err() {
                    warn!(domain = %result.domain, "Result hook panicked");
                }
            }
            slots[index] = Some(result);
        }

        let results: Vec<DomainResult> = slots.into_iter().flatten().collect();
        info!(
            resolved = results.iter().filter(|r| r.resolvable).count(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch resolution finished"
        );
        Ok(results)
    }

    fn validate(&self, domains: &[String]) -> Result<(), DnsError> {
        if domains.is_empty() {
            return Err(DnsError::InvalidInput("domain list is empty".to_string()));
        }
        let blank = domains
            .iter()
            .position(|d| d.trim().trim_end_matches('.').is_empty());
        if let Some(position) = blank {
            return Err(DnsError::InvalidInput(format!(
                "domain at position {} is blank",
                position
            )));
        }
        if self.options.concurrency == 0 {
            return Err(DnsError::InvalidInput(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
