use crate::{
    config::ResolveOptions,
    core::{Answer, DnsTransport, ErrorKind, QueryError, RecordKind},
    dns::classify::{classify, error_kind, Classification},
    internal_metrics,
};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Retry and backoff settings for single queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first for transient failures.
    pub retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub base_backoff: Duration,
    /// Time allowed for one transport call.
    pub query_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResolveOptions::default())
    }
}

impl From<&ResolveOptions> for RetryConfig {
    fn from(options: &ResolveOptions) -> Self {
        Self {
            retries: options.retries,
            base_backoff: options.backoff_base(),
            query_timeout: options.query_timeout(),
        }
    }
}

/// A query that could not be answered, either because the failure is
/// terminal or because the retries ran out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct TerminalFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl TerminalFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts,
        }
    }

    fn from_query_error(error: &QueryError, attempts: u32) -> Self {
        Self::new(error_kind(error), error.to_string(), attempts)
    }

    /// True when the record set is known not to exist, as opposed to the
    /// query having failed.
    pub fn is_negative_answer(&self) -> bool {
        matches!(self.kind, ErrorKind::NxDomain | ErrorKind::NoAnswer)
    }
}

/// The result of a query together with the attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
    pub outcome: Result<Answer, TerminalFailure>,
    pub attempts: u32,
}

/// Runs single queries with bounded retries and exponential backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Queries `name` for `kind`, retrying transient failures.
    pub async fn attempt(
        &self,
        transport: &dyn DnsTransport,
        name: &str,
        kind: RecordKind,
    ) -> Attempted {
        let retries = self.config.retries;
        let mut attempt = 0;

        loop {
            let attempts = attempt + 1;
            let result = match tokio::time::timeout(
                self.config.query_timeout,
                transport.query(name, kind),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(QueryError::Timeout),
            };

            let error = match result {
                Ok(answer) => {
                    internal_metrics::record_query(kind, "success");
                    return Attempted {
                        outcome: Ok(answer),
                        attempts,
                    };
                }
                Err(error) => error,
            };

            if classify(&error) == Classification::Terminal {
                internal_metrics::record_query(kind, error_kind(&error).as_str());
                trace!(name, %kind, error = %error, "Terminal answer, not retrying");
                return Attempted {
                    outcome: Err(TerminalFailure::from_query_error(&error, attempts)),
                    attempts,
                };
            }

            internal_metrics::record_query(kind, "failure");
            if attempt >= retries {
                debug!(name, %kind, attempts, error = %error, "Giving up on query");
                return Attempted {
                    outcome: Err(TerminalFailure::from_query_error(&error, attempts)),
                    attempts,
                };
            }

            let delay = with_jitter(backoff_delay(self.config.base_backoff, attempt));
            debug!(
                name,
                %kind,
                attempt = attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after backoff"
            );
            internal_metrics::record_retry(kind);
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// `base * 2^attempt_index`, saturating.
pub fn backoff_delay(base: Duration, attempt_index: u32) -> Duration {
    let factor = 2_u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Adds a random jitter in `[0, delay)`.
fn with_jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return delay;
    }
    let jitter = rand::rng().random_range(0..millis);
    delay.saturating_add(Duration::from_millis(jitter))
}
