pub mod cache;
pub mod classify;
pub mod manager;
pub mod resolver;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod worker;

use thiserror::Error;

pub use cache::BatchCache;
pub use classify::{classify, Classification};
pub use manager::{BatchResolver, ResultHook};
pub use resolver::HickoryDnsTransport;
pub use retry::{RetryConfig, RetryScheduler, TerminalFailure};
pub use worker::DomainWorker;
pub use crate::core::DnsTransport;

/// Longest CNAME chain followed before giving up.
pub const MAX_CNAME_DEPTH: usize = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DnsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to configure DNS transport: {0}")]
    Transport(String),
}
