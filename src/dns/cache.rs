//! Batch-scoped answer cache.
//!
//! Answers are keyed by `(name, record type)` and expire after the upstream
//! TTL, or the configured default when the upstream gave none. Failures are
//! never stored. Concurrent misses on the same key share one fetch.

use crate::{
    core::{Answer, RecordKind},
    dns::retry::TerminalFailure,
    internal_metrics,
};
use moka::{future::Cache, Expiry};
use std::future::Future;
use std::time::{Duration, Instant};

type CacheKey = (String, RecordKind);

#[derive(Debug, Clone)]
struct CachedAnswer {
    answer: Answer,
    ttl: Duration,
}

/// Expires each entry after its own TTL.
struct AnswerExpiry;

impl Expiry<CacheKey, CachedAnswer> for AnswerExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedAnswer,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// An answer together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub answer: Answer,
    /// True if the answer was already cached and `fetch` was not awaited.
    pub hit: bool,
}

/// A TTL cache that lives for exactly one batch.
pub struct BatchCache {
    cache: Cache<CacheKey, CachedAnswer>,
    default_ttl: Duration,
}

impl BatchCache {
    /// Creates a new `BatchCache`.
    ///
    /// # Arguments
    /// * `default_ttl` - Lifetime of answers that carry no TTL.
    /// * `max_capacity` - The maximum number of entries in the cache.
    pub fn new(default_ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(AnswerExpiry)
            .build();
        Self { cache, default_ttl }
    }

    /// Returns the cached answer for `(name, kind)`, or awaits `fetch` and
    /// caches its answer.
    ///
    /// Errors from `fetch` are passed through and leave the cache untouched.
    pub async fn get_or_fetch<F>(
        &self,
        name: &str,
        kind: RecordKind,
        fetch: F,
    ) -> Result<CacheLookup, TerminalFailure>
    where
        F: Future<Output = Result<Answer, TerminalFailure>>,
    {
        let default_ttl = self.default_ttl;
        let entry = self
            .cache
            .entry((name.to_string(), kind))
            .or_try_insert_with(async move {
                let answer = fetch.await?;
                let ttl = answer
                    .ttl
                    .map(|secs| Duration::from_secs(u64::from(secs)))
                    .unwrap_or(default_ttl);
                Ok::<_, TerminalFailure>(CachedAnswer { answer, ttl })
            })
            .await
            .map_err(|failure| (*failure).clone())?;

        let hit = !entry.is_fresh();
        internal_metrics::record_cache_lookup(hit);
        Ok(CacheLookup {
            answer: entry.into_value().answer,
            hit,
        })
    }

    /// Returns the cached, unexpired answer for `(name, kind)`.
    #[cfg(test)]
    async fn get(&self, name: &str, kind: RecordKind) -> Option<Answer> {
        self.cache
            .get(&(name.to_string(), kind))
            .await
            .map(|cached| cached.answer)
    }
}
