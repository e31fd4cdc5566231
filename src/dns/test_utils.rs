use crate::core::{Answer, DnsTransport, QueryError, RecordKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Key = (String, RecordKind);
type Response = Result<Answer, QueryError>;

/// TTL given to records added through the convenience helpers.
pub const FAKE_TTL: u32 = 300;

/// Nameserver reported by the fake transport.
pub const FAKE_NAMESERVER: &str = "192.0.2.53";

/// Scripted DNS transport for testing.
///
/// Every `(name, record type)` pair has a queue of one-shot responses, served
/// first, and a fixed response used once the queue is drained. Pairs with
/// nothing configured answer `NoAnswer`.
#[derive(Debug, Default)]
pub struct FakeDnsTransport {
    queued: Mutex<HashMap<Key, VecDeque<Response>>>,
    fixed: Mutex<HashMap<Key, Response>>,
    call_count: Mutex<HashMap<Key, u32>>,
    panics: Mutex<HashSet<Key>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDnsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every answer, keeping the query in flight meanwhile.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the fixed response for a pair.
    pub fn set_response(&self, name: &str, kind: RecordKind, response: Response) {
        self.fixed
            .lock()
            .unwrap()
            .insert((name.to_string(), kind), response);
    }

    /// Sets fixed records with the default TTL.
    pub fn set_records(&self, name: &str, kind: RecordKind, records: &[&str]) {
        self.set_response(name, kind, Ok(answer(records, Some(FAKE_TTL))));
    }

    /// Sets a fixed error.
    pub fn set_error(&self, name: &str, kind: RecordKind, error: QueryError) {
        self.set_response(name, kind, Err(error));
    }

    /// Queues a one-shot response ahead of the fixed one.
    pub fn push_response(&self, name: &str, kind: RecordKind, response: Response) {
        self.queued
            .lock()
            .unwrap()
            .entry((name.to_string(), kind))
            .or_default()
            .push_back(response);
    }

    /// Queues a one-shot error ahead of the fixed response.
    pub fn push_error(&self, name: &str, kind: RecordKind, error: QueryError) {
        self.push_response(name, kind, Err(error));
    }

    /// Sets a CNAME from `name` to `target`.
    pub fn set_cname(&self, name: &str, target: &str) {
        self.set_records(name, RecordKind::CNAME, &[target]);
    }

    /// Makes every query for a pair panic.
    pub fn set_panic(&self, name: &str, kind: RecordKind) {
        self.panics.lock().unwrap().insert((name.to_string(), kind));
    }

    /// Number of times a pair was queried.
    pub fn call_count(&self, name: &str, kind: RecordKind) -> u32 {
        self.call_count
            .lock()
            .unwrap()
            .get(&(name.to_string(), kind))
            .copied()
            .unwrap_or(0)
    }

    /// Number of queries issued across all pairs.
    pub fn total_calls(&self) -> u32 {
        self.call_count.lock().unwrap().values().sum()
    }

    /// Highest number of queries that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, key: &Key) -> Response {
        if let Some(response) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.fixed
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or(Err(QueryError::NoAnswer))
    }
}

/// Builds an answer from string records.
pub fn answer(records: &[&str], ttl: Option<u32>) -> Answer {
    Answer::new(records.iter().map(|r| r.to_string()).collect(), ttl)
}

#[async_trait]
impl DnsTransport for FakeDnsTransport {
    async fn query(&self, name: &str, kind: RecordKind) -> Result<Answer, QueryError> {
        let key = (name.to_string(), kind);
        *self.call_count.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
        let panics = self.panics.lock().unwrap().contains(&key);
        if panics {
            panic!("scripted panic for {} {}", name, kind);
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.next_response(&key);
        drop(guard);
        response
    }

    fn nameserver(&self) -> Option<String> {
        Some(FAKE_NAMESERVER.to_string())
    }
}

/// Decrements the in-flight gauge even when the query is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
