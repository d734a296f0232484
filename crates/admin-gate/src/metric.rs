use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// What happened to a request at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Login succeeded and a token was issued.
    Granted,
    /// Wrong password or invalid token.
    Rejected,
    RateLimited,
    BadRequest,
    Error,
    /// Authorized and proxied; carries the upstream status.
    Forwarded(u16),
}

/// In-memory per-minute outcome counts keyed by endpoint.
#[derive(Default)]
pub struct AuthMetrics {
    counts: Mutex<HashMap<String, HashMap<u64, HashMap<Outcome, u64>>>>,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome using the current wall-clock time.
    pub fn record(&self, endpoint: &str, outcome: Outcome) {
        self.record_at(endpoint, outcome, SystemTime::now());
    }

    pub fn record_at(&self, endpoint: &str, outcome: Outcome, at: SystemTime) {
        let minute = Self::minute_bucket(at);
        let mut guard = self.counts.lock().expect("metrics store poisoned");
        *guard
            .entry(endpoint.to_string())
            .or_default()
            .entry(minute)
            .or_default()
            .entry(outcome)
            .or_insert(0) += 1;
    }

    /// Per-minute counts for an endpoint. Empty when nothing was recorded.
    pub fn snapshot(&self, endpoint: &str) -> HashMap<u64, HashMap<Outcome, u64>> {
        self.counts
            .lock()
            .expect("metrics store poisoned")
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    /// Counts for an endpoint summed over all minutes.
    pub fn totals(&self, endpoint: &str) -> HashMap<Outcome, u64> {
        let mut totals = HashMap::new();
        for minute in self.snapshot(endpoint).values() {
            for (outcome, count) in minute {
                *totals.entry(*outcome).or_insert(0) += *count;
            }
        }
        totals
    }

    fn minute_bucket(at: SystemTime) -> u64 {
        at.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            / 60
    }
}
