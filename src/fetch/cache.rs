// =============================================================================
// Signal Cache — TTL-bounded memoization of upstream values
// =============================================================================
//
// One entry per signal.  Entries are plain `Copy` values replaced wholesale on
// every successful fetch, so readers never observe a half-written entry.
//
// Expired entries are not evicted: when an upstream call fails, the most
// recent value (however old) is still the best fallback available.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Source of "now". Injected so that expiry can be tested deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached observation for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheEntry {
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip)]
    pub ttl: Duration,
}

impl CacheEntry {
    /// Fresh until `now - fetched_at` exceeds the TTL.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age <= self.ttl,
            // Entry stamped in the future (clock stepped back).
            Err(_) => true,
        }
    }
}

pub struct SignalCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SignalCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The entry for `signal` if it is still within its TTL.
    pub fn fresh(&self, signal: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(signal)
            .copied()
            .filter(|e| e.is_fresh(now))
    }

    /// The most recent entry for `signal`, fresh or not.
    pub fn latest(&self, signal: &str) -> Option<CacheEntry> {
        self.entries.read().get(signal).copied()
    }

    /// Store a freshly fetched value, replacing any previous entry.
    pub fn insert(&self, signal: impl Into<String>, value: f64) -> CacheEntry {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
            ttl: self.ttl,
        };
        self.entries.write().insert(signal.into(), entry);
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl std::fmt::Debug for SignalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Hand-driven clock for tests.
#[cfg(test)]
pub(crate) struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: parking_lot::Mutex::new(Utc::now()),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_fresh_until_ttl_elapses() {
        let clock = ManualClock::new();
        let cache = SignalCache::new(Duration::from_secs(300), clock.clone());
        cache.insert("fgi", 44.0);

        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.fresh("fgi").map(|e| e.value), Some(44.0));

        clock.advance(Duration::from_secs(1));
        assert!(cache.fresh("fgi").is_none());
        // Still available as a stale fallback.
        assert_eq!(cache.latest("fgi").map(|e| e.value), Some(44.0));
    }

    #[test]
    fn insert_replaces_previous_entry() {
        let clock = ManualClock::new();
        let cache = SignalCache::new(Duration::from_secs(60), clock.clone());
        cache.insert("cbbi", 55.0);
        clock.advance(Duration::from_secs(120));
        cache.insert("cbbi", 61.0);

        let e = cache.fresh("cbbi").unwrap();
        assert_eq!(e.value, 61.0);
        assert_eq!(e.fetched_at, clock.now());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_signal_has_no_entry() {
        let cache = SignalCache::new(Duration::from_secs(60), Arc::new(SystemClock));
        assert!(cache.fresh("dxy_mom_pct").is_none());
        assert!(cache.latest("dxy_mom_pct").is_none());
    }
}
