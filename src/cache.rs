//! Process-lifetime memoization of oracle results.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::geo::Coordinate;
use crate::oracle::{RouteResult, RouteSource};

/// Exact-match key: coordinates compare by bit pattern, never by proximity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    start: (u64, u64),
    end: (u64, u64),
    profile: String,
}

impl CacheKey {
    pub fn new(start: Coordinate, end: Coordinate, profile: &str) -> Self {
        Self {
            start: (start.lat.to_bits(), start.lon.to_bits()),
            end: (end.lat.to_bits(), end.lon.to_bits()),
            profile: profile.to_string(),
        }
    }
}

/// Unbounded route cache shared by every routing consumer.
///
/// Concurrent misses on the same key may both insert; the entries are
/// identical so last write wins.
#[derive(Debug, Default)]
pub struct RouteCache {
    entries: RwLock<HashMap<CacheKey, RouteResult>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<RouteResult> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, route: RouteResult) {
        self.entries.write().insert(key, route);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops degraded entries so the next lookup retries the live provider.
    /// Returns the number of entries removed.
    pub fn purge_fallback(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, route| route.source != RouteSource::Fallback);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
