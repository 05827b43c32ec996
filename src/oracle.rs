//! Distance/duration oracle: cache, then live provider, then great-circle
//! fallback.
//!
//! The oracle never fails. A provider outage shows up only as
//! `RouteSource::Fallback` on the result.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheKey, RouteCache};
use crate::geo::{haversine_km, Coordinate};
use crate::osrm::{OsrmClient, OsrmConfig};
use crate::polyline::Polyline;
use crate::traits::{ProviderRoute, RouteProvider, RouteStep};

/// Effective city speed assumed by the fallback estimate.
pub const FALLBACK_SPEED_KMH: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Live,
    Fallback,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub geometry: Option<Polyline>,
    pub steps: Vec<RouteStep>,
    pub source: RouteSource,
    /// True when the numbers are a great-circle estimate, including cached
    /// copies of one.
    pub estimated: bool,
    pub profile: String,
}

impl RouteResult {
    fn from_provider(route: ProviderRoute, profile: &str) -> Self {
        Self {
            distance_km: route.distance_meters / 1000.0,
            duration_minutes: route.duration_seconds / 60.0,
            geometry: route.geometry,
            steps: route.steps,
            source: RouteSource::Live,
            estimated: false,
            profile: profile.to_string(),
        }
    }

    fn fallback(start: Coordinate, end: Coordinate, profile: &str, speed_kmh: f64) -> Self {
        let distance_km = haversine_km(start, end);
        Self {
            distance_km,
            duration_minutes: distance_km / speed_kmh * 60.0,
            geometry: None,
            steps: Vec::new(),
            source: RouteSource::Fallback,
            estimated: true,
            profile: profile.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleOptions {
    pub fallback_speed_kmh: f64,
    /// Whether degraded results are memoized like live ones.
    pub cache_fallback: bool,
}

impl Default for OracleOptions {
    fn default() -> Self {
        Self {
            fallback_speed_kmh: FALLBACK_SPEED_KMH,
            cache_fallback: true,
        }
    }
}

pub struct RouteOracle {
    provider: Option<Box<dyn RouteProvider>>,
    cache: RouteCache,
    options: OracleOptions,
    default_profile: String,
}

impl RouteOracle {
    pub fn new(provider: Box<dyn RouteProvider>, options: OracleOptions) -> Self {
        Self {
            provider: Some(provider),
            cache: RouteCache::new(),
            options,
            default_profile: "driving".to_string(),
        }
    }

    /// An oracle with no live provider: every miss is a fallback estimate.
    pub fn offline(options: OracleOptions) -> Self {
        Self {
            provider: None,
            cache: RouteCache::new(),
            options,
            default_profile: "driving".to_string(),
        }
    }

    /// An oracle backed by OSRM. If the HTTP client cannot be built the
    /// oracle runs offline rather than failing.
    pub fn osrm(config: OsrmConfig, options: OracleOptions) -> Self {
        let profile = config.profile.clone();
        let oracle = match OsrmClient::new(config) {
            Ok(client) => Self::new(Box::new(client), options),
            Err(err) => {
                warn!(error = %err, "could not build OSRM client, routing offline");
                Self::offline(options)
            }
        };
        oracle.with_default_profile(profile)
    }

    pub fn with_default_profile(mut self, profile: impl Into<String>) -> Self {
        self.default_profile = profile.into();
        self
    }

    pub fn default_profile(&self) -> &str {
        &self.default_profile
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Route with the default profile.
    pub fn route_default(&self, start: Coordinate, end: Coordinate) -> RouteResult {
        self.route(start, end, &self.default_profile)
    }

    pub fn route(&self, start: Coordinate, end: Coordinate, profile: &str) -> RouteResult {
        let key = CacheKey::new(start, end, profile);
        if let Some(mut hit) = self.cache.get(&key) {
            debug!(?start, ?end, profile, "route cache hit");
            hit.source = RouteSource::Cached;
            return hit;
        }

        let live = self.provider.as_ref().map(|provider| provider.route(start, end, profile));
        let result = match live {
            Some(Ok(route)) => RouteResult::from_provider(route, profile),
            Some(Err(err)) => {
                warn!(error = %err, ?start, ?end, "live routing failed, using fallback estimate");
                RouteResult::fallback(start, end, profile, self.options.fallback_speed_kmh)
            }
            None => RouteResult::fallback(start, end, profile, self.options.fallback_speed_kmh),
        };

        if result.source == RouteSource::Live || self.options.cache_fallback {
            self.cache.insert(key, result.clone());
        }
        result
    }
}
