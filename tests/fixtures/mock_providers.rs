//! Routing providers with scripted behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ev_fleet_planner::error::ProviderError;
use ev_fleet_planner::geo::{haversine_km, Coordinate};
use ev_fleet_planner::traits::{ProviderRoute, RouteProvider, RouteStep};

/// Every request fails as if the service were down.
pub struct FailingProvider;

impl RouteProvider for FailingProvider {
    fn route(&self, _start: Coordinate, _end: Coordinate, _profile: &str) -> Result<ProviderRoute, ProviderError> {
        Err(ProviderError::Status("Unavailable".to_string()))
    }
}

/// Road distance is a fixed multiple of the great-circle distance, at
/// 40 km/h. Counts requests through a shared counter.
pub struct CountingProvider {
    pub calls: Arc<AtomicUsize>,
    pub detour_factor: f64,
}

impl CountingProvider {
    pub fn new(detour_factor: f64) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
                detour_factor,
            },
            calls,
        )
    }
}

impl RouteProvider for CountingProvider {
    fn route(&self, start: Coordinate, end: Coordinate, _profile: &str) -> Result<ProviderRoute, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let meters = haversine_km(start, end) * self.detour_factor * 1000.0;
        Ok(ProviderRoute {
            distance_meters: meters,
            duration_seconds: meters / 1000.0 / 40.0 * 3600.0,
            geometry: None,
            steps: vec![
                RouteStep {
                    instruction: "depart".to_string(),
                    road_name: "Eastern Express Highway".to_string(),
                    distance_m: meters,
                    duration_s: 0.0,
                },
                RouteStep {
                    instruction: "arrive".to_string(),
                    road_name: String::new(),
                    distance_m: 0.0,
                    duration_s: 0.0,
                },
            ],
        })
    }
}

/// Fails on its first `failures` requests, then answers like
/// [`CountingProvider`] with no detour.
pub struct FlakyProvider {
    remaining_failures: AtomicUsize,
}

impl FlakyProvider {
    pub fn new(failures: usize) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

impl RouteProvider for FlakyProvider {
    fn route(&self, start: Coordinate, end: Coordinate, _profile: &str) -> Result<ProviderRoute, ProviderError> {
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::NoRoutes);
        }
        let meters = haversine_km(start, end) * 1000.0;
        Ok(ProviderRoute {
            distance_meters: meters,
            duration_seconds: meters / 10.0,
            geometry: None,
            steps: Vec::new(),
        })
    }
}
