//! Mumbai-area locations for realistic test fixtures.
//!
//! Coordinates of well-known landmarks, rounded to four decimals.

use ev_fleet_planner::geo::Coordinate;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, lat, lon }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::from((self.lat, self.lon))
    }
}

// ============================================================================
// Depots (trip starts)
// ============================================================================

pub const DEPOTS: &[Location] = &[
    Location::new("Chhatrapati Shivaji Terminus", 18.9398, 72.8355),
    Location::new("Bandra Kurla Complex", 19.0660, 72.8680),
    Location::new("Andheri Station", 19.1197, 72.8464),
];

// ============================================================================
// Charging sites
// ============================================================================

pub const CHARGING_SITES: &[Location] = &[
    Location::new("Gateway of India", 18.9220, 72.8347),
    Location::new("Colaba Causeway", 18.9067, 72.8147),
    Location::new("Lower Parel", 18.9945, 72.8245),
    Location::new("Dadar", 19.0178, 72.8478),
    Location::new("Bandra Reclamation", 19.0380, 72.8170),
    Location::new("Chembur", 19.0522, 72.9005),
    Location::new("Vashi", 19.0771, 72.9986),
    Location::new("Juhu Beach", 19.0988, 72.8267),
    Location::new("Powai Lake", 19.1273, 72.9050),
    Location::new("Goregaon East", 19.1735, 72.8600),
    Location::new("Thane Station", 19.1860, 72.9750),
];

pub fn depot() -> Coordinate {
    DEPOTS[0].coordinate()
}

/// The first `n` charging sites.
pub fn sites(n: usize) -> Vec<Coordinate> {
    CHARGING_SITES.iter().take(n).map(Location::coordinate).collect()
}
