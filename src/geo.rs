//! Great-circle geometry for station and vehicle coordinates.
//!
//! Less accurate than a road network (ignores roads) but always available,
//! which is why the route oracle falls back to it.

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Builds a validated coordinate.
    ///
    /// Latitude must lie in [-90, 90] and longitude in [-180, 180]; NaN is
    /// rejected by the same range checks.
    pub fn new(lat: f64, lon: f64) -> Result<Self, PlannerError> {
        let coordinate = Self { lat, lon };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Checks the range invariants of a coordinate built without `new`
    /// (e.g. deserialized from a request payload).
    pub fn validate(&self) -> Result<(), PlannerError> {
        if (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon) {
            Ok(())
        } else {
            Err(PlannerError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(*self, *other)
    }

    /// Shifts the coordinate by the given offsets in degrees.
    pub fn offset(&self, dlat: f64, dlon: f64) -> Self {
        Self {
            lat: self.lat + dlat,
            lon: self.lon + dlon,
        }
    }

    /// Geographic midpoint in coordinate space (not along the great circle).
    pub fn midpoint(&self, other: &Coordinate) -> Self {
        Self {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}
