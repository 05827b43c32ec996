//! Route geometry as decoded coordinate sequences.
//!
//! OSRM returns GeoJSON line strings in `[lon, lat]` order; the swap to
//! `(lat, lon)` happens once, here, when a live route is parsed.

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinate};

/// A route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Builds a polyline from GeoJSON `[lon, lat]` positions.
    pub fn from_geojson(positions: &[[f64; 2]]) -> Self {
        Self {
            points: positions
                .iter()
                .map(|[lon, lat]| Coordinate { lat: *lat, lon: *lon })
                .collect(),
        }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of great-circle lengths of consecutive segments.
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geojson_swaps_axes() {
        let polyline = Polyline::from_geojson(&[[72.8777, 19.0760], [72.8656, 19.0896]]);
        assert_eq!(polyline.points()[0], Coordinate::from((19.0760, 72.8777)));
        assert_eq!(polyline.points()[1], Coordinate::from((19.0896, 72.8656)));
    }

    #[test]
    fn test_empty_polyline() {
        let polyline = Polyline::new(vec![]);
        assert!(polyline.is_empty());
        assert_eq!(polyline.length_km(), 0.0);
    }

    #[test]
    fn test_length_matches_single_segment() {
        let a = Coordinate::from((19.0760, 72.8777));
        let b = Coordinate::from((19.0896, 72.8656));
        let polyline = Polyline::new(vec![a, b]);
        assert_eq!(polyline.len(), 2);
        assert!((polyline.length_km() - haversine_km(a, b)).abs() < 1e-12);
    }
}
