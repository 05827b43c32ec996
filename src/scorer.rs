//! Multi-criteria ranking of candidate charging stations.
//!
//! Every component score is a cost in [0, 1] (0 is best), so the ranking is
//! ascending by weighted total.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlannerError;
use crate::geo::Coordinate;
use crate::oracle::{RouteOracle, RouteResult};

/// How many runners-up are reported after the best station.
pub const MAX_ALTERNATIVES: usize = 4;

const DISTANCE_NORM_KM: f64 = 50.0;
const QUEUE_NORM: f64 = 20.0;
const PRICE_NORM_PER_KWH: f64 = 10.0;
const MAX_RATING: f64 = 5.0;

fn default_price() -> f64 {
    5.0
}

fn default_rating() -> f64 {
    3.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationCandidate {
    pub station_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub coordinates: Coordinate,
    #[serde(default)]
    pub queue_length: u32,
    #[serde(default = "default_price")]
    pub price_per_kwh: f64,
    #[serde(default = "default_rating")]
    pub rating: f64,
}

/// Criterion weights. They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub distance: f64,
    pub queue: f64,
    pub price: f64,
    pub rating: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.4,
            queue: 0.3,
            price: 0.2,
            rating: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScores {
    pub distance: f64,
    pub queue: f64,
    pub price: f64,
    pub rating: f64,
}

impl ComponentScores {
    fn compute(station: &StationCandidate, route: &RouteResult) -> Self {
        Self {
            distance: (route.distance_km / DISTANCE_NORM_KM).min(1.0),
            queue: (f64::from(station.queue_length) / QUEUE_NORM).min(1.0),
            price: (station.price_per_kwh / PRICE_NORM_PER_KWH).min(1.0),
            rating: 1.0 - station.rating / MAX_RATING,
        }
    }

    fn weighted(&self, weights: &ScoringWeights) -> f64 {
        self.distance * weights.distance
            + self.queue * weights.queue
            + self.price * weights.price
            + self.rating * weights.rating
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredStation {
    pub station: StationCandidate,
    pub route: RouteResult,
    pub scores: ComponentScores,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRanking {
    pub best: ScoredStation,
    pub alternatives: Vec<ScoredStation>,
    pub count: usize,
}

/// Ranks `candidates` for a driver at `user_location`.
///
/// Candidates with an invalid location are skipped; ties keep input order.
pub fn rank_stations(
    oracle: &RouteOracle,
    user_location: Coordinate,
    candidates: &[StationCandidate],
    weights: &ScoringWeights,
) -> Result<StationRanking, PlannerError> {
    if candidates.is_empty() {
        return Err(PlannerError::NoStationsProvided);
    }

    let mut scored: Vec<ScoredStation> = candidates
        .iter()
        .filter_map(|station| {
            if let Err(err) = station.coordinates.validate() {
                warn!(station_id = %station.station_id, error = %err, "skipping station");
                return None;
            }
            let route = oracle.route_default(user_location, station.coordinates);
            let scores = ComponentScores::compute(station, &route);
            let total_score = scores.weighted(weights);
            debug!(station_id = %station.station_id, total_score, "scored station");
            Some(ScoredStation {
                station: station.clone(),
                route,
                scores,
                total_score,
            })
        })
        .collect();

    if scored.is_empty() {
        return Err(PlannerError::NoValidStations);
    }

    // Stable sort: equal scores keep input order.
    scored.sort_by(|a, b| a.total_score.total_cmp(&b.total_score));

    let count = scored.len();
    let mut ranked = scored.into_iter();
    let best = ranked.next().ok_or(PlannerError::NoValidStations)?;
    let alternatives = ranked.take(MAX_ALTERNATIVES).collect();

    Ok(StationRanking {
        best,
        alternatives,
        count,
    })
}
