//! Route search over the oracle: single routes, multi-stop tours and
//! alternative routes.

use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PlannerError;
use crate::geo::Coordinate;
use crate::oracle::{RouteOracle, RouteResult, RouteSource};

/// Largest stop count solved by exhaustive enumeration.
pub const EXACT_STOP_LIMIT: usize = 8;

/// Jitter applied to the midpoint waypoint of generated alternatives.
const WAYPOINT_JITTER_DEG: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    Exact,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub from: Coordinate,
    pub to: Coordinate,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub source: RouteSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiStopPlan {
    pub stops_order: Vec<Coordinate>,
    /// Positions in the input stop list, in visiting order.
    pub visit_order: Vec<usize>,
    pub segments: Vec<Segment>,
    pub total_distance_km: f64,
    pub total_duration_minutes: f64,
    pub method: SolveMethod,
    pub stops_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Primary,
    Alternative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeRoute {
    /// 1 for the primary route, 2.. for generated alternatives.
    pub route_id: usize,
    pub route_type: RouteType,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub waypoint: Option<Coordinate>,
    pub legs: Vec<RouteResult>,
}

/// Point-to-point route; a thin pass-through to the oracle.
pub fn single_route(
    oracle: &RouteOracle,
    start: Coordinate,
    end: Coordinate,
    profile: &str,
) -> RouteResult {
    oracle.route(start, end, profile)
}

/// Orders `stops` to minimise total distance from `start` to `end`
/// (`end` defaults to `start`).
///
/// Up to [`EXACT_STOP_LIMIT`] stops every ordering is tried; above that a
/// nearest-neighbour tour is built instead.
pub fn optimize_multi_stop(
    oracle: &RouteOracle,
    start: Coordinate,
    stops: &[Coordinate],
    end: Option<Coordinate>,
) -> Result<MultiStopPlan, PlannerError> {
    if stops.is_empty() {
        return Err(PlannerError::EmptyStops);
    }
    let end = end.unwrap_or(start);

    if stops.len() <= EXACT_STOP_LIMIT {
        info!(stops = stops.len(), "solving multi-stop route exactly");
        Ok(exact_tour(oracle, start, stops, end))
    } else {
        info!(stops = stops.len(), "solving multi-stop route with nearest neighbour");
        Ok(nearest_neighbor_tour(oracle, start, stops, end))
    }
}

/// Every leg an exact tour can use, fetched once through the oracle.
struct LegTable {
    n: usize,
    from_start: Vec<RouteResult>,
    /// Off-diagonal stop-to-stop legs, row by row.
    between: Vec<RouteResult>,
    to_end: Vec<RouteResult>,
}

impl LegTable {
    fn build(oracle: &RouteOracle, start: Coordinate, stops: &[Coordinate], end: Coordinate) -> Self {
        let from_start = stops.iter().map(|stop| oracle.route_default(start, *stop)).collect();
        let between = stops
            .iter()
            .enumerate()
            .flat_map(|(i, from)| {
                stops
                    .iter()
                    .enumerate()
                    .filter(move |(j, _)| *j != i)
                    .map(move |(_, to)| oracle.route_default(*from, *to))
            })
            .collect();
        let to_end = stops.iter().map(|stop| oracle.route_default(*stop, end)).collect();

        Self {
            n: stops.len(),
            from_start,
            between,
            to_end,
        }
    }

    fn between(&self, i: usize, j: usize) -> &RouteResult {
        debug_assert_ne!(i, j, "a tour never stays on a stop");
        let column = if j < i { j } else { j - 1 };
        &self.between[i * (self.n - 1) + column]
    }

    /// Tour length summed in travel order.
    fn tour_distance(&self, order: &[usize]) -> f64 {
        let mut total = self.from_start[order[0]].distance_km;
        for pair in order.windows(2) {
            total += self.between(pair[0], pair[1]).distance_km;
        }
        total + self.to_end[order[order.len() - 1]].distance_km
    }

    /// Best ordering beginning with `first`, ties to the lexicographically
    /// earliest ordering.
    fn best_with_first(&self, first: usize, n: usize) -> (f64, Vec<usize>) {
        let mut rest: Vec<usize> = (0..n).filter(|&i| i != first).collect();
        let mut order = Vec::with_capacity(n);

        let mut best_distance = f64::INFINITY;
        let mut best_order = Vec::new();
        loop {
            order.clear();
            order.push(first);
            order.extend_from_slice(&rest);

            let distance = self.tour_distance(&order);
            if distance < best_distance {
                best_distance = distance;
                best_order = order.clone();
            }

            if !next_permutation(&mut rest) {
                break;
            }
        }
        (best_distance, best_order)
    }
}

fn exact_tour(
    oracle: &RouteOracle,
    start: Coordinate,
    stops: &[Coordinate],
    end: Coordinate,
) -> MultiStopPlan {
    let legs = LegTable::build(oracle, start, stops, end);
    let n = stops.len();

    // Partitions come back in first-stop order, so folding them with a strict
    // comparison keeps the sequential first-encountered tie-break.
    let partitions: Vec<(f64, Vec<usize>)> = (0..n)
        .into_par_iter()
        .map(|first| legs.best_with_first(first, n))
        .collect();

    let mut best_distance = f64::INFINITY;
    let mut best_order: Vec<usize> = (0..n).collect();
    for (distance, order) in partitions {
        if distance < best_distance {
            best_distance = distance;
            best_order = order;
        }
    }

    let mut segments = Vec::with_capacity(n + 1);
    let mut previous: Option<usize> = None;
    for &index in &best_order {
        let (from, leg) = match previous {
            None => (start, &legs.from_start[index]),
            Some(prev) => (stops[prev], legs.between(prev, index)),
        };
        segments.push(segment(from, stops[index], leg));
        previous = Some(index);
    }
    let last = best_order[n - 1];
    segments.push(segment(stops[last], end, &legs.to_end[last]));

    plan(stops, best_order, segments, SolveMethod::Exact)
}

fn nearest_neighbor_tour(
    oracle: &RouteOracle,
    start: Coordinate,
    stops: &[Coordinate],
    end: Coordinate,
) -> MultiStopPlan {
    let mut unvisited: Vec<usize> = (0..stops.len()).collect();
    let mut order = Vec::with_capacity(stops.len());
    let mut segments = Vec::with_capacity(stops.len() + 1);
    let mut current = start;

    while !unvisited.is_empty() {
        let mut nearest: Option<(usize, RouteResult)> = None;
        for (position, &index) in unvisited.iter().enumerate() {
            let route = oracle.route_default(current, stops[index]);
            let closer = nearest
                .as_ref()
                .is_none_or(|(_, best)| route.distance_km < best.distance_km);
            if closer && route.distance_km.is_finite() {
                nearest = Some((position, route));
            }
        }

        let Some((position, route)) = nearest else {
            warn!(remaining = unvisited.len(), "no reachable stop left, ending tour early");
            break;
        };

        let index = unvisited.remove(position);
        segments.push(segment(current, stops[index], &route));
        order.push(index);
        current = stops[index];
    }

    let final_leg = oracle.route_default(current, end);
    segments.push(segment(current, end, &final_leg));

    plan(stops, order, segments, SolveMethod::Heuristic)
}

fn segment(from: Coordinate, to: Coordinate, route: &RouteResult) -> Segment {
    Segment {
        from,
        to,
        distance_km: route.distance_km,
        duration_minutes: route.duration_minutes,
        source: route.source,
    }
}

fn plan(
    stops: &[Coordinate],
    visit_order: Vec<usize>,
    segments: Vec<Segment>,
    method: SolveMethod,
) -> MultiStopPlan {
    let total_distance_km = segments.iter().map(|s| s.distance_km).sum();
    let total_duration_minutes = segments.iter().map(|s| s.duration_minutes).sum();
    MultiStopPlan {
        stops_order: visit_order.iter().map(|&i| stops[i]).collect(),
        visit_order,
        segments,
        total_distance_km,
        total_duration_minutes,
        method,
        stops_count: stops.len(),
    }
}

/// Rearranges `items` into the next lexicographic permutation.
/// Returns false (leaving `items` untouched) once the last one is reached.
fn next_permutation(items: &mut [usize]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let Some(pivot) = (0..items.len() - 1).rev().find(|&i| items[i] < items[i + 1]) else {
        return false;
    };
    let successor = (pivot + 1..items.len())
        .rev()
        .find(|&j| items[j] > items[pivot])
        .unwrap_or(pivot + 1);
    items.swap(pivot, successor);
    items[pivot + 1..].reverse();
    true
}

/// The direct route plus up to `count - 1` detours through a jittered
/// midpoint waypoint.
///
/// Detours whose waypoint falls outside valid coordinates are skipped, so
/// fewer than `count` routes may come back.
pub fn alternative_routes<R: Rng + ?Sized>(
    oracle: &RouteOracle,
    start: Coordinate,
    end: Coordinate,
    count: usize,
    rng: &mut R,
) -> Vec<AlternativeRoute> {
    let primary = oracle.route_default(start, end);
    let mut routes = vec![AlternativeRoute {
        route_id: 1,
        route_type: RouteType::Primary,
        distance_km: primary.distance_km,
        duration_minutes: primary.duration_minutes,
        waypoint: None,
        legs: vec![primary],
    }];

    for slot in 0..count.saturating_sub(1) {
        let jitter_lat = rng.gen_range(-WAYPOINT_JITTER_DEG..=WAYPOINT_JITTER_DEG);
        let jitter_lon = rng.gen_range(-WAYPOINT_JITTER_DEG..=WAYPOINT_JITTER_DEG);
        let candidate = start.midpoint(&end).offset(jitter_lat, jitter_lon);

        let waypoint = match Coordinate::new(candidate.lat, candidate.lon) {
            Ok(waypoint) => waypoint,
            Err(err) => {
                warn!(error = %err, slot, "skipping alternative route");
                continue;
            }
        };

        let first = oracle.route_default(start, waypoint);
        let second = oracle.route_default(waypoint, end);
        routes.push(AlternativeRoute {
            route_id: slot + 2,
            route_type: RouteType::Alternative,
            distance_km: first.distance_km + second.distance_km,
            duration_minutes: first.duration_minutes + second.duration_minutes,
            waypoint: Some(waypoint),
            legs: vec![first, second],
        });
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_permutation_lexicographic() {
        let mut items = vec![0, 1, 2];
        let mut seen = vec![items.clone()];
        while next_permutation(&mut items) {
            seen.push(items.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 1, 2],
                vec![0, 2, 1],
                vec![1, 0, 2],
                vec![1, 2, 0],
                vec![2, 0, 1],
                vec![2, 1, 0],
            ]
        );
    }

    #[test]
    fn test_leg_table_indexes_every_pair() {
        use crate::geo::haversine_km;
        use crate::oracle::OracleOptions;

        let oracle = RouteOracle::offline(OracleOptions::default());
        let start = Coordinate::new(19.0760, 72.8777).unwrap();
        let stops: Vec<Coordinate> = (0..4)
            .map(|i| Coordinate::new(19.0 + 0.02 * i as f64, 72.85 + 0.03 * (i * i) as f64).unwrap())
            .collect();
        let legs = LegTable::build(&oracle, start, &stops, start);

        assert_eq!(legs.between.len(), 12);
        for i in 0..stops.len() {
            for j in (0..stops.len()).filter(|&j| j != i) {
                let expected = haversine_km(stops[i], stops[j]);
                assert!((legs.between(i, j).distance_km - expected).abs() < 1e-9, "leg {} -> {}", i, j);
            }
        }
    }

    #[test]
    fn test_next_permutation_trivial() {
        let mut empty: Vec<usize> = vec![];
        assert!(!next_permutation(&mut empty));
        let mut single = vec![3];
        assert!(!next_permutation(&mut single));
    }
}
