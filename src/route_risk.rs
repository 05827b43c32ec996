//! Weighted risk score of a planned route from distance, weather, time of
//! day and route complexity, plus simulated traffic along a path.

use chrono::{NaiveDateTime, Timelike};
use rand::Rng;
use serde::Serialize;

use crate::geo::{haversine_km, Coordinate};
use crate::oracle::RouteResult;
use crate::risk::RiskLevel;

const DISTANCE_WEIGHT: f64 = 0.2;
const WEATHER_WEIGHT: f64 = 0.3;
const TIME_WEIGHT: f64 = 0.3;
const COMPLEXITY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskFactors {
    pub distance: f64,
    pub weather: f64,
    pub time_of_day: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRiskAssessment {
    /// Rounded to three decimals.
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: RiskFactors,
    pub recommendations: Vec<String>,
}

/// Risk of the reported weather condition; unknown conditions count as 0.2.
pub fn weather_risk(condition: &str) -> f64 {
    match condition {
        "clear" => 0.1,
        "cloudy" => 0.2,
        "light_rain" => 0.4,
        "heavy_rain" => 0.7,
        "storm" => 0.9,
        "fog" => 0.6,
        _ => 0.2,
    }
}

/// Night (22:00-05:59) and rush hours (06-09, 17-20) are riskier.
pub fn time_of_day_risk(hour: u32) -> f64 {
    if hour >= 22 || hour <= 5 {
        0.3
    } else if (6..=9).contains(&hour) || (17..=20).contains(&hour) {
        0.4
    } else {
        0.1
    }
}

/// Assesses `route` at local hour `hour` (0-23). A missing weather report
/// counts as clear.
pub fn assess(route: &RouteResult, weather: Option<&str>, hour: u32) -> RouteRiskAssessment {
    let factors = RiskFactors {
        distance: (route.distance_km / 100.0).min(1.0),
        weather: weather_risk(weather.unwrap_or("clear")),
        time_of_day: time_of_day_risk(hour),
        complexity: (route.steps.len() as f64 / 50.0).min(1.0),
    };

    let overall = factors.distance * DISTANCE_WEIGHT
        + factors.weather * WEATHER_WEIGHT
        + factors.time_of_day * TIME_WEIGHT
        + factors.complexity * COMPLEXITY_WEIGHT;

    let risk_level = if overall <= 0.3 {
        RiskLevel::Low
    } else if overall <= 0.6 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    RouteRiskAssessment {
        overall_risk_score: (overall * 1000.0).round() / 1000.0,
        risk_level,
        risk_factors: factors,
        recommendations: recommendations(risk_level, &factors),
    }
}

/// [`assess`] at the current local hour.
pub fn assess_now(route: &RouteResult, weather: Option<&str>) -> RouteRiskAssessment {
    assess(route, weather, chrono::Local::now().hour())
}

fn recommendations(level: RiskLevel, factors: &RiskFactors) -> Vec<String> {
    let mut out = Vec::new();

    if level == RiskLevel::High {
        out.push("Consider postponing the trip if possible");
    }
    if factors.weather > 0.5 {
        out.push("Drive carefully due to adverse weather conditions");
        out.push("Increase following distance and reduce speed");
    }
    if factors.time_of_day > 0.25 {
        out.push("Be extra cautious during rush hour or night driving");
    }
    if factors.distance > 0.5 {
        out.push("Plan rest stops for long journey");
        out.push("Ensure vehicle is in good condition");
    }
    if factors.complexity > 0.5 {
        out.push("Use GPS navigation for complex route");
        out.push("Review route before starting");
    }

    out.into_iter().map(String::from).collect()
}

// ============================================================================
// Traffic
// ============================================================================

/// Average speed the traffic delay is measured against.
const FREE_FLOW_SPEED_KMH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

impl TrafficLevel {
    fn score(self) -> f64 {
        match self {
            TrafficLevel::Light => 1.0,
            TrafficLevel::Moderate => 2.0,
            TrafficLevel::Heavy => 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSegment {
    pub start: Coordinate,
    pub end: Coordinate,
    pub distance_km: f64,
    pub traffic_level: TrafficLevel,
    /// Travel time multiplier, at least 1.
    pub delay_factor: f64,
    pub estimated_delay_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficConditions {
    pub segments: Vec<TrafficSegment>,
    pub total_delay_minutes: f64,
    pub overall_traffic_level: TrafficLevel,
    pub timestamp: NaiveDateTime,
}

/// Samples a traffic level and delay factor for one segment at `hour`.
///
/// Peak hours (8, 9, 17-19) are mostly heavy with factors in [1.3, 2.0);
/// shoulder hours (7, 10, 16, 20) light or moderate in [1.1, 1.4); every
/// other hour is light in [1.0, 1.2).
fn sample_traffic<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> (TrafficLevel, f64) {
    match hour {
        8 | 9 | 17..=19 => {
            let level = if rng.gen_bool(0.7) {
                TrafficLevel::Heavy
            } else {
                TrafficLevel::Moderate
            };
            (level, rng.gen_range(1.3..2.0))
        }
        7 | 10 | 16 | 20 => {
            let level = if rng.gen_bool(0.6) {
                TrafficLevel::Moderate
            } else {
                TrafficLevel::Light
            };
            (level, rng.gen_range(1.1..1.4))
        }
        _ => (TrafficLevel::Light, rng.gen_range(1.0..1.2)),
    }
}

/// Mean level score: up to 1.3 light, up to 2.3 moderate, else heavy. An
/// empty path has no traffic and counts as light.
pub fn overall_traffic_level(levels: &[TrafficLevel]) -> TrafficLevel {
    if levels.is_empty() {
        return TrafficLevel::Light;
    }
    let mean = levels.iter().map(|level| level.score()).sum::<f64>() / levels.len() as f64;
    if mean <= 1.3 {
        TrafficLevel::Light
    } else if mean <= 2.3 {
        TrafficLevel::Moderate
    } else {
        TrafficLevel::Heavy
    }
}

/// Simulated traffic on each consecutive pair of `path` at time `at`.
///
/// Delay is the extra time over driving the segment at 30 km/h.
pub fn traffic_conditions<R: Rng + ?Sized>(
    path: &[Coordinate],
    at: NaiveDateTime,
    rng: &mut R,
) -> TrafficConditions {
    let segments: Vec<TrafficSegment> = path
        .windows(2)
        .map(|pair| {
            let (traffic_level, delay_factor) = sample_traffic(at.hour(), rng);
            let distance_km = haversine_km(pair[0], pair[1]);
            TrafficSegment {
                start: pair[0],
                end: pair[1],
                distance_km,
                traffic_level,
                delay_factor,
                estimated_delay_minutes: (delay_factor - 1.0) * (distance_km / FREE_FLOW_SPEED_KMH) * 60.0,
            }
        })
        .collect();

    let levels: Vec<TrafficLevel> = segments.iter().map(|s| s.traffic_level).collect();
    TrafficConditions {
        total_delay_minutes: segments.iter().map(|s| s.estimated_delay_minutes).sum(),
        overall_traffic_level: overall_traffic_level(&levels),
        segments,
        timestamp: at,
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::oracle::RouteSource;
    use crate::traits::RouteStep;

    fn route(distance_km: f64, steps: usize) -> RouteResult {
        RouteResult {
            distance_km,
            duration_minutes: distance_km * 2.4,
            geometry: None,
            steps: (0..steps)
                .map(|_| RouteStep {
                    instruction: "turn left".to_string(),
                    road_name: String::new(),
                    distance_m: 100.0,
                    duration_s: 10.0,
                })
                .collect(),
            source: RouteSource::Live,
            estimated: false,
            profile: "driving".to_string(),
        }
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-04 {:02}:30:00", hour), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn path() -> Vec<Coordinate> {
        vec![
            Coordinate::new(18.9220, 72.8347).unwrap(),
            Coordinate::new(19.0176, 72.8562).unwrap(),
            Coordinate::new(19.0596, 72.8295).unwrap(),
            Coordinate::new(19.1136, 72.8697).unwrap(),
        ]
    }

    #[test]
    fn test_off_peak_traffic_is_light() {
        let mut rng = StdRng::seed_from_u64(7);
        let conditions = traffic_conditions(&path(), at(13), &mut rng);

        assert_eq!(conditions.segments.len(), 3);
        assert_eq!(conditions.overall_traffic_level, TrafficLevel::Light);
        assert_eq!(conditions.timestamp, at(13));
        for segment in &conditions.segments {
            assert_eq!(segment.traffic_level, TrafficLevel::Light);
            assert!((1.0..1.2).contains(&segment.delay_factor));
            let expected = (segment.delay_factor - 1.0) * (segment.distance_km / 30.0) * 60.0;
            assert!((segment.estimated_delay_minutes - expected).abs() < 1e-12);
        }
        let summed: f64 = conditions.segments.iter().map(|s| s.estimated_delay_minutes).sum();
        assert!((conditions.total_delay_minutes - summed).abs() < 1e-12);
    }

    #[test]
    fn test_peak_and_shoulder_bands() {
        let mut rng = StdRng::seed_from_u64(11);
        let peak = traffic_conditions(&path(), at(18), &mut rng);
        assert!(peak
            .segments
            .iter()
            .all(|s| s.traffic_level != TrafficLevel::Light && (1.3..2.0).contains(&s.delay_factor)));
        assert_ne!(peak.overall_traffic_level, TrafficLevel::Light);

        let shoulder = traffic_conditions(&path(), at(7), &mut rng);
        assert!(shoulder
            .segments
            .iter()
            .all(|s| s.traffic_level != TrafficLevel::Heavy && (1.1..1.4).contains(&s.delay_factor)));
    }

    #[test]
    fn test_seeded_traffic_is_reproducible() {
        let a = traffic_conditions(&path(), at(9), &mut StdRng::seed_from_u64(3));
        let b = traffic_conditions(&path(), at(9), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_overall_level_thresholds() {
        use TrafficLevel::*;
        assert_eq!(overall_traffic_level(&[Light, Light, Light, Moderate]), Light);
        assert_eq!(overall_traffic_level(&[Light, Moderate]), Moderate);
        assert_eq!(overall_traffic_level(&[Moderate, Moderate, Heavy]), Heavy);
        assert_eq!(overall_traffic_level(&[Heavy, Heavy, Moderate]), Heavy);
        assert_eq!(overall_traffic_level(&[Moderate, Heavy, Light]), Moderate);
        assert_eq!(overall_traffic_level(&[]), Light);
    }

    #[test]
    fn test_short_path_has_no_segments() {
        let mut rng = StdRng::seed_from_u64(1);
        let conditions = traffic_conditions(&path()[..1], at(8), &mut rng);
        assert!(conditions.segments.is_empty());
        assert_eq!(conditions.total_delay_minutes, 0.0);
    }

    #[test]
    fn test_time_buckets() {
        assert_eq!(time_of_day_risk(23), 0.3);
        assert_eq!(time_of_day_risk(5), 0.3);
        assert_eq!(time_of_day_risk(6), 0.4);
        assert_eq!(time_of_day_risk(20), 0.4);
        assert_eq!(time_of_day_risk(21), 0.1);
        assert_eq!(time_of_day_risk(13), 0.1);
    }

    #[test]
    fn test_unknown_weather_defaults() {
        assert_eq!(weather_risk("hail"), 0.2);
        assert_eq!(weather_risk("storm"), 0.9);
    }

    #[test]
    fn test_calm_midday_trip_is_low() {
        let assessment = assess(&route(10.0, 5), Some("clear"), 13);
        // 0.2*0.1 + 0.3*0.1 + 0.3*0.1 + 0.2*0.1
        assert_eq!(assessment.overall_risk_score, 0.1);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.recommendations.is_empty());
    }

    #[test]
    fn test_stormy_long_complex_night_trip_is_high() {
        let assessment = assess(&route(250.0, 80), Some("storm"), 23);
        // 0.2*1 + 0.3*0.9 + 0.3*0.3 + 0.2*1
        assert_eq!(assessment.overall_risk_score, 0.76);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.recommendations.len(), 8);
        assert_eq!(assessment.recommendations[0], "Consider postponing the trip if possible");
    }
}
