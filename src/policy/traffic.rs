//! Station demand forecasting and the incentive offered to move a driver to
//! a less busy station.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{encode_label, hours_after, round_to, Decision};
use crate::error::PlannerError;
use crate::model::Features;
use crate::traits::PredictiveModel;

/// Weather labels in model encoding order.
const WEATHER_LABELS: [&str; 4] = ["cloudy", "rainy", "stormy", "sunny"];
/// Station type labels in model encoding order.
const STATION_TYPE_LABELS: [&str; 3] = ["fast", "standard", "ultra"];

const FORECAST_CONFIDENCE: f64 = 0.85;
const INCENTIVE_MARGIN: f64 = 10.0;
const OFFER_EXPIRY_MINUTES: u32 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationContext {
    pub weather: String,
    pub temperature: f64,
    pub station_capacity: u32,
    pub station_type: String,
    pub is_highway: bool,
    pub is_mall: bool,
    pub is_office: bool,
    pub is_holiday: bool,
    pub nearby_event: bool,
    /// Extra driving distance if this is the alternative station.
    pub distance_km: Option<f64>,
}

impl Default for StationContext {
    fn default() -> Self {
        Self {
            weather: "sunny".to_string(),
            temperature: 25.0,
            station_capacity: 8,
            station_type: "standard".to_string(),
            is_highway: false,
            is_mall: false,
            is_office: false,
            is_holiday: false,
            nearby_event: false,
            distance_km: None,
        }
    }
}

impl StationContext {
    pub fn features(&self, at: NaiveDateTime) -> Result<Features, PlannerError> {
        let flag = |value: bool| if value { 1.0 } else { 0.0 };
        Ok(Features::new()
            .with("hour", f64::from(at.hour()))
            .with("day_of_week", f64::from(at.weekday().num_days_from_monday()))
            .with("month", f64::from(at.month()))
            .with("weather", encode_label("weather", &self.weather, &WEATHER_LABELS)?)
            .with("temperature", self.temperature)
            .with("station_capacity", f64::from(self.station_capacity))
            .with(
                "station_type",
                encode_label("station_type", &self.station_type, &STATION_TYPE_LABELS)?,
            )
            .with("is_highway", flag(self.is_highway))
            .with("is_mall", flag(self.is_mall))
            .with("is_office", flag(self.is_office))
            .with("is_holiday", flag(self.is_holiday))
            .with("nearby_event", flag(self.nearby_event)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficForecast {
    pub hour_ahead: u32,
    pub timestamp: NaiveDateTime,
    pub predicted_demand: f64,
    /// Minutes.
    pub predicted_wait_time: f64,
    pub confidence: f64,
}

/// Hour-by-hour demand and wait-time forecast starting at `start`.
/// Negative model outputs are clamped to zero. The forecast ends early if
/// the horizon runs past the last representable timestamp.
pub fn forecast(
    demand_model: &dyn PredictiveModel,
    wait_model: &dyn PredictiveModel,
    station: &StationContext,
    start: NaiveDateTime,
    hours: u32,
) -> Result<Vec<TrafficForecast>, PlannerError> {
    (0..hours)
        .map_while(|hour_ahead| hours_after(start, hour_ahead).map(|at| (hour_ahead, at)))
        .map(|(hour_ahead, at)| {
            let features = station.features(at)?;
            Ok(TrafficForecast {
                hour_ahead,
                timestamp: at,
                predicted_demand: demand_model.predict(&features).value.max(0.0),
                predicted_wait_time: wait_model.predict(&features).value.max(0.0),
                confidence: FORECAST_CONFIDENCE,
            })
        })
        .collect()
}

/// How a driver values time and distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub time_value_per_minute: f64,
    pub cost_per_km: f64,
    /// 0 (indifferent) to 1 (very price sensitive).
    pub price_sensitivity: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            time_value_per_minute: 2.0,
            cost_per_km: 5.0,
            price_sensitivity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveType {
    DiscountPercentage,
    Cashback,
    ComboDeal,
    PremiumIncentive,
}

impl IncentiveType {
    pub fn for_amount(amount: f64) -> Self {
        if amount <= 20.0 {
            IncentiveType::DiscountPercentage
        } else if amount <= 50.0 {
            IncentiveType::Cashback
        } else if amount <= 100.0 {
            IncentiveType::ComboDeal
        } else {
            IncentiveType::PremiumIncentive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncentiveType::DiscountPercentage => "discount_percentage",
            IncentiveType::Cashback => "cashback",
            IncentiveType::ComboDeal => "combo_deal",
            IncentiveType::PremiumIncentive => "premium_incentive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBenefit {
    pub time_benefit: f64,
    pub distance_cost: f64,
    pub net_benefit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncentiveDecision {
    pub recommended_incentive: f64,
    pub incentive_type: IncentiveType,
    pub acceptance_probability: f64,
    pub time_saved_minutes: f64,
    pub extra_distance_km: f64,
    pub cost_benefit_analysis: CostBenefit,
    pub confidence: f64,
    pub expires_in_minutes: u32,
    pub reasoning: String,
}

impl Decision for IncentiveDecision {
    fn recommended_action(&self) -> &'static str {
        self.incentive_type.as_str()
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

/// Likelihood a driver takes the offer. Without any time saving the offer
/// is assumed to be taken only rarely.
pub fn acceptance_probability(time_saved: f64, extra_distance_km: f64, incentive: f64) -> f64 {
    if time_saved <= 0.0 {
        return 0.1;
    }
    let base = (0.3 + incentive / 100.0 + time_saved / 30.0).clamp(0.1, 0.9);
    let distance_penalty = (extra_distance_km - 1.0).max(0.0) * 0.1;
    (base - distance_penalty).max(0.1)
}

/// Incentive needed to move a driver from a station with
/// `wait_time_current` minutes of queue to one with `wait_time_alternative`,
/// `extra_distance_km` further away.
pub fn calculate_incentive(
    wait_time_current: f64,
    wait_time_alternative: f64,
    extra_distance_km: f64,
    profile: &UserProfile,
) -> IncentiveDecision {
    let time_saved = wait_time_current - wait_time_alternative;
    let time_benefit = time_saved * profile.time_value_per_minute;
    let distance_penalty = extra_distance_km * profile.cost_per_km;

    let base = (distance_penalty - time_benefit + INCENTIVE_MARGIN).max(0.0);
    let incentive = base * (1.0 + profile.price_sensitivity);
    let incentive_type = IncentiveType::for_amount(incentive);

    IncentiveDecision {
        recommended_incentive: round_to(incentive, 2),
        incentive_type,
        acceptance_probability: acceptance_probability(time_saved, extra_distance_km, incentive),
        time_saved_minutes: round_to(time_saved, 1),
        extra_distance_km,
        cost_benefit_analysis: CostBenefit {
            time_benefit: round_to(time_benefit, 2),
            distance_cost: round_to(distance_penalty, 2),
            net_benefit: round_to(time_benefit - distance_penalty, 2),
        },
        confidence: FORECAST_CONFIDENCE,
        expires_in_minutes: OFFER_EXPIRY_MINUTES,
        reasoning: format!(
            "Saves {:.1} min of queueing for {:.1} km extra driving; offering {:.2} as {}",
            time_saved,
            extra_distance_km,
            incentive,
            incentive_type.as_str()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incentive_formula() {
        // time_benefit = 10*2 = 20, distance_penalty = 2*5 = 10
        // base = max(0, 10 - 20 + 10) = 0
        let decision = calculate_incentive(25.0, 15.0, 2.0, &UserProfile::default());
        assert_eq!(decision.recommended_incentive, 0.0);
        assert_eq!(decision.incentive_type, IncentiveType::DiscountPercentage);
        assert_eq!(decision.cost_benefit_analysis.net_benefit, 10.0);
    }

    #[test]
    fn test_incentive_with_price_sensitivity() {
        // time_benefit = 5*2 = 10, distance_penalty = 4*5 = 20
        // base = 20 - 10 + 10 = 20, final = 20 * 1.5 = 30
        let decision = calculate_incentive(10.0, 5.0, 4.0, &UserProfile::default());
        assert_eq!(decision.recommended_incentive, 30.0);
        assert_eq!(decision.incentive_type, IncentiveType::Cashback);
        // base prob = 0.3 + 0.3 + 5/30 = 0.7667, penalty = 0.3
        assert!((decision.acceptance_probability - (0.3 + 0.3 + 5.0 / 30.0 - 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_incentive_buckets() {
        assert_eq!(IncentiveType::for_amount(20.0), IncentiveType::DiscountPercentage);
        assert_eq!(IncentiveType::for_amount(20.01), IncentiveType::Cashback);
        assert_eq!(IncentiveType::for_amount(100.0), IncentiveType::ComboDeal);
        assert_eq!(IncentiveType::for_amount(100.5), IncentiveType::PremiumIncentive);
    }

    #[test]
    fn test_acceptance_bounds() {
        assert_eq!(acceptance_probability(-3.0, 0.5, 500.0), 0.1);
        assert_eq!(acceptance_probability(60.0, 0.5, 500.0), 0.9);
        assert_eq!(acceptance_probability(1.0, 20.0, 0.0), 0.1);
    }

    #[test]
    fn test_unknown_weather_rejected() {
        let station = StationContext {
            weather: "hail".to_string(),
            ..StationContext::default()
        };
        let at = NaiveDateTime::parse_from_str("2024-03-04 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(station.features(at).is_err());
    }
}
