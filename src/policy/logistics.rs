//! Battery/inventory stockout forecasting and resupply dispatch.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{hours_after, minutes_after, Decision};
use crate::model::Features;
use crate::risk::{classify, RiskLevel, STOCKOUT_BREAKPOINTS};
use crate::traits::PredictiveModel;

/// Dispatch urgency shares the ordinal risk scale.
pub type Urgency = RiskLevel;

const FORECAST_CONFIDENCE: f64 = 0.87;
const DISPATCH_CONFIDENCE: f64 = 0.85;
/// Forecast hours with a stockout probability above this trigger a dispatch.
const DISPATCH_RISK_THRESHOLD: f64 = 0.6;
const MINUTES_PER_KM: f64 = 2.0;
const LOADING_MINUTES: f64 = 15.0;
const FUEL_COST_PER_KM: f64 = 8.0;
const DRIVER_COST: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationInventory {
    pub current_inventory: f64,
    pub max_capacity: f64,
    pub station_popularity: f64,
    pub avg_daily_consumption: f64,
    pub consumption_trend: f64,
    pub weather_impact: f64,
    pub event_impact: f64,
    pub supplier_distance: f64,
    /// Minutes.
    pub delivery_time: f64,
    pub available_vehicles: u32,
    pub vehicle_capacity: f64,
}

impl Default for StationInventory {
    fn default() -> Self {
        Self {
            current_inventory: 50.0,
            max_capacity: 100.0,
            station_popularity: 0.5,
            avg_daily_consumption: 25.0,
            consumption_trend: 0.0,
            weather_impact: 1.0,
            event_impact: 1.0,
            supplier_distance: 20.0,
            delivery_time: 45.0,
            available_vehicles: 3,
            vehicle_capacity: 50.0,
        }
    }
}

impl StationInventory {
    /// Model inputs at time `at` with `inventory` units on hand.
    pub fn features(&self, at: NaiveDateTime, inventory: f64) -> Features {
        Features::new()
            .with("hour", f64::from(at.hour()))
            .with("day_of_week", f64::from(at.weekday().num_days_from_monday()))
            .with("month", f64::from(at.month()))
            .with("current_inventory", inventory)
            .with("max_capacity", self.max_capacity)
            .with("station_popularity", self.station_popularity)
            .with("avg_daily_consumption", self.avg_daily_consumption)
            .with("consumption_trend", self.consumption_trend)
            .with("weather_impact", self.weather_impact)
            .with("event_impact", self.event_impact)
            .with("supplier_distance", self.supplier_distance)
            .with("delivery_time", self.delivery_time)
            .with("available_vehicles", f64::from(self.available_vehicles))
            .with("vehicle_capacity", self.vehicle_capacity)
            .with("inventory_ratio", inventory / self.max_capacity)
            .with(
                "consumption_per_popularity",
                self.avg_daily_consumption / self.station_popularity,
            )
            .with("delivery_rate", self.vehicle_capacity / self.delivery_time)
    }

    /// Expected units consumed during the hour starting at `hour`.
    pub fn hourly_consumption(&self, hour: u32) -> f64 {
        let multiplier = match hour {
            8 | 9 | 17 | 18 => 2.0,
            7 | 10 | 16 | 19 => 1.5,
            _ => 0.8,
        };
        self.avg_daily_consumption / 24.0 * multiplier * self.weather_impact
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockoutForecast {
    pub hour_ahead: u32,
    pub timestamp: NaiveDateTime,
    pub stockout_probability: f64,
    /// Projected inventory at the end of the hour.
    pub estimated_inventory: f64,
    pub recommended_dispatch: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
}

/// Projects inventory hour by hour from `start`, scoring each hour with the
/// stockout classifier and dispatch-quantity regressor.
pub fn forecast_stockout(
    stockout_model: &dyn PredictiveModel,
    dispatch_model: &dyn PredictiveModel,
    station: &StationInventory,
    start: NaiveDateTime,
    hours: u32,
) -> Vec<StockoutForecast> {
    let mut inventory = station.current_inventory;
    (0..hours)
        .map_while(|hour_ahead| hours_after(start, hour_ahead).map(|at| (hour_ahead, at)))
        .map(|(hour_ahead, at)| {
            let features = station.features(at, inventory);
            let probability = stockout_model.predict(&features).value;
            let dispatch = dispatch_model.predict(&features).value.max(0.0);

            inventory = (inventory - station.hourly_consumption(at.hour())).max(0.0);

            StockoutForecast {
                hour_ahead,
                timestamp: at,
                stockout_probability: probability,
                estimated_inventory: inventory,
                recommended_dispatch: dispatch,
                risk_level: classify(probability, &STOCKOUT_BREAKPOINTS),
                confidence: FORECAST_CONFIDENCE,
            }
        })
        .collect()
}

fn default_vehicle_capacity() -> f64 {
    50.0
}

fn default_vehicle_distance() -> f64 {
    20.0
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    #[serde(default = "default_vehicle_capacity")]
    pub capacity: f64,
    #[serde(default = "default_vehicle_distance")]
    pub distance_to_station: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

impl Vehicle {
    /// Capacity fit, proximity and availability; higher is better.
    pub fn dispatch_score(&self, required_quantity: f64) -> f64 {
        let capacity_score = if required_quantity > 0.0 {
            (self.capacity / required_quantity).min(1.0)
        } else {
            1.0
        };
        let distance_score = 1.0 / (1.0 + self.distance_to_station / 50.0);
        let availability_score = if self.available { 1.0 } else { 0.0 };

        capacity_score * 0.4 + distance_score * 0.3 + availability_score * 0.3
    }

    pub fn travel_minutes(&self) -> f64 {
        self.distance_to_station * MINUTES_PER_KM + LOADING_MINUTES
    }

    pub fn dispatch_cost(&self) -> f64 {
        self.distance_to_station * FUEL_COST_PER_KM + DRIVER_COST
    }
}

/// Highest-scoring vehicle; the first one wins a tie.
pub fn select_vehicle(vehicles: &[Vehicle], required_quantity: f64) -> Option<&Vehicle> {
    let mut best: Option<(&Vehicle, f64)> = None;
    for vehicle in vehicles {
        let score = vehicle.dispatch_score(required_quantity);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((vehicle, score));
        }
    }
    best.map(|(vehicle, _)| vehicle)
}

pub fn dispatch_urgency(hours_ahead: u32, risk_probability: f64) -> Urgency {
    if hours_ahead <= 1 && risk_probability > 0.8 {
        RiskLevel::Critical
    } else if hours_ahead <= 2 && risk_probability > 0.6 {
        RiskLevel::High
    } else if hours_ahead <= 4 && risk_probability > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    Dispatch,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchDecision {
    pub dispatch_needed: bool,
    pub recommended_action: DispatchAction,
    pub urgency: Urgency,
    pub recommended_quantity: u32,
    pub selected_vehicle: Option<Vehicle>,
    pub estimated_arrival: Option<NaiveDateTime>,
    pub cost_estimate: f64,
    pub risk_mitigation: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision for DispatchDecision {
    fn recommended_action(&self) -> &'static str {
        match self.recommended_action {
            DispatchAction::Dispatch => "dispatch",
            DispatchAction::Monitor => "monitor",
        }
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

/// Decides whether and how to resupply given a stockout forecast.
///
/// The earliest risky hour sets the quantity; urgency uses the worst
/// probability anywhere in the forecast.
pub fn plan_dispatch(
    forecasts: &[StockoutForecast],
    vehicles: &[Vehicle],
    now: NaiveDateTime,
) -> DispatchDecision {
    let max_risk = forecasts
        .iter()
        .map(|f| f.stockout_probability)
        .fold(0.0, f64::max);
    let earliest_risky = forecasts
        .iter()
        .filter(|f| f.stockout_probability > DISPATCH_RISK_THRESHOLD)
        .min_by_key(|f| f.hour_ahead);

    let Some(earliest) = earliest_risky else {
        return DispatchDecision {
            dispatch_needed: false,
            recommended_action: DispatchAction::Monitor,
            urgency: RiskLevel::Low,
            recommended_quantity: 0,
            selected_vehicle: None,
            estimated_arrival: None,
            cost_estimate: 0.0,
            risk_mitigation: None,
            confidence: DISPATCH_CONFIDENCE,
            reasoning: "Low stockout risk in forecast period".to_string(),
        };
    };

    let quantity = earliest.recommended_dispatch;
    let vehicle = select_vehicle(vehicles, quantity).cloned();
    let estimated_arrival = vehicle
        .as_ref()
        .and_then(|v| minutes_after(now, v.travel_minutes()));
    let cost_estimate = vehicle.as_ref().map_or(0.0, Vehicle::dispatch_cost);

    DispatchDecision {
        dispatch_needed: true,
        recommended_action: DispatchAction::Dispatch,
        urgency: dispatch_urgency(earliest.hour_ahead, max_risk),
        recommended_quantity: quantity as u32,
        reasoning: match &vehicle {
            Some(v) => format!(
                "Stockout risk {:.2} expected in {} h; dispatching {} units with {}",
                earliest.stockout_probability, earliest.hour_ahead, quantity as u32, v.id
            ),
            None => format!(
                "Stockout risk {:.2} expected in {} h but no vehicle is available",
                earliest.stockout_probability, earliest.hour_ahead
            ),
        },
        selected_vehicle: vehicle,
        estimated_arrival,
        cost_estimate,
        risk_mitigation: Some(format!(
            "Reduces stockout risk from {:.2} to {:.2}",
            max_risk,
            max_risk * 0.3
        )),
        confidence: DISPATCH_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-04 {:02}:00:00", hour), "%Y-%m-%d %H:%M:%S")
            .unwrap()
    }

    fn forecast(hour_ahead: u32, probability: f64, dispatch: f64) -> StockoutForecast {
        StockoutForecast {
            hour_ahead,
            timestamp: at(hour_ahead),
            stockout_probability: probability,
            estimated_inventory: 10.0,
            recommended_dispatch: dispatch,
            risk_level: classify(probability, &STOCKOUT_BREAKPOINTS),
            confidence: FORECAST_CONFIDENCE,
        }
    }

    fn vehicle(id: &str, capacity: f64, distance: f64, available: bool) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            capacity,
            distance_to_station: distance,
            available,
        }
    }

    #[test]
    fn test_urgency_table() {
        assert_eq!(dispatch_urgency(1, 0.81), RiskLevel::Critical);
        assert_eq!(dispatch_urgency(2, 0.81), RiskLevel::High);
        assert_eq!(dispatch_urgency(2, 0.6), RiskLevel::Medium);
        assert_eq!(dispatch_urgency(4, 0.41), RiskLevel::Medium);
        assert_eq!(dispatch_urgency(5, 0.99), RiskLevel::Low);
    }

    #[test]
    fn test_vehicle_selection() {
        let vehicles = vec![
            vehicle("V001", 50.0, 15.0, true),
            vehicle("V002", 30.0, 8.0, true),
            vehicle("V003", 60.0, 25.0, false),
        ];
        // V001: 0.4 + 0.3/1.3 + 0.3 = 0.9308, V002: 0.4*0.75 + 0.3/1.16 + 0.3 = 0.8586
        let best = select_vehicle(&vehicles, 40.0).unwrap();
        assert_eq!(best.id, "V001");
    }

    #[test]
    fn test_vehicle_tie_keeps_first() {
        let vehicles = vec![vehicle("A", 50.0, 10.0, true), vehicle("B", 50.0, 10.0, true)];
        assert_eq!(select_vehicle(&vehicles, 20.0).unwrap().id, "A");
        assert!(select_vehicle(&[], 20.0).is_none());
    }

    #[test]
    fn test_zero_quantity_does_not_divide() {
        let v = vehicle("A", 50.0, 0.0, true);
        assert_eq!(v.dispatch_score(0.0), 1.0);
    }

    #[test]
    fn test_no_risk_means_monitor() {
        let forecasts = vec![forecast(0, 0.2, 5.0), forecast(1, 0.6, 5.0)];
        let decision = plan_dispatch(&forecasts, &[vehicle("A", 50.0, 10.0, true)], at(9));
        assert!(!decision.dispatch_needed);
        assert_eq!(decision.recommended_action, DispatchAction::Monitor);
        assert_eq!(decision.urgency, RiskLevel::Low);
    }

    #[test]
    fn test_dispatch_uses_earliest_risky_hour() {
        let forecasts = vec![
            forecast(0, 0.3, 5.0),
            forecast(1, 0.7, 35.9),
            forecast(2, 0.9, 60.0),
        ];
        let vehicles = vec![vehicle("V001", 50.0, 15.0, true)];
        let decision = plan_dispatch(&forecasts, &vehicles, at(9));

        assert!(decision.dispatch_needed);
        assert_eq!(decision.recommended_quantity, 35);
        // Earliest risky hour is 1, worst risk is 0.9.
        assert_eq!(decision.urgency, RiskLevel::Critical);
        assert_eq!(decision.cost_estimate, 15.0 * 8.0 + 200.0);
        assert_eq!(decision.estimated_arrival, Some(at(9) + Duration::minutes(45)));
    }

    #[test]
    fn test_unreachable_vehicle_has_no_arrival() {
        let forecasts = vec![forecast(0, 0.9, 20.0)];
        let far = vec![vehicle("far", 50.0, 1.0e12, true)];
        let decision = plan_dispatch(&forecasts, &far, at(8));
        assert!(decision.dispatch_needed);
        assert_eq!(decision.selected_vehicle.as_ref().map(|v| v.id.as_str()), Some("far"));
        assert_eq!(decision.estimated_arrival, None);

        let nan = vec![vehicle("lost", 50.0, f64::NAN, true)];
        assert_eq!(plan_dispatch(&forecasts, &nan, at(8)).estimated_arrival, None);
    }

    #[test]
    fn test_forecast_stops_at_calendar_end() {
        let stockout = crate::model::FixedModel::new("stockout", 0.1);
        let dispatch = crate::model::FixedModel::new("dispatch", 0.0);
        let start = NaiveDateTime::MAX - Duration::hours(2);
        let forecasts = forecast_stockout(&stockout, &dispatch, &StationInventory::default(), start, 6);
        assert_eq!(forecasts.len(), 3);
        assert_eq!(forecasts[2].timestamp, start + Duration::hours(2));
    }

    #[test]
    fn test_hourly_consumption_multipliers() {
        let station = StationInventory {
            avg_daily_consumption: 24.0,
            ..StationInventory::default()
        };
        assert_eq!(station.hourly_consumption(8), 2.0);
        assert_eq!(station.hourly_consumption(16), 1.5);
        assert_eq!(station.hourly_consumption(3), 0.8);
    }
}
