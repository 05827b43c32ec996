//! Energy-market trading: buy low into the station battery, sell high out
//! of it, otherwise hold.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{hours_after, round_to, Decision};
use crate::error::PlannerError;
use crate::model::Features;
use crate::risk::RiskLevel;
use crate::traits::PredictiveModel;

const FORECAST_CONFIDENCE: f64 = 0.85;
/// Minimum expected price move (per kWh) worth trading on.
const PRICE_THRESHOLD: f64 = 0.5;
const ROUND_TRIP_EFFICIENCY: f64 = 0.9;
const MIN_PRICE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConditions {
    pub grid_demand: f64,
    pub grid_supply: f64,
    pub grid_frequency: f64,
    pub temperature: f64,
    pub solar_irradiance: f64,
    pub wind_speed: f64,
    pub station_load: f64,
    pub battery_soc: f64,
    pub charging_sessions: u32,
    pub coal_price: f64,
    pub gas_price: f64,
    pub carbon_price: f64,
}

impl Default for MarketConditions {
    fn default() -> Self {
        Self {
            grid_demand: 1000.0,
            grid_supply: 1100.0,
            grid_frequency: 50.0,
            temperature: 25.0,
            solar_irradiance: 500.0,
            wind_speed: 10.0,
            station_load: 50.0,
            battery_soc: 60.0,
            charging_sessions: 4,
            coal_price: 3000.0,
            gas_price: 40.0,
            carbon_price: 2000.0,
        }
    }
}

impl MarketConditions {
    pub fn features(&self, at: NaiveDateTime) -> Features {
        let renewable_index = (self.solar_irradiance / 1000.0 + self.wind_speed / 20.0) / 2.0;
        Features::new()
            .with("hour", f64::from(at.hour()))
            .with("day_of_week", f64::from(at.weekday().num_days_from_monday()))
            .with("month", f64::from(at.month()))
            .with("grid_demand", self.grid_demand)
            .with("grid_supply", self.grid_supply)
            .with("grid_frequency", self.grid_frequency)
            .with("temperature", self.temperature)
            .with("solar_irradiance", self.solar_irradiance)
            .with("wind_speed", self.wind_speed)
            .with("station_load", self.station_load)
            .with("battery_soc", self.battery_soc)
            .with("charging_sessions", f64::from(self.charging_sessions))
            .with("coal_price", self.coal_price)
            .with("gas_price", self.gas_price)
            .with("carbon_price", self.carbon_price)
            .with("supply_demand_ratio", self.grid_supply / self.grid_demand)
            .with("renewable_index", renewable_index)
            .with(
                "load_per_session",
                self.station_load / f64::from(self.charging_sessions.max(1)),
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PriceCategory {
    pub fn of(price: f64) -> Self {
        if price < 3.5 {
            PriceCategory::VeryLow
        } else if price < 4.5 {
            PriceCategory::Low
        } else if price < 5.5 {
            PriceCategory::Medium
        } else if price < 6.5 {
            PriceCategory::High
        } else {
            PriceCategory::VeryHigh
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceForecast {
    pub hour_ahead: u32,
    pub timestamp: NaiveDateTime,
    /// Per kWh, never below 1.0.
    pub predicted_price: f64,
    pub predicted_demand: f64,
    /// Category of the raw model price, before the floor is applied.
    pub price_category: PriceCategory,
    pub confidence: f64,
}

pub fn forecast_prices(
    price_model: &dyn PredictiveModel,
    demand_model: &dyn PredictiveModel,
    market: &MarketConditions,
    start: NaiveDateTime,
    hours: u32,
) -> Vec<PriceForecast> {
    (0..hours)
        .map_while(|hour_ahead| hours_after(start, hour_ahead).map(|at| (hour_ahead, at)))
        .map(|(hour_ahead, at)| {
            let features = market.features(at);
            let price = price_model.predict(&features).value;
            PriceForecast {
                hour_ahead,
                timestamp: at,
                predicted_price: price.max(MIN_PRICE),
                predicted_demand: demand_model.predict(&features).value.max(0.0),
                price_category: PriceCategory::of(price),
                confidence: FORECAST_CONFIDENCE,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationEnergyState {
    /// Battery state of charge, percent.
    pub battery_soc: f64,
    pub max_capacity_kwh: f64,
    /// Percent of capacity in use by charging sessions.
    pub current_load: f64,
}

impl Default for StationEnergyState {
    fn default() -> Self {
        Self {
            battery_soc: 60.0,
            max_capacity_kwh: 100.0,
            current_load: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTime {
    Immediate,
    WithinHour,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingDecision {
    pub action: TradeAction,
    pub quantity_kwh: f64,
    pub current_price: f64,
    pub expected_future_price: f64,
    pub profit_estimate: f64,
    pub confidence: f64,
    pub reasoning: String,
    /// `None` when holding: no position, no risk.
    pub risk_level: Option<RiskLevel>,
    pub execution_time: ExecutionTime,
}

impl Decision for TradingDecision {
    fn recommended_action(&self) -> &'static str {
        self.action.as_str()
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

/// The trading rule table applied to a current and expected future price.
pub fn decide_trade(
    current_price: f64,
    future_price: f64,
    battery_soc: f64,
    current_load: f64,
) -> TradingDecision {
    let price_diff = future_price - current_price;

    let (action, quantity, confidence, urgent, reasoning) = if current_price < 4.0
        && price_diff > PRICE_THRESHOLD
        && battery_soc < 70.0
        && current_load < 40.0
    {
        (
            TradeAction::Buy,
            ((100.0 - battery_soc) * 0.5).min(30.0),
            0.8,
            current_price < 3.0,
            format!(
                "Low current price (₹{:.2}) with expected increase to ₹{:.2}",
                current_price, future_price
            ),
        )
    } else if current_price > 5.0
        && price_diff < -PRICE_THRESHOLD
        && battery_soc > 80.0
        && current_load < 60.0
    {
        (
            TradeAction::Sell,
            ((battery_soc - 50.0) * 0.4).min(25.0),
            0.85,
            current_price > 6.0,
            format!(
                "High current price (₹{:.2}) with expected decrease to ₹{:.2}",
                current_price, future_price
            ),
        )
    } else {
        (
            TradeAction::Hold,
            0.0,
            0.7,
            false,
            format!(
                "Price conditions not favorable for trading (current: ₹{:.2}, future: ₹{:.2})",
                current_price, future_price
            ),
        )
    };

    let profit = match action {
        TradeAction::Buy | TradeAction::Sell => quantity * price_diff.abs() * ROUND_TRIP_EFFICIENCY,
        TradeAction::Hold => 0.0,
    };

    TradingDecision {
        action,
        quantity_kwh: quantity,
        current_price: round_to(current_price, 3),
        expected_future_price: round_to(future_price, 3),
        profit_estimate: round_to(profit, 2),
        confidence,
        reasoning,
        risk_level: (action != TradeAction::Hold).then_some(RiskLevel::Low),
        execution_time: if urgent {
            ExecutionTime::Immediate
        } else {
            ExecutionTime::WithinHour
        },
    }
}

/// Trades on a price forecast: hour 0 is the current price, the mean of the
/// remaining hours is the expected future price.
pub fn decide_from_forecast(
    forecasts: &[PriceForecast],
    station: &StationEnergyState,
) -> Result<TradingDecision, PlannerError> {
    let Some((current, future)) = forecasts.split_first().filter(|(_, rest)| !rest.is_empty()) else {
        return Err(PlannerError::InvalidInput(
            "price forecast needs at least two hours".to_string(),
        ));
    };
    let future_price =
        future.iter().map(|f| f.predicted_price).sum::<f64>() / future.len() as f64;

    Ok(decide_trade(
        current.predicted_price,
        future_price,
        station.battery_soc,
        station.current_load,
    ))
}

fn default_nearby_price() -> f64 {
    5.0
}

fn default_nearby_distance() -> f64 {
    5.0
}

fn default_nearby_capacity() -> f64 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyStation {
    pub id: String,
    #[serde(default = "default_nearby_price")]
    pub current_price: f64,
    #[serde(default = "default_nearby_distance")]
    pub distance_km: f64,
    /// kWh the station can trade.
    #[serde(default = "default_nearby_capacity")]
    pub available_capacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrageAction {
    BuyFrom,
    SellTo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub station_id: String,
    pub action: ArbitrageAction,
    pub price_difference: f64,
    pub transport_cost: f64,
    pub net_profit_per_kwh: f64,
    pub recommended_quantity: f64,
    pub total_profit_estimate: f64,
}

/// Price gaps with stations under 10 km away that beat transport cost by
/// at least 0.2 per kWh, most profitable first.
pub fn arbitrage_opportunities(own_price: f64, nearby: &[NearbyStation]) -> Vec<ArbitrageOpportunity> {
    let mut opportunities: Vec<ArbitrageOpportunity> = nearby
        .iter()
        .filter_map(|station| {
            let price_diff = station.current_price - own_price;
            if price_diff.abs() <= 0.5 || station.distance_km >= 10.0 {
                return None;
            }
            let transport_cost = station.distance_km * 0.1;
            let net_profit = price_diff.abs() - transport_cost;
            if net_profit <= 0.2 {
                return None;
            }
            Some(ArbitrageOpportunity {
                station_id: station.id.clone(),
                action: if price_diff > 0.0 {
                    ArbitrageAction::BuyFrom
                } else {
                    ArbitrageAction::SellTo
                },
                price_difference: round_to(price_diff, 3),
                transport_cost: round_to(transport_cost, 3),
                net_profit_per_kwh: round_to(net_profit, 3),
                recommended_quantity: station.available_capacity.min(20.0),
                total_profit_estimate: round_to(net_profit * 20.0, 2),
            })
        })
        .collect();

    opportunities.sort_by(|a, b| b.net_profit_per_kwh.total_cmp(&a.net_profit_per_kwh));
    opportunities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_when_cheap_and_rising() {
        let decision = decide_trade(3.5, 4.5, 50.0, 20.0);
        assert_eq!(decision.action, TradeAction::Buy);
        assert_eq!(decision.quantity_kwh, 25.0);
        assert_eq!(decision.profit_estimate, 22.5);
        assert_eq!(decision.execution_time, ExecutionTime::WithinHour);
        assert_eq!(decision.risk_level, Some(RiskLevel::Low));
    }

    #[test]
    fn test_buy_is_urgent_below_three() {
        let decision = decide_trade(2.5, 4.0, 20.0, 10.0);
        assert_eq!(decision.action, TradeAction::Buy);
        assert_eq!(decision.quantity_kwh, 30.0);
        assert_eq!(decision.execution_time, ExecutionTime::Immediate);
    }

    #[test]
    fn test_sell_when_expensive_and_falling() {
        let decision = decide_trade(6.5, 5.0, 90.0, 30.0);
        assert_eq!(decision.action, TradeAction::Sell);
        assert_eq!(decision.quantity_kwh, 16.0);
        // 16 * 1.5 * 0.9
        assert_eq!(decision.profit_estimate, 21.6);
        assert_eq!(decision.execution_time, ExecutionTime::Immediate);
    }

    #[test]
    fn test_hold_otherwise() {
        let decision = decide_trade(3.5, 4.5, 75.0, 20.0);
        assert_eq!(decision.action, TradeAction::Hold);
        assert_eq!(decision.quantity_kwh, 0.0);
        assert_eq!(decision.profit_estimate, 0.0);
        assert_eq!(decision.risk_level, None);
    }

    #[test]
    fn test_price_categories() {
        assert_eq!(PriceCategory::of(3.49), PriceCategory::VeryLow);
        assert_eq!(PriceCategory::of(3.5), PriceCategory::Low);
        assert_eq!(PriceCategory::of(5.5), PriceCategory::High);
        assert_eq!(PriceCategory::of(7.0), PriceCategory::VeryHigh);
    }

    #[test]
    fn test_forecast_needs_future_hours() {
        assert!(decide_from_forecast(&[], &StationEnergyState::default()).is_err());
    }

    #[test]
    fn test_arbitrage_filters_and_sorts() {
        let nearby = vec![
            NearbyStation {
                id: "near-small-gap".to_string(),
                current_price: 5.4,
                distance_km: 1.0,
                available_capacity: 10.0,
            },
            NearbyStation {
                id: "cheap".to_string(),
                current_price: 3.0,
                distance_km: 2.0,
                available_capacity: 50.0,
            },
            NearbyStation {
                id: "expensive".to_string(),
                current_price: 6.5,
                distance_km: 3.0,
                available_capacity: 5.0,
            },
            NearbyStation {
                id: "too-far".to_string(),
                current_price: 9.0,
                distance_km: 12.0,
                available_capacity: 5.0,
            },
        ];
        let found = arbitrage_opportunities(5.0, &nearby);
        let ids: Vec<_> = found.iter().map(|o| o.station_id.as_str()).collect();
        assert_eq!(ids, vec!["cheap", "expensive"]);
        assert_eq!(found[0].action, ArbitrageAction::SellTo);
        assert_eq!(found[0].recommended_quantity, 20.0);
        assert_eq!(found[1].action, ArbitrageAction::BuyFrom);
    }
}
