//! The decision-support service: one model per role, one shared oracle.
//!
//! Each domain call checks its models are ready, scores the request, times
//! the work in the [`PerformanceMonitor`] and hands the numbers to the pure
//! policy in [`crate::policy`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime, Timelike};
use rand::Rng;
use tracing::debug;

use crate::error::PlannerError;
use crate::geo::Coordinate;
use crate::monitor::PerformanceMonitor;
use crate::oracle::{RouteOracle, RouteResult};
use crate::policy::audit::{self, AuditFinding, AuditRecord, AuditSignals, BatchAudit, BatchEntry, PatternReport};
use crate::policy::energy::{self, MarketConditions, PriceForecast, StationEnergyState, TradingDecision};
use crate::policy::logistics::{self, DispatchDecision, StationInventory, StockoutForecast, Vehicle};
use crate::policy::mechanic::{self, FailureSignals, MechanicDecision, SensorReading};
use crate::policy::traffic::{self, IncentiveDecision, StationContext, TrafficForecast, UserProfile};
use crate::policy::Decision;
use crate::route_risk::{self, RouteRiskAssessment, TrafficConditions};
use crate::scorer::{self, ScoringWeights, StationCandidate, StationRanking};
use crate::solver::{self, AlternativeRoute, MultiStopPlan};
use crate::traits::PredictiveModel;

pub const DEFAULT_TRAFFIC_HOURS: u32 = 4;
pub const DEFAULT_STOCKOUT_HOURS: u32 = 6;
pub const DISPATCH_HORIZON_HOURS: u32 = 8;
pub const PRICE_HORIZON_HOURS: u32 = 8;
/// Extra driving assumed when the alternative station does not say.
pub const DEFAULT_EXTRA_DISTANCE_KM: f64 = 2.0;

/// Source of "now" for forecasts and audit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always the same instant.
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// One model per prediction role.
pub struct DomainModels {
    /// Charger failure probability.
    pub failure: Box<dyn PredictiveModel>,
    /// Charger telemetry anomaly score.
    pub charger_anomaly: Box<dyn PredictiveModel>,
    pub station_demand: Box<dyn PredictiveModel>,
    /// Minutes.
    pub wait_time: Box<dyn PredictiveModel>,
    pub stockout: Box<dyn PredictiveModel>,
    pub dispatch_quantity: Box<dyn PredictiveModel>,
    /// Per kWh.
    pub energy_price: Box<dyn PredictiveModel>,
    pub energy_demand: Box<dyn PredictiveModel>,
    /// Probability of a compliance violation.
    pub compliance: Box<dyn PredictiveModel>,
    pub audit_anomaly: Box<dyn PredictiveModel>,
}

fn ensure_ready(domain: &'static str, models: &[&dyn PredictiveModel]) -> Result<(), PlannerError> {
    if models.iter().all(|model| model.is_ready()) {
        Ok(())
    } else {
        Err(PlannerError::ModelNotReady(domain))
    }
}

pub struct Copilot {
    models: DomainModels,
    oracle: Arc<RouteOracle>,
    monitor: PerformanceMonitor,
    clock: Box<dyn Clock>,
}

impl Copilot {
    pub fn new(models: DomainModels, oracle: Arc<RouteOracle>) -> Self {
        Self {
            models,
            oracle,
            monitor: PerformanceMonitor::new(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn oracle(&self) -> &RouteOracle {
        &self.oracle
    }

    /// Models are trained in place, e.g. once data arrives after start-up.
    pub fn models_mut(&mut self) -> &mut DomainModels {
        &mut self.models
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    // Mechanic

    pub fn diagnose(&self, reading: &SensorReading) -> Result<MechanicDecision, PlannerError> {
        let models = &self.models;
        ensure_ready("mechanic", &[models.failure.as_ref(), models.charger_anomaly.as_ref()])?;

        let started = Instant::now();
        let features = reading.features();
        let signals = FailureSignals {
            failure_probability: models.failure.predict(&features).value,
            anomaly_score: models.charger_anomaly.predict(&features).value,
        };
        let decision = mechanic::decide(reading, &signals);

        self.monitor
            .log_prediction(models.failure.name(), started.elapsed(), Some(decision.confidence));
        debug!(
            action = decision.recommended_action(),
            risk = %decision.risk_level,
            "mechanic decision"
        );
        Ok(decision)
    }

    // Traffic

    pub fn traffic_forecast(
        &self,
        station: &StationContext,
        hours: u32,
    ) -> Result<Vec<TrafficForecast>, PlannerError> {
        let models = &self.models;
        ensure_ready("traffic", &[models.station_demand.as_ref(), models.wait_time.as_ref()])?;

        let started = Instant::now();
        let forecasts = traffic::forecast(
            models.station_demand.as_ref(),
            models.wait_time.as_ref(),
            station,
            self.now(),
            hours,
        )?;
        self.monitor
            .log_prediction(models.station_demand.name(), started.elapsed(), None);
        Ok(forecasts)
    }

    /// Incentive for moving a driver from `current` to `alternative`, using
    /// the predicted wait at each station right now.
    pub fn incentive(
        &self,
        current: &StationContext,
        alternative: &StationContext,
        profile: &UserProfile,
    ) -> Result<IncentiveDecision, PlannerError> {
        let wait_model = self.models.wait_time.as_ref();
        ensure_ready("traffic", &[wait_model])?;

        let started = Instant::now();
        let now = self.now();
        let wait_current = wait_model.predict(&current.features(now)?).value.max(0.0);
        let wait_alternative = wait_model.predict(&alternative.features(now)?).value.max(0.0);
        let extra_distance = alternative.distance_km.unwrap_or(DEFAULT_EXTRA_DISTANCE_KM);

        let decision = traffic::calculate_incentive(wait_current, wait_alternative, extra_distance, profile);
        self.monitor
            .log_prediction(wait_model.name(), started.elapsed(), Some(decision.confidence));
        debug!(
            incentive = decision.recommended_incentive,
            kind = decision.recommended_action(),
            "incentive decision"
        );
        Ok(decision)
    }

    // Logistics

    pub fn stockout_forecast(
        &self,
        station: &StationInventory,
        hours: u32,
    ) -> Result<Vec<StockoutForecast>, PlannerError> {
        let models = &self.models;
        ensure_ready("logistics", &[models.stockout.as_ref(), models.dispatch_quantity.as_ref()])?;

        let started = Instant::now();
        let forecasts = logistics::forecast_stockout(
            models.stockout.as_ref(),
            models.dispatch_quantity.as_ref(),
            station,
            self.now(),
            hours,
        );
        self.monitor.log_prediction(models.stockout.name(), started.elapsed(), None);
        Ok(forecasts)
    }

    pub fn plan_dispatch(
        &self,
        station: &StationInventory,
        vehicles: &[Vehicle],
    ) -> Result<DispatchDecision, PlannerError> {
        let forecasts = self.stockout_forecast(station, DISPATCH_HORIZON_HOURS)?;
        let decision = logistics::plan_dispatch(&forecasts, vehicles, self.now());
        debug!(
            action = decision.recommended_action(),
            urgency = %decision.urgency,
            quantity = decision.recommended_quantity,
            "dispatch decision"
        );
        Ok(decision)
    }

    // Energy

    pub fn price_forecast(
        &self,
        market: &MarketConditions,
        hours: u32,
    ) -> Result<Vec<PriceForecast>, PlannerError> {
        let models = &self.models;
        ensure_ready("energy", &[models.energy_price.as_ref(), models.energy_demand.as_ref()])?;

        let started = Instant::now();
        let forecasts = energy::forecast_prices(
            models.energy_price.as_ref(),
            models.energy_demand.as_ref(),
            market,
            self.now(),
            hours,
        );
        self.monitor
            .log_prediction(models.energy_price.name(), started.elapsed(), None);
        Ok(forecasts)
    }

    pub fn trading_decision(
        &self,
        market: &MarketConditions,
        station: &StationEnergyState,
    ) -> Result<TradingDecision, PlannerError> {
        let forecasts = self.price_forecast(market, PRICE_HORIZON_HOURS)?;
        let decision = energy::decide_from_forecast(&forecasts, station)?;
        debug!(
            action = decision.recommended_action(),
            quantity = decision.quantity_kwh,
            "trading decision"
        );
        Ok(decision)
    }

    // Audit

    pub fn audit(&self, record: &AuditRecord) -> Result<AuditFinding, PlannerError> {
        let models = &self.models;
        ensure_ready("audit", &[models.audit_anomaly.as_ref(), models.compliance.as_ref()])?;

        let started = Instant::now();
        let now = self.now();
        let features = record.features(now)?;
        let signals = AuditSignals {
            anomaly_score: models.audit_anomaly.predict(&features).value,
            compliance_probability: models.compliance.predict(&features).value,
        };
        let finding = audit::analyze(record, &signals, now);

        self.monitor
            .log_prediction(models.compliance.name(), started.elapsed(), Some(finding.confidence));
        debug!(
            agent = %record.agent,
            risk = %finding.risk_level,
            action = finding.recommended_action(),
            "audit finding"
        );
        Ok(finding)
    }

    /// Audits every record; the first unscorable record fails the batch.
    pub fn audit_batch(&self, records: &[AuditRecord]) -> Result<BatchAudit, PlannerError> {
        let entries = records
            .iter()
            .map(|record| {
                Ok(BatchEntry {
                    decision_id: record.id.clone(),
                    analysis: self.audit(record)?,
                })
            })
            .collect::<Result<Vec<_>, PlannerError>>()?;
        Ok(BatchAudit::new(entries))
    }

    pub fn pattern_anomalies(&self, history: &[AuditRecord]) -> PatternReport {
        audit::pattern_anomalies(history, self.now())
    }

    // Routing

    pub fn route(&self, start: Coordinate, end: Coordinate) -> RouteResult {
        self.oracle.route_default(start, end)
    }

    pub fn multi_stop(
        &self,
        start: Coordinate,
        stops: &[Coordinate],
        end: Option<Coordinate>,
    ) -> Result<MultiStopPlan, PlannerError> {
        solver::optimize_multi_stop(&self.oracle, start, stops, end)
    }

    pub fn alternatives<R: Rng + ?Sized>(
        &self,
        start: Coordinate,
        end: Coordinate,
        count: usize,
        rng: &mut R,
    ) -> Vec<AlternativeRoute> {
        solver::alternative_routes(&self.oracle, start, end, count, rng)
    }

    pub fn rank_stations(
        &self,
        user_location: Coordinate,
        candidates: &[StationCandidate],
        weights: &ScoringWeights,
    ) -> Result<StationRanking, PlannerError> {
        scorer::rank_stations(&self.oracle, user_location, candidates, weights)
    }

    /// Risk of driving `start` to `end` now, in the given weather.
    pub fn route_risk(&self, start: Coordinate, end: Coordinate, weather: Option<&str>) -> RouteRiskAssessment {
        let route = self.route(start, end);
        route_risk::assess(&route, weather, self.now().hour())
    }

    /// Simulated traffic along `path` at the current hour.
    pub fn traffic_conditions<R: Rng + ?Sized>(&self, path: &[Coordinate], rng: &mut R) -> TrafficConditions {
        route_risk::traffic_conditions(path, self.now(), rng)
    }
}
