//! Seams to the collaborators the planner does not implement itself.
//!
//! The live routing network and the trained statistical models are both
//! black boxes; concrete adapters implement these traits.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, ProviderError};
use crate::geo::Coordinate;
use crate::model::{Features, Prediction};
use crate::polyline::Polyline;

/// One turn instruction of a live route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Maneuver, e.g. "turn left" or "depart".
    pub instruction: String,
    pub road_name: String,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// The primary route as reported by a live provider, in provider units.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub geometry: Option<Polyline>,
    pub steps: Vec<RouteStep>,
}

/// A live road-network routing service.
///
/// Implementations must bound every request with a timeout; the oracle
/// treats any `Err` as "provider unavailable" and falls back.
pub trait RouteProvider: Send + Sync {
    fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
        profile: &str,
    ) -> Result<ProviderRoute, ProviderError>;
}

/// A trained regressor, classifier or anomaly scorer.
///
/// Probabilities are reported in [0, 1]. Anomaly scorers report a decision
/// score where negative means anomalous.
pub trait PredictiveModel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether training/initialization has completed.
    fn is_ready(&self) -> bool {
        true
    }

    fn predict(&self, features: &Features) -> Prediction;

    /// Fits the model to `(features, target)` samples. A model that trains
    /// successfully is ready afterwards.
    fn train(&mut self, _dataset: &[(Features, f64)]) -> Result<(), PlannerError> {
        Err(PlannerError::TrainingUnsupported(self.name().to_string()))
    }
}
