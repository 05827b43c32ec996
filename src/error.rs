//! Error types for planner operations and the live routing provider.

use thiserror::Error;

/// Input and service-level failures reported to the caller.
///
/// Routing-provider outages are not in here: the oracle degrades to a
/// fallback estimate instead of failing.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("No stops provided")]
    EmptyStops,

    #[error("No stations provided")]
    NoStationsProvided,

    #[error("No valid stations found")]
    NoValidStations,

    #[error("Invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Model for {0} is not ready")]
    ModelNotReady(&'static str),

    #[error("Model {0} does not support training")]
    TrainingUnsupported(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of a single live routing request.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned code {0}")]
    Status(String),

    #[error("Provider returned no routes")]
    NoRoutes,
}
