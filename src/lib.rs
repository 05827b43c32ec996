//! ev-fleet-planner core
//!
//! Routing, station ranking and decision policies for an EV charging fleet.

pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod monitor;
pub mod oracle;
pub mod osrm;
pub mod policy;
pub mod polyline;
pub mod risk;
pub mod route_risk;
pub mod scorer;
pub mod service;
pub mod solver;
pub mod telemetry;
pub mod traits;

pub use error::{PlannerError, ProviderError};
pub use geo::Coordinate;
pub use oracle::{OracleOptions, RouteOracle, RouteResult, RouteSource};
pub use service::Copilot;
