//! OSRM HTTP adapter for point-to-point routes.

use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::traits::{ProviderRoute, RouteProvider, RouteStep};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    /// Profile used when the caller does not name one.
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn route_url(&self, start: Coordinate, end: Coordinate, profile: &str) -> String {
        // OSRM wants lon,lat.
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=geojson&steps=true",
            self.config.base_url.trim_end_matches('/'),
            profile,
            start.lon,
            start.lat,
            end.lon,
            end.lat
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
        profile: &str,
    ) -> Result<ProviderRoute, ProviderError> {
        let url = self.route_url(start, end, profile);
        debug!(%url, "requesting OSRM route");

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())?;

        if body.code != "Ok" {
            return Err(ProviderError::Status(body.code));
        }

        let route = body
            .routes
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or(ProviderError::NoRoutes)?;

        Ok(route.into())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: Option<OsrmGeometry>,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
}

impl From<OsrmRoute> for ProviderRoute {
    fn from(route: OsrmRoute) -> Self {
        // Point-to-point requests have a single leg.
        let steps = route
            .legs
            .into_iter()
            .next()
            .map(|leg| leg.steps)
            .unwrap_or_default()
            .into_iter()
            .map(|step| RouteStep {
                instruction: match step.maneuver.modifier {
                    Some(modifier) => format!("{} {}", step.maneuver.kind, modifier),
                    None => step.maneuver.kind,
                },
                road_name: step.name,
                distance_m: step.distance,
                duration_s: step.duration,
            })
            .collect();

        ProviderRoute {
            distance_meters: route.distance,
            duration_seconds: route.duration,
            geometry: route
                .geometry
                .map(|geometry| Polyline::from_geojson(&geometry.coordinates)),
            steps,
        }
    }
}
