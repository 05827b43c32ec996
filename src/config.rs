//! Planner configuration: defaults, an optional JSON file, then environment
//! overrides.

use std::path::Path;

use serde::Deserialize;

use crate::error::PlannerError;
use crate::oracle::{OracleOptions, RouteOracle};
use crate::osrm::OsrmConfig;

pub const ENV_OSRM_URL: &str = "EV_PLANNER_OSRM_URL";
pub const ENV_OSRM_PROFILE: &str = "EV_PLANNER_OSRM_PROFILE";
pub const ENV_OSRM_TIMEOUT_SECS: &str = "EV_PLANNER_OSRM_TIMEOUT_SECS";
pub const ENV_CACHE_FALLBACK: &str = "EV_PLANNER_CACHE_FALLBACK";
pub const ENV_LOG: &str = "EV_PLANNER_LOG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub osrm: OsrmConfig,
    pub oracle: OracleOptions,
    pub log_level: String,
    /// Skip the live provider entirely and route on estimates.
    pub offline: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            oracle: OracleOptions::default(),
            log_level: "info".to_string(),
            offline: false,
        }
    }
}

impl PlannerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| PlannerError::Config(format!("{}: {}", path.display(), err)))?;
        serde_json::from_str(&raw)
            .map_err(|err| PlannerError::Config(format!("{}: {}", path.display(), err)))
    }

    /// Defaults with the process environment applied.
    pub fn from_env() -> Result<Self, PlannerError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// File (if given) or defaults, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, PlannerError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `EV_PLANNER_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), PlannerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_OSRM_URL) {
            self.osrm.base_url = url;
        }
        if let Some(profile) = lookup(ENV_OSRM_PROFILE) {
            self.osrm.profile = profile;
        }
        if let Some(raw) = lookup(ENV_OSRM_TIMEOUT_SECS) {
            self.osrm.timeout_secs = raw
                .trim()
                .parse()
                .map_err(|_| PlannerError::Config(format!("{} must be whole seconds, got '{}'", ENV_OSRM_TIMEOUT_SECS, raw)))?;
        }
        if let Some(raw) = lookup(ENV_CACHE_FALLBACK) {
            self.oracle.cache_fallback = parse_bool(&raw)
                .ok_or_else(|| PlannerError::Config(format!("{} must be a boolean, got '{}'", ENV_CACHE_FALLBACK, raw)))?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn build_oracle(&self) -> RouteOracle {
        if self.offline {
            RouteOracle::offline(self.oracle.clone()).with_default_profile(self.osrm.profile.clone())
        } else {
            RouteOracle::osrm(self.osrm.clone(), self.oracle.clone())
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.osrm.base_url, "http://router.project-osrm.org");
        assert_eq!(config.osrm.profile, "driving");
        assert_eq!(config.osrm.timeout_secs, 10);
        assert_eq!(config.oracle.fallback_speed_kmh, 25.0);
        assert!(config.oracle.cache_fallback);
    }

    #[test]
    fn test_overrides() {
        let mut config = PlannerConfig::default();
        config
            .apply_overrides(lookup(&[
                (ENV_OSRM_URL, "http://localhost:5000"),
                (ENV_OSRM_TIMEOUT_SECS, "3"),
                (ENV_CACHE_FALLBACK, "off"),
                (ENV_LOG, "debug"),
            ]))
            .unwrap();
        assert_eq!(config.osrm.base_url, "http://localhost:5000");
        assert_eq!(config.osrm.profile, "driving");
        assert_eq!(config.osrm.timeout_secs, 3);
        assert!(!config.oracle.cache_fallback);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = PlannerConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_OSRM_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, PlannerError::Config(_)));
    }

    #[test]
    fn test_partial_json() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"osrm": {"profile": "cycling"}, "offline": true}"#).unwrap();
        assert_eq!(config.osrm.profile, "cycling");
        assert_eq!(config.osrm.timeout_secs, 10);
        assert!(config.offline);
        assert_eq!(config.build_oracle().default_profile(), "cycling");
    }
}
