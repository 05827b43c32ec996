//! Test fixtures for ev-fleet-planner.
//!
//! Provides realistic test data including:
//! - Mumbai-area landmark coordinates used as charging-site locations
//! - Mock routing providers with known behaviour

#![allow(dead_code)]

pub mod mock_providers;
pub mod mumbai_locations;

pub use mock_providers::*;
pub use mumbai_locations::*;
