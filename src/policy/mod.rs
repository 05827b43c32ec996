//! Rule engines that turn model outputs into discrete recommendations.
//!
//! Every policy here is a pure function of its inputs: model outputs come in
//! as plain numbers and "now" comes in as a timestamp, so the same inputs
//! always give the same decision.

pub mod audit;
pub mod energy;
pub mod logistics;
pub mod mechanic;
pub mod traffic;

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::PlannerError;

/// Common face of every domain decision.
pub trait Decision {
    fn recommended_action(&self) -> &'static str;
    fn confidence(&self) -> f64;
    fn reasoning(&self) -> &str;
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Position of `value` in a sorted category table, the way the models were
/// label-encoded at training time.
pub(crate) fn encode_label(field: &str, value: &str, labels: &[&str]) -> Result<f64, PlannerError> {
    labels
        .iter()
        .position(|label| *label == value)
        .map(|index| index as f64)
        .ok_or_else(|| PlannerError::InvalidInput(format!("unknown {} '{}'", field, value)))
}

/// `start` plus whole hours, or `None` past the end of the calendar.
pub(crate) fn hours_after(start: NaiveDateTime, hours: u32) -> Option<NaiveDateTime> {
    TimeDelta::try_hours(i64::from(hours)).and_then(|delta| start.checked_add_signed(delta))
}

/// `start` plus a travel time in minutes, rounded to the second. `None` for
/// non-finite or out-of-range durations.
pub(crate) fn minutes_after(start: NaiveDateTime, minutes: f64) -> Option<NaiveDateTime> {
    let seconds = (minutes * 60.0).round();
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_seconds(seconds as i64).and_then(|delta| start.checked_add_signed(delta))
}
