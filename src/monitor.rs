//! Per-model prediction counters.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::policy::round_to;

#[derive(Debug, Default)]
struct ModelStats {
    predictions: u64,
    total_seconds: f64,
    confidence_sum: f64,
    confidence_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub total_predictions: u64,
    /// Seconds, 4 dp.
    pub avg_execution_time: f64,
    /// 3 dp; `None` until a confidence has been logged.
    pub avg_confidence: Option<f64>,
}

/// Thread-safe tally of how often and how fast each model is called.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    stats: Mutex<HashMap<String, ModelStats>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_prediction(&self, model: &str, elapsed: Duration, confidence: Option<f64>) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(model.to_string()).or_default();
        entry.predictions += 1;
        entry.total_seconds += elapsed.as_secs_f64();
        if let Some(confidence) = confidence {
            entry.confidence_sum += confidence;
            entry.confidence_count += 1;
        }
    }

    pub fn report(&self, model: &str) -> Option<ModelReport> {
        self.stats.lock().get(model).map(Self::summarize)
    }

    /// Reports for every model seen so far, ordered by model name.
    pub fn reports(&self) -> Vec<(String, ModelReport)> {
        let stats = self.stats.lock();
        let mut reports: Vec<_> = stats
            .iter()
            .map(|(name, s)| (name.clone(), Self::summarize(s)))
            .collect();
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        reports
    }

    fn summarize(stats: &ModelStats) -> ModelReport {
        let avg_execution_time = if stats.predictions == 0 {
            0.0
        } else {
            stats.total_seconds / stats.predictions as f64
        };
        ModelReport {
            total_predictions: stats.predictions,
            avg_execution_time: round_to(avg_execution_time, 4),
            avg_confidence: (stats.confidence_count > 0)
                .then(|| round_to(stats.confidence_sum / stats.confidence_count as f64, 3)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_has_no_report() {
        assert!(PerformanceMonitor::new().report("failure").is_none());
    }

    #[test]
    fn test_averages() {
        let monitor = PerformanceMonitor::new();
        monitor.log_prediction("failure", Duration::from_millis(10), Some(0.9));
        monitor.log_prediction("failure", Duration::from_millis(30), Some(0.6));
        monitor.log_prediction("failure", Duration::from_millis(20), None);

        let report = monitor.report("failure").unwrap();
        assert_eq!(report.total_predictions, 3);
        assert_eq!(report.avg_execution_time, 0.02);
        assert_eq!(report.avg_confidence, Some(0.75));
    }

    #[test]
    fn test_confidence_absent_until_logged() {
        let monitor = PerformanceMonitor::new();
        monitor.log_prediction("wait", Duration::from_millis(1), None);
        monitor.log_prediction("demand", Duration::from_millis(1), None);
        assert_eq!(monitor.report("wait").unwrap().avg_confidence, None);
        let names: Vec<_> = monitor.reports().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["demand", "wait"]);
    }
}
