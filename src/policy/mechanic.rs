//! Charger hardware health: failure probability and anomaly flag to a
//! maintenance action.

use serde::{Deserialize, Serialize};

use super::Decision;
use crate::model::Features;
use crate::risk::{classify, RiskLevel, FAILURE_BREAKPOINTS};

/// Live charger telemetry. Missing fields take nominal operating values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
    pub vibration: f64,
    /// Percent.
    pub humidity: f64,
    /// Percent.
    pub uptime: f64,
    pub error_rate: f64,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            voltage: 220.0,
            current: 30.0,
            vibration: 0.1,
            humidity: 45.0,
            uptime: 95.0,
            error_rate: 0.1,
        }
    }
}

impl SensorReading {
    pub fn features(&self) -> Features {
        Features::new()
            .with("temperature", self.temperature)
            .with("voltage", self.voltage)
            .with("current", self.current)
            .with("vibration", self.vibration)
            .with("humidity", self.humidity)
            .with("uptime", self.uptime)
            .with("error_rate", self.error_rate)
            .with("temp_voltage_ratio", self.temperature / self.voltage)
            .with("power", self.voltage * self.current)
            .with("uptime_error_ratio", self.uptime / (1.0 + self.error_rate))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanicAction {
    EmergencyShutdown,
    VoltageStabilization,
    PreventiveRestart,
    DiagnosticCheck,
    ScheduleMaintenance,
    Monitor,
}

impl MechanicAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MechanicAction::EmergencyShutdown => "emergency_shutdown",
            MechanicAction::VoltageStabilization => "voltage_stabilization",
            MechanicAction::PreventiveRestart => "preventive_restart",
            MechanicAction::DiagnosticCheck => "diagnostic_check",
            MechanicAction::ScheduleMaintenance => "schedule_maintenance",
            MechanicAction::Monitor => "monitor",
        }
    }
}

/// Raw outputs of the failure classifier and anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailureSignals {
    pub failure_probability: f64,
    /// Anomaly decision score; negative means anomalous.
    pub anomaly_score: f64,
}

impl FailureSignals {
    pub fn is_anomaly(&self) -> bool {
        self.anomaly_score < 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MechanicDecision {
    pub recommended_action: MechanicAction,
    pub failure_probability: f64,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision for MechanicDecision {
    fn recommended_action(&self) -> &'static str {
        self.recommended_action.as_str()
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

pub fn select_action(failure_probability: f64, is_anomaly: bool, reading: &SensorReading) -> MechanicAction {
    if failure_probability > 0.8 || is_anomaly {
        if reading.temperature > 60.0 {
            MechanicAction::EmergencyShutdown
        } else if reading.voltage < 180.0 {
            MechanicAction::VoltageStabilization
        } else {
            MechanicAction::PreventiveRestart
        }
    } else if failure_probability > 0.6 {
        MechanicAction::DiagnosticCheck
    } else if failure_probability > 0.4 {
        MechanicAction::ScheduleMaintenance
    } else {
        MechanicAction::Monitor
    }
}

pub fn decide(reading: &SensorReading, signals: &FailureSignals) -> MechanicDecision {
    let probability = signals.failure_probability;
    let is_anomaly = signals.is_anomaly();
    let action = select_action(probability, is_anomaly, reading);

    let reasoning = match action {
        MechanicAction::EmergencyShutdown => format!(
            "Failure risk {:.2} with temperature {:.1}C above 60C",
            probability, reading.temperature
        ),
        MechanicAction::VoltageStabilization => format!(
            "Failure risk {:.2} with voltage {:.1}V below 180V",
            probability, reading.voltage
        ),
        MechanicAction::PreventiveRestart => format!(
            "Failure risk {:.2}{} with sensors in range",
            probability,
            if is_anomaly { " and anomalous telemetry" } else { "" }
        ),
        MechanicAction::DiagnosticCheck | MechanicAction::ScheduleMaintenance => {
            format!("Elevated failure risk {:.2}", probability)
        }
        MechanicAction::Monitor => format!("Failure risk {:.2} within normal range", probability),
    };

    MechanicDecision {
        recommended_action: action,
        failure_probability: probability,
        anomaly_score: signals.anomaly_score,
        is_anomaly,
        risk_level: classify(probability, &FAILURE_BREAKPOINTS),
        confidence: probability.max(1.0 - probability),
        reasoning,
    }
}
