//! Audit trail analysis of decisions made by the other domains.

use std::collections::BTreeMap;
use std::io;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::ser::{Formatter, Serializer};
use sha2::{Digest, Sha256};

use super::{encode_label, round_to, Decision};
use crate::error::PlannerError;
use crate::model::Features;
use crate::risk::{classify, RiskLevel, AUDIT_BREAKPOINTS};

/// Agent labels in model encoding order.
const AGENT_LABELS: [&str; 4] = ["EnergyAgent", "LogisticsAgent", "MechanicAgent", "TrafficAgent"];
/// Action labels in model encoding order.
const ACTION_LABELS: [&str; 6] = [
    "dispatch_inventory",
    "emergency_shutdown",
    "price_adjustment",
    "reroute_traffic",
    "restart_charger",
    "trade_energy",
];

const FINDING_CONFIDENCE: f64 = 0.88;
const MIN_WINDOW_DECISIONS: usize = 5;

fn default_confidence_score() -> f64 {
    0.8
}

fn default_execution_time() -> f64 {
    1000.0
}

fn default_success_rate() -> f64 {
    0.9
}

fn default_user_satisfaction() -> f64 {
    0.8
}

fn default_risk_score() -> f64 {
    0.2
}

fn default_system_cpu() -> f64 {
    50.0
}

fn default_system_memory() -> f64 {
    60.0
}

fn default_api_calls() -> u32 {
    5
}

/// One logged decision. `agent` and `action` are required, everything else
/// falls back to a typical healthy value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub agent: String,
    pub action: String,
    #[serde(default = "default_confidence_score")]
    pub confidence_score: f64,
    /// Milliseconds.
    #[serde(default = "default_execution_time")]
    pub execution_time: f64,
    #[serde(default)]
    pub cost_impact: f64,
    #[serde(default)]
    pub revenue_impact: f64,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default = "default_user_satisfaction")]
    pub user_satisfaction: f64,
    #[serde(default = "default_risk_score")]
    pub risk_score: f64,
    #[serde(default)]
    pub human_override: bool,
    #[serde(default = "default_system_cpu")]
    pub system_cpu: f64,
    #[serde(default = "default_system_memory")]
    pub system_memory: f64,
    #[serde(default = "default_api_calls")]
    pub api_calls: u32,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl AuditRecord {
    pub fn new(agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: None,
            agent: agent.into(),
            action: action.into(),
            confidence_score: default_confidence_score(),
            execution_time: default_execution_time(),
            cost_impact: 0.0,
            revenue_impact: 0.0,
            success_rate: default_success_rate(),
            user_satisfaction: default_user_satisfaction(),
            risk_score: default_risk_score(),
            human_override: false,
            system_cpu: default_system_cpu(),
            system_memory: default_system_memory(),
            api_calls: default_api_calls(),
            timestamp: None,
        }
    }

    fn logged_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.timestamp.unwrap_or(now)
    }

    /// Model inputs. Hour and weekday come from the record timestamp, or
    /// from `now` for records logged without one.
    pub fn features(&self, now: NaiveDateTime) -> Result<Features, PlannerError> {
        let at = self.logged_at(now);
        Ok(Features::new()
            .with("agent", encode_label("agent", &self.agent, &AGENT_LABELS)?)
            .with("action", encode_label("action", &self.action, &ACTION_LABELS)?)
            .with("confidence_score", self.confidence_score)
            .with("execution_time", self.execution_time)
            .with("cost_impact", self.cost_impact)
            .with("revenue_impact", self.revenue_impact)
            .with("success_rate", self.success_rate)
            .with("user_satisfaction", self.user_satisfaction)
            .with("hour", f64::from(at.hour()))
            .with("day_of_week", f64::from(at.weekday().num_days_from_monday()))
            .with("risk_score", self.risk_score)
            .with("human_override", if self.human_override { 1.0 } else { 0.0 })
            .with("system_cpu", self.system_cpu)
            .with("system_memory", self.system_memory)
            .with("api_calls", f64::from(self.api_calls))
            .with("net_impact", self.revenue_impact + self.cost_impact)
            .with(
                "efficiency_score",
                self.success_rate / (self.execution_time / 1000.0 + 1.0),
            )
            .with("resource_usage", (self.system_cpu + self.system_memory) / 2.0)
            .with(
                "risk_confidence_ratio",
                self.risk_score / (self.confidence_score + 0.01),
            ))
    }
}

/// Sorted-key JSON with `", "` and `": "` separators, the layout audit
/// trails have always been hashed in.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

fn canonical_json(record: &AuditRecord) -> Vec<u8> {
    // serde_json::Value maps are ordered by key.
    let identity = json!({
        "agent": record.agent,
        "action": record.action,
        "timestamp": record.timestamp,
        "confidence": record.confidence_score,
        "cost_impact": record.cost_impact,
    });
    let mut out = Vec::new();
    // A Value always serializes into memory.
    let _ = identity.serialize(&mut Serializer::with_formatter(&mut out, SpacedFormatter));
    out
}

/// SHA-256 hex digest over the canonical JSON of the fields that identify a
/// decision: agent, action, timestamp, confidence and cost impact.
///
/// Numbers are written the way serde_json writes an `f64`, so a whole cost
/// impact appears as `-500.0`; timestamps use ISO 8601 without a zone.
pub fn audit_hash(record: &AuditRecord) -> String {
    Sha256::digest(canonical_json(record))
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    FlagForReview,
    ImmediateEscalation,
    ComplianceReview,
    GenerateIncidentReport,
    FinancialAudit,
    ModelReview,
    RoutineLogging,
}

impl RequiredAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredAction::FlagForReview => "flag_for_review",
            RequiredAction::ImmediateEscalation => "immediate_escalation",
            RequiredAction::ComplianceReview => "compliance_review",
            RequiredAction::GenerateIncidentReport => "generate_incident_report",
            RequiredAction::FinancialAudit => "financial_audit",
            RequiredAction::ModelReview => "model_review",
            RequiredAction::RoutineLogging => "routine_logging",
        }
    }
}

/// Never empty: a clean record still gets routine logging.
pub fn required_actions(is_anomaly: bool, is_violation: bool, record: &AuditRecord) -> Vec<RequiredAction> {
    let mut actions = Vec::new();
    if is_anomaly {
        actions.push(RequiredAction::FlagForReview);
        if record.risk_score > 0.7 {
            actions.push(RequiredAction::ImmediateEscalation);
        }
    }
    if is_violation {
        actions.push(RequiredAction::ComplianceReview);
        actions.push(RequiredAction::GenerateIncidentReport);
        if record.cost_impact < -5000.0 {
            actions.push(RequiredAction::FinancialAudit);
        }
    }
    if record.confidence_score < 0.3 {
        actions.push(RequiredAction::ModelReview);
    }
    if actions.is_empty() {
        actions.push(RequiredAction::RoutineLogging);
    }
    actions
}

/// Raw outputs of the audit anomaly detector and compliance classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditSignals {
    /// Negative means anomalous.
    pub anomaly_score: f64,
    pub compliance_probability: f64,
}

impl AuditSignals {
    pub fn is_anomaly(&self) -> bool {
        self.anomaly_score < 0.0
    }

    pub fn is_violation(&self) -> bool {
        self.compliance_probability > 0.5
    }

    pub fn combined_risk(&self) -> f64 {
        let normalized_anomaly = (-self.anomaly_score / 2.0).max(0.0);
        (normalized_anomaly + self.compliance_probability) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditFinding {
    pub anomaly_detected: bool,
    pub anomaly_score: f64,
    pub compliance_violation: bool,
    pub violation_probability: f64,
    pub audit_hash: String,
    pub risk_level: RiskLevel,
    pub required_actions: Vec<RequiredAction>,
    pub audit_timestamp: NaiveDateTime,
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision for AuditFinding {
    /// The first required action is the most pressing one.
    fn recommended_action(&self) -> &'static str {
        self.required_actions
            .first()
            .map_or(RequiredAction::RoutineLogging.as_str(), RequiredAction::as_str)
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

pub fn analyze(record: &AuditRecord, signals: &AuditSignals, now: NaiveDateTime) -> AuditFinding {
    let is_anomaly = signals.is_anomaly();
    let is_violation = signals.is_violation();
    let risk_level = classify(signals.combined_risk(), &AUDIT_BREAKPOINTS);

    AuditFinding {
        anomaly_detected: is_anomaly,
        anomaly_score: signals.anomaly_score,
        compliance_violation: is_violation,
        violation_probability: signals.compliance_probability,
        audit_hash: audit_hash(record),
        risk_level,
        required_actions: required_actions(is_anomaly, is_violation, record),
        audit_timestamp: now,
        confidence: FINDING_CONFIDENCE,
        reasoning: format!(
            "{} {}: anomaly score {:.3}, violation probability {:.3}, {} risk",
            record.agent, record.action, signals.anomaly_score, signals.compliance_probability, risk_level
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub decision_id: Option<String>,
    pub analysis: AuditFinding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_decisions: usize,
    pub anomalies_detected: usize,
    pub compliance_violations: usize,
    pub anomaly_rate: f64,
    pub violation_rate: f64,
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub requires_immediate_attention: usize,
}

pub fn batch_summary(entries: &[BatchEntry]) -> BatchSummary {
    let total = entries.len();
    let anomalies = entries.iter().filter(|e| e.analysis.anomaly_detected).count();
    let violations = entries.iter().filter(|e| e.analysis.compliance_violation).count();

    let mut risk_distribution = BTreeMap::new();
    for entry in entries {
        *risk_distribution.entry(entry.analysis.risk_level).or_insert(0) += 1;
    }

    let rate = |count: usize| {
        if total == 0 {
            0.0
        } else {
            round_to(count as f64 / total as f64, 3)
        }
    };

    BatchSummary {
        total_decisions: total,
        anomalies_detected: anomalies,
        compliance_violations: violations,
        anomaly_rate: rate(anomalies),
        violation_rate: rate(violations),
        risk_distribution,
        requires_immediate_attention: anomalies + violations,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchAudit {
    pub individual_results: Vec<BatchEntry>,
    pub batch_summary: BatchSummary,
    pub total_analyzed: usize,
}

impl BatchAudit {
    pub fn new(individual_results: Vec<BatchEntry>) -> Self {
        Self {
            batch_summary: batch_summary(&individual_results),
            total_analyzed: individual_results.len(),
            individual_results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    HighDecisionVolume,
    LowConfidencePattern,
    HighCostImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAnomaly {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub severity: RiskLevel,
    pub description: String,
    pub window_start: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    pub pattern_anomalies: Vec<PatternAnomaly>,
    pub total_windows_analyzed: usize,
    pub anomaly_count: usize,
}

fn window_start(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_hms_opt(at.hour(), 0, 0).unwrap_or(at)
}

/// Groups decisions into clock-hour windows and flags windows whose volume,
/// average confidence or total cost look wrong. Windows with fewer than five
/// decisions are not judged.
pub fn pattern_anomalies(history: &[AuditRecord], now: NaiveDateTime) -> PatternReport {
    let mut windows: BTreeMap<NaiveDateTime, Vec<&AuditRecord>> = BTreeMap::new();
    for record in history {
        windows
            .entry(window_start(record.logged_at(now)))
            .or_default()
            .push(record);
    }

    let mut found = Vec::new();
    for (start, decisions) in &windows {
        let count = decisions.len();
        if count < MIN_WINDOW_DECISIONS {
            continue;
        }
        let avg_confidence =
            decisions.iter().map(|d| d.confidence_score).sum::<f64>() / count as f64;
        let total_cost: f64 = decisions.iter().map(|d| d.cost_impact).sum();

        if count > 50 {
            found.push(PatternAnomaly {
                kind: PatternKind::HighDecisionVolume,
                severity: RiskLevel::Medium,
                description: format!("Unusually high decision volume: {}", count),
                window_start: *start,
            });
        }
        if avg_confidence < 0.5 {
            found.push(PatternAnomaly {
                kind: PatternKind::LowConfidencePattern,
                severity: RiskLevel::High,
                description: format!("Consistently low confidence: {:.3}", avg_confidence),
                window_start: *start,
            });
        }
        if total_cost < -10000.0 {
            found.push(PatternAnomaly {
                kind: PatternKind::HighCostImpact,
                severity: RiskLevel::Critical,
                description: format!("High negative cost impact: ₹{}", total_cost),
                window_start: *start,
            });
        }
    }

    PatternReport {
        anomaly_count: found.len(),
        pattern_anomalies: found,
        total_windows_analyzed: windows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_clean_record_gets_routine_logging() {
        let record = AuditRecord::new("MechanicAgent", "restart_charger");
        assert_eq!(
            required_actions(false, false, &record),
            vec![RequiredAction::RoutineLogging]
        );
    }

    #[test]
    fn test_escalation_requires_anomaly() {
        let record = AuditRecord {
            risk_score: 0.9,
            cost_impact: -8000.0,
            confidence_score: 0.15,
            ..AuditRecord::new("EnergyAgent", "trade_energy")
        };
        assert_eq!(
            required_actions(false, false, &record),
            vec![RequiredAction::ModelReview]
        );
        assert_eq!(
            required_actions(true, true, &record),
            vec![
                RequiredAction::FlagForReview,
                RequiredAction::ImmediateEscalation,
                RequiredAction::ComplianceReview,
                RequiredAction::GenerateIncidentReport,
                RequiredAction::FinancialAudit,
                RequiredAction::ModelReview,
            ]
        );
    }

    #[test]
    fn test_combined_risk_levels() {
        let quiet = AuditSignals {
            anomaly_score: 0.1,
            compliance_probability: 0.2,
        };
        assert_eq!(classify(quiet.combined_risk(), &AUDIT_BREAKPOINTS), RiskLevel::Low);

        // (max(0, 1.0) + 0.9) / 2 = 0.95
        let loud = AuditSignals {
            anomaly_score: -2.0,
            compliance_probability: 0.9,
        };
        assert!(loud.is_anomaly());
        assert!(loud.is_violation());
        assert_eq!(classify(loud.combined_risk(), &AUDIT_BREAKPOINTS), RiskLevel::Critical);
    }

    #[test]
    fn test_canonical_json_layout() {
        let record = AuditRecord {
            timestamp: Some(at("2024-03-04 08:15:00")),
            cost_impact: -500.0,
            ..AuditRecord::new("EnergyAgent", "trade_energy")
        };
        let expected = r#"{"action": "trade_energy", "agent": "EnergyAgent", "confidence": 0.8, "cost_impact": -500.0, "timestamp": "2024-03-04T08:15:00"}"#;
        assert_eq!(String::from_utf8(canonical_json(&record)).unwrap(), expected);

        let digest: String = Sha256::digest(expected.as_bytes())
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect();
        assert_eq!(audit_hash(&record), digest);

        let untimed = AuditRecord::new("EnergyAgent", "trade_energy");
        assert!(String::from_utf8(canonical_json(&untimed)).unwrap().ends_with(r#""timestamp": null}"#));
    }

    #[test]
    fn test_hash_is_stable_and_field_sensitive() {
        let record = AuditRecord {
            timestamp: Some(at("2024-03-04 08:15:00")),
            ..AuditRecord::new("MechanicAgent", "restart_charger")
        };
        let hash = audit_hash(&record);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, audit_hash(&record.clone()));

        let costlier = AuditRecord {
            cost_impact: -1.0,
            ..record.clone()
        };
        assert_ne!(hash, audit_hash(&costlier));

        // Fields outside the identity set do not change the hash.
        let busier = AuditRecord {
            system_cpu: 99.0,
            ..record
        };
        assert_eq!(hash, audit_hash(&busier));
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let record = AuditRecord::new("BillingAgent", "restart_charger");
        assert!(record.features(at("2024-03-04 08:00:00")).is_err());
    }

    #[test]
    fn test_pattern_windows() {
        let mut history = Vec::new();
        for minute in 0..6 {
            history.push(AuditRecord {
                confidence_score: 0.3,
                cost_impact: -2000.0,
                timestamp: Some(at(&format!("2024-03-04 10:{:02}:00", minute * 5))),
                ..AuditRecord::new("EnergyAgent", "trade_energy")
            });
        }
        // A sparse window is counted but never judged.
        for minute in 0..3 {
            history.push(AuditRecord {
                confidence_score: 0.1,
                timestamp: Some(at(&format!("2024-03-04 11:{:02}:00", minute))),
                ..AuditRecord::new("EnergyAgent", "trade_energy")
            });
        }

        let report = pattern_anomalies(&history, at("2024-03-04 12:00:00"));
        assert_eq!(report.total_windows_analyzed, 2);
        let kinds: Vec<_> = report.pattern_anomalies.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![PatternKind::LowConfidencePattern, PatternKind::HighCostImpact]
        );
        assert_eq!(report.pattern_anomalies[0].window_start, at("2024-03-04 10:00:00"));
    }

    #[test]
    fn test_batch_summary_rates() {
        let now = at("2024-03-04 12:00:00");
        let record = AuditRecord::new("TrafficAgent", "reroute_traffic");
        let clean = AuditSignals {
            anomaly_score: 0.2,
            compliance_probability: 0.1,
        };
        let flagged = AuditSignals {
            anomaly_score: -0.5,
            compliance_probability: 0.7,
        };
        let entries: Vec<_> = [clean, clean, flagged]
            .iter()
            .map(|signals| BatchEntry {
                decision_id: None,
                analysis: analyze(&record, signals, now),
            })
            .collect();

        let batch = BatchAudit::new(entries);
        assert_eq!(batch.total_analyzed, 3);
        assert_eq!(batch.batch_summary.anomalies_detected, 1);
        assert_eq!(batch.batch_summary.anomaly_rate, 0.333);
        assert_eq!(batch.batch_summary.requires_immediate_attention, 2);
        // flagged: (0.25 + 0.7) / 2 = 0.475
        assert_eq!(batch.batch_summary.risk_distribution.get(&RiskLevel::Low), Some(&2));
        assert_eq!(batch.batch_summary.risk_distribution.get(&RiskLevel::Medium), Some(&1));
    }
}
