//! Session state threaded through the workflow stages
//!
//! Write-sets, one owner per field:
//!
//! | stage     | writes                                                        |
//! |-----------|---------------------------------------------------------------|
//! | perceive  | `signals`, `risk_score`, `risk_level`, `anomalies`, `requires_escalation` |
//! | plan      | `tasks`, `advisories`                                         |
//! | act       | `executed`, `pending`                                         |
//! | learn     | `learning`, `metrics`                                         |
//! | supervise | `iteration`, `status`                                         |
//! | engine    | `status` (cancel/fail/resume), `human_decision`               |
//!
//! Every stage appends exactly one entry to `audit_log`.

use super::advisory::Advisory;
use super::signals::SignalSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Perceive,
    Plan,
    Act,
    Learn,
    Supervise,
}

impl Stage {
    pub const PIPELINE: [Stage; 5] = [
        Stage::Perceive,
        Stage::Plan,
        Stage::Act,
        Stage::Learn,
        Stage::Supervise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perceive => "perceive",
            Self::Plan => "plan",
            Self::Act => "act",
            Self::Learn => "learn",
            Self::Supervise => "supervise",
        }
    }

    /// Name recorded as the audit entry's agent.
    pub fn agent(&self) -> &'static str {
        match self {
            Self::Perceive => "Perceptor",
            Self::Plan => "Planner",
            Self::Act => "Executor",
            Self::Learn => "Learner",
            Self::Supervise => "Supervisor",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    /// Halted until an explicit human decision
    Escalated,
    Done,
    Cancelled,
    Failed,
}

impl SessionStatus {
    /// No further stage may touch a session in a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// `low <50`, `moderate 50–69`, `high 70–84`, `critical ≥85`
    pub fn classify(score: u32) -> Self {
        if score >= 85 {
            Self::Critical
        } else if score >= 70 {
            Self::High
        } else if score >= 50 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// A signal at or above one of its thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub signal: String,
    pub value: f64,
    pub unit: String,
    /// The threshold that was breached
    pub threshold: f64,
    pub severity: Severity,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Alert,
    Report,
    EquipmentControl,
    Escalate,
    UpdateKnowledgeBase,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "send_alert",
            Self::Report => "generate_report",
            Self::EquipmentControl => "control_equipment",
            Self::Escalate => "request_human_decision",
            Self::UpdateKnowledgeBase => "update_knowledge_graph",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 1-based position in the plan
    pub step: usize,
    /// 0 is most urgent
    pub priority: u8,
    pub kind: ActionKind,
    pub description: String,
    pub params: Map<String, Value>,
    /// Requires human confirmation; never executed by Act
    pub gated: bool,
}

impl Task {
    pub fn priority_label(&self) -> String {
        format!("P{}", self.priority)
    }
}

/// Result map returned by an action handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionResult {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            timestamp: Utc::now(),
            fields: Map::new(),
        }
    }

    pub fn success() -> Self {
        Self::new("success")
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Only `status` is inspected; `failed` and `error` count as failure.
    pub fn is_success(&self) -> bool {
        !matches!(self.status.as_str(), "failed" | "error")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub task: Task,
    pub success: bool,
    pub result: Option<ActionResult>,
    /// Set when the handler was missing or returned an error
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Learning record derived from one executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub action: ActionKind,
    pub risk_score: u32,
    pub anomalies_count: usize,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
}

/// Per-cycle session metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub iteration: u32,
    pub risk_score: u32,
    pub anomalies_detected: usize,
    pub actions_executed: usize,
    pub actions_failed: usize,
    pub escalations: u32,
    /// 4 = full autonomy; 3 when the cycle escalated
    pub autonomy_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub agent: String,
    pub action: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

/// An operator's answer to an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanDecision {
    /// Continue as if the escalation had been answered
    Acknowledged,
    /// Stop the session
    Halt,
}

/// The unit of work for the workflow engine.
///
/// Owned by exactly one running engine call at a time; stages borrow it
/// mutably in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    /// Twin updated when the session completes
    pub twin_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,

    pub signals: SignalSnapshot,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub anomalies: Vec<Anomaly>,
    pub requires_escalation: bool,

    pub tasks: Vec<Task>,
    pub advisories: Vec<Advisory>,

    pub executed: Vec<ExecutedAction>,
    pub pending: Vec<Task>,

    pub learning: Vec<LearningRecord>,
    pub metrics: Vec<SessionMetrics>,

    pub iteration: u32,
    pub human_decision: Option<HumanDecision>,
    pub audit_log: Vec<AuditEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            twin_id: None,
            status: SessionStatus::Running,
            started_at: Utc::now(),
            signals: SignalSnapshot::new(),
            risk_score: 0,
            risk_level: RiskLevel::Low,
            anomalies: Vec::new(),
            requires_escalation: false,
            tasks: Vec::new(),
            advisories: Vec::new(),
            executed: Vec::new(),
            pending: Vec::new(),
            learning: Vec::new(),
            metrics: Vec::new(),
            iteration: 0,
            human_decision: None,
            audit_log: Vec::new(),
        }
    }

    pub fn for_twin(mut self, twin_id: impl Into<String>) -> Self {
        self.twin_id = Some(twin_id.into());
        self
    }

    pub fn audit(&mut self, agent: &str, action: &str, details: Value) {
        self.audit_log.push(AuditEntry {
            agent: agent.to_string(),
            action: action.to_string(),
            details,
            timestamp: Utc::now(),
        });
    }

    /// An escalation is outstanding when flagged and not yet answered.
    pub fn awaiting_decision(&self) -> bool {
        self.requires_escalation && self.human_decision.is_none()
    }

    /// Executed actions over planned tasks, for the latest cycle.
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.executed.iter().filter(|a| a.success).count();
        succeeded as f64 / self.tasks.len().max(1) as f64
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(RiskLevel::classify(0), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(49), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(50), RiskLevel::Moderate);
        assert_eq!(RiskLevel::classify(69), RiskLevel::Moderate);
        assert_eq!(RiskLevel::classify(70), RiskLevel::High);
        assert_eq!(RiskLevel::classify(84), RiskLevel::High);
        assert_eq!(RiskLevel::classify(85), RiskLevel::Critical);
        assert_eq!(RiskLevel::classify(100), RiskLevel::Critical);
    }

    #[test]
    fn new_session_starts_empty() {
        let state = SessionState::new();
        assert_eq!(state.iteration, 0);
        assert_eq!(state.status, SessionStatus::Running);
        assert!(state.audit_log.is_empty());
        assert!(state.tasks.is_empty());
        assert!(!state.awaiting_decision());
    }

    #[test]
    fn failed_or_error_status_is_failure() {
        assert!(ActionResult::success().is_success());
        assert!(ActionResult::new("sent").is_success());
        assert!(!ActionResult::new("failed").is_success());
        assert!(!ActionResult::new("error").is_success());
    }

    #[test]
    fn action_result_flattens_fields() {
        let result = ActionResult::success().with_field("alert_id", "ALT-1");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["alert_id"], "ALT-1");
        assert!(json.get("timestamp").is_some());
    }
}
