//! Monitoring workflow: a bounded Perceive → Plan → Act → Learn → Supervise
//! loop over one session state, with escalation to a human.

mod actions;
mod advisory;
mod cancel;
mod engine;
mod signals;
mod stages;
mod state;

pub use actions::{
    ActionDispatcher, ActionError, ActionHandler, EquipmentLogHandler, GraphUpdateHandler,
    LogAlertHandler, LogReportHandler,
};
pub use advisory::{Advisory, RecommendError, Recommender, RuleBasedRecommender};
pub use cancel::CancellationToken;
pub use engine::WorkflowEngine;
pub use signals::{
    plant_floor, score_signals, Assessment, ScriptedSignals, Signal, SignalError, SignalSnapshot,
    SignalSource, StaticSignals, CRITICAL_SCORE, NOMINAL_SCORE, WARNING_SCORE,
};
pub use stages::Route;
pub use state::{
    ActionKind, ActionResult, Anomaly, AuditEntry, ExecutedAction, HumanDecision, LearningRecord,
    RiskLevel, SessionMetrics, SessionState, SessionStatus, Severity, Stage, Task,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The session stopped in `stage`; `state` holds everything written so
    /// far, audit log included.
    #[error("{stage} stage failed: {cause}")]
    StageFailure {
        stage: Stage,
        cause: String,
        state: Box<SessionState>,
    },

    #[error("session {0} is awaiting a human decision")]
    AwaitingDecision(String),

    #[error("session is not escalated (status {0:?})")]
    NotEscalated(SessionStatus),

    #[error("session already finished (status {0:?})")]
    AlreadyTerminal(SessionStatus),
}
