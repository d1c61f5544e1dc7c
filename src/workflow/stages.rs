//! The five pipeline stages
//!
//! Each stage takes the session by `&mut` and touches only its own
//! write-set (see `state`). A stage that cannot complete returns a cause
//! string; the engine turns it into a stage-tagged failure.

use super::actions::ActionDispatcher;
use super::advisory::Recommender;
use super::signals::{score_signals, SignalSource};
use super::state::{
    ActionKind, ExecutedAction, LearningRecord, RiskLevel, SessionMetrics, SessionState, Severity,
    Stage, Task,
};
use crate::config::WorkflowConfig;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Where Supervise sends the session next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Loop,
    Escalate,
    Done,
}

pub(crate) async fn perceive(
    state: &mut SessionState,
    source: &dyn SignalSource,
    config: &WorkflowConfig,
) -> Result<(), String> {
    let snapshot = source.snapshot().await.map_err(|e| e.to_string())?;
    let assessment = score_signals(&snapshot).map_err(|e| e.to_string())?;

    state.signals = snapshot;
    state.risk_score = assessment.risk_score;
    state.risk_level = assessment.risk_level;
    state.anomalies = assessment.anomalies;
    state.requires_escalation = state.risk_score >= config.escalation_threshold;

    info!(
        session = %state.session_id,
        risk_score = state.risk_score,
        risk_level = state.risk_level.as_str(),
        anomalies = state.anomalies.len(),
        escalation = state.requires_escalation,
        "perceived"
    );
    state.audit(
        Stage::Perceive.agent(),
        "analysis_complete",
        json!({
            "risk_score": state.risk_score,
            "risk_level": state.risk_level,
            "anomalies_count": state.anomalies.len(),
            "requires_escalation": state.requires_escalation,
        }),
    );
    Ok(())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

struct PlanBuilder {
    tasks: Vec<Task>,
}

impl PlanBuilder {
    fn push(&mut self, priority: u8, kind: ActionKind, description: String, params: Value, gated: bool) {
        self.tasks.push(Task {
            step: self.tasks.len() + 1,
            priority,
            kind,
            description,
            params: object(params),
            gated,
        });
    }
}

/// Build the ordered task list for the current assessment.
pub(crate) fn build_plan(state: &SessionState, config: &WorkflowConfig) -> Vec<Task> {
    let mut plan = PlanBuilder { tasks: Vec::new() };

    if state.requires_escalation {
        plan.push(
            0,
            ActionKind::Escalate,
            "Escalate to the HSE supervisor for a decision".to_string(),
            json!({
                "risk_score": state.risk_score,
                "threshold": config.escalation_threshold,
            }),
            true,
        );
    }

    for anomaly in &state.anomalies {
        match anomaly.severity {
            Severity::Critical => {
                plan.push(
                    1,
                    ActionKind::Alert,
                    format!("Critical alert: {} at {}", anomaly.signal, anomaly.location),
                    json!({
                        "channel": config.critical_channel,
                        "severity": "critical",
                        "message": format!(
                            "CRITICAL: {} out of range at {} ({} {}, threshold {})",
                            anomaly.signal, anomaly.location, anomaly.value, anomaly.unit, anomaly.threshold
                        ),
                    }),
                    false,
                );
                if let Some(equipment) = config.interlocks.get(&anomaly.signal) {
                    plan.push(
                        1,
                        ActionKind::EquipmentControl,
                        format!("Emergency stop of {} on {}", equipment, anomaly.signal),
                        json!({
                            "equipment_id": equipment,
                            "command": "emergency_stop",
                            "reason": format!("{} critical at {}", anomaly.signal, anomaly.location),
                        }),
                        true,
                    );
                }
                plan.push(
                    2,
                    ActionKind::Report,
                    "Incident report".to_string(),
                    json!({
                        "report_type": "incident",
                        "period": "immediate",
                        "format": "pdf",
                        "signal": anomaly.signal,
                    }),
                    false,
                );
            }
            Severity::Warning => plan.push(
                2,
                ActionKind::Alert,
                format!("Warning alert: {} at {}", anomaly.signal, anomaly.location),
                json!({
                    "channel": config.warning_channel,
                    "severity": "warning",
                    "message": format!(
                        "WARNING: {} approaching threshold at {}",
                        anomaly.signal, anomaly.location
                    ),
                }),
                false,
            ),
        }
    }

    plan.push(
        3,
        ActionKind::UpdateKnowledgeBase,
        "Record the analysis in the knowledge graph".to_string(),
        json!({
            "entity_type": "AnalysisEvent",
            "entity_id": state.session_id,
            "properties": {
                "risk_score": state.risk_score,
                "risk_level": state.risk_level,
                "anomalies": state.anomalies.len(),
                "iteration": state.iteration + 1,
            },
        }),
        false,
    );

    plan.tasks
}

pub(crate) async fn plan(
    state: &mut SessionState,
    config: &WorkflowConfig,
    recommender: Option<&dyn Recommender>,
) -> Result<(), String> {
    state.tasks = build_plan(state, config);

    state.advisories.clear();
    if let Some(recommender) = recommender {
        match recommender.advise(state).await {
            Ok(advisory) => state.advisories.push(advisory),
            Err(e) => warn!(session = %state.session_id, error = %e, "recommender unavailable"),
        }
    }

    debug!(session = %state.session_id, steps = state.tasks.len(), "plan created");
    state.audit(
        Stage::Plan.agent(),
        "plan_created",
        json!({
            "steps_count": state.tasks.len(),
            "gated": state.tasks.iter().filter(|t| t.gated).count(),
            "advisories": state.advisories.len(),
        }),
    );
    Ok(())
}

/// Tasks that must wait for a human: the escalation itself and any stop command.
pub(crate) fn requires_confirmation(task: &Task) -> bool {
    if task.gated || task.kind == ActionKind::Escalate {
        return true;
    }
    task.kind == ActionKind::EquipmentControl
        && matches!(
            task.params.get("command").and_then(Value::as_str),
            Some("stop") | Some("emergency_stop")
        )
}

pub(crate) async fn act(state: &mut SessionState, dispatcher: &ActionDispatcher) -> Result<(), String> {
    let mut executed = Vec::new();

    for task in &state.tasks {
        if requires_confirmation(task) {
            if task.kind == ActionKind::Escalate && state.human_decision.is_some() {
                debug!(session = %state.session_id, "escalation already answered");
                continue;
            }
            let already_held = state
                .pending
                .iter()
                .any(|held| held.kind == task.kind && held.params == task.params);
            if !already_held {
                warn!(session = %state.session_id, action = %task.kind, "held for human confirmation");
                state.pending.push(task.clone());
            }
            continue;
        }

        let record = match dispatcher.dispatch(task).await {
            Ok(result) => ExecutedAction {
                task: task.clone(),
                success: result.is_success(),
                result: Some(result),
                error: None,
                executed_at: Utc::now(),
            },
            Err(e) => {
                warn!(session = %state.session_id, action = %task.kind, error = %e, "action failed");
                ExecutedAction {
                    task: task.clone(),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                    executed_at: Utc::now(),
                }
            }
        };
        executed.push(record);
    }

    state.executed = executed;
    let succeeded = state.executed.iter().filter(|a| a.success).count();
    state.audit(
        Stage::Act.agent(),
        "execution_complete",
        json!({
            "actions_success": succeeded,
            "actions_failed": state.executed.len() - succeeded,
            "actions_pending": state.pending.len(),
        }),
    );
    Ok(())
}

pub(crate) fn learn(state: &mut SessionState) -> Result<(), String> {
    state.learning = state
        .executed
        .iter()
        .map(|action| LearningRecord {
            action: action.task.kind,
            risk_score: state.risk_score,
            anomalies_count: state.anomalies.len(),
            executed_at: action.executed_at,
            success: action.success,
        })
        .collect();

    let failed = state.executed.iter().filter(|a| !a.success).count();
    let metrics = SessionMetrics {
        iteration: state.iteration + 1,
        risk_score: state.risk_score,
        anomalies_detected: state.anomalies.len(),
        actions_executed: state.executed.len() - failed,
        actions_failed: failed,
        escalations: u32::from(state.requires_escalation),
        autonomy_level: if state.requires_escalation { 3 } else { 4 },
    };
    state.audit(
        Stage::Learn.agent(),
        "learning_complete",
        json!({
            "kg_updates": state.learning.len(),
            "metrics": metrics,
        }),
    );
    state.metrics.push(metrics);
    Ok(())
}

/// Routing once the iteration counter is up to date and no escalation is outstanding.
pub(crate) fn route_after_cycle(state: &SessionState, config: &WorkflowConfig) -> Route {
    if state.iteration >= config.max_iterations {
        return Route::Done;
    }
    match state.risk_level {
        RiskLevel::High | RiskLevel::Critical => Route::Loop,
        RiskLevel::Low | RiskLevel::Moderate => Route::Done,
    }
}

pub(crate) fn supervise(state: &mut SessionState, config: &WorkflowConfig) -> Route {
    state.iteration += 1;

    let route = if state.awaiting_decision() {
        Route::Escalate
    } else {
        route_after_cycle(state, config)
    };

    if route == Route::Escalate {
        warn!(
            session = %state.session_id,
            risk_score = state.risk_score,
            threshold = config.escalation_threshold,
            "escalated, awaiting human decision"
        );
    }
    state.audit(
        Stage::Supervise.agent(),
        "cycle_complete",
        json!({
            "iteration": state.iteration,
            "final_risk_score": state.risk_score,
            "escalated": state.requires_escalation,
            "route": format!("{:?}", route).to_lowercase(),
        }),
    );
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::Anomaly;

    fn anomaly(signal: &str, severity: Severity) -> Anomaly {
        Anomaly {
            signal: signal.to_string(),
            value: 13.0,
            unit: "mm/s".to_string(),
            threshold: 12.0,
            severity,
            location: "Compresseur P-101".to_string(),
        }
    }

    fn kinds(tasks: &[Task]) -> Vec<(u8, ActionKind)> {
        tasks.iter().map(|t| (t.priority, t.kind)).collect()
    }

    #[test]
    fn nominal_plan_is_only_the_knowledge_update() {
        let state = SessionState::new();
        let plan = build_plan(&state, &WorkflowConfig::default());
        assert_eq!(kinds(&plan), vec![(3, ActionKind::UpdateKnowledgeBase)]);
        assert_eq!(plan[0].params["entity_id"], json!(state.session_id));
    }

    #[test]
    fn escalation_comes_first_and_knowledge_update_last() {
        let mut state = SessionState::new();
        state.requires_escalation = true;
        state.anomalies = vec![
            anomaly("vibration", Severity::Critical),
            anomaly("noise", Severity::Warning),
        ];

        let plan = build_plan(&state, &WorkflowConfig::default());

        assert_eq!(
            kinds(&plan),
            vec![
                (0, ActionKind::Escalate),
                (1, ActionKind::Alert),
                (2, ActionKind::Report),
                (2, ActionKind::Alert),
                (3, ActionKind::UpdateKnowledgeBase),
            ]
        );
        assert!(plan[0].gated);
        assert_eq!(plan[1].params["channel"], json!("slack"));
        assert_eq!(plan[3].params["channel"], json!("teams"));
        let steps: Vec<_> = plan.iter().map(|t| t.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn interlocked_signal_adds_gated_emergency_stop() {
        let mut config = WorkflowConfig::default();
        config.interlocks.insert("vibration".into(), "P-101".into());
        let mut state = SessionState::new();
        state.anomalies = vec![anomaly("vibration", Severity::Critical)];

        let plan = build_plan(&state, &config);
        let stop = plan.iter().find(|t| t.kind == ActionKind::EquipmentControl).unwrap();

        assert_eq!(stop.params["command"], json!("emergency_stop"));
        assert_eq!(stop.params["equipment_id"], json!("P-101"));
        assert!(requires_confirmation(stop));
    }

    #[test]
    fn stop_commands_need_confirmation_even_when_not_flagged() {
        let mut task = Task {
            step: 1,
            priority: 1,
            kind: ActionKind::EquipmentControl,
            description: "stop".into(),
            params: object(json!({"equipment_id": "P-1", "command": "stop"})),
            gated: false,
        };
        assert!(requires_confirmation(&task));
        task.params.insert("command".into(), json!("adjust"));
        assert!(!requires_confirmation(&task));
    }

    // === Scenario: later cycles after an acknowledged escalation ===
    #[tokio::test]
    async fn act_does_not_requeue_answered_or_held_tasks() {
        let mut state = SessionState::new();
        state.requires_escalation = true;
        state.risk_score = 90;
        let stop = Task {
            step: 2,
            priority: 0,
            kind: ActionKind::EquipmentControl,
            description: "stop".into(),
            params: object(json!({"equipment_id": "P-101", "command": "emergency_stop"})),
            gated: true,
        };
        let mut tasks = build_plan(&state, &WorkflowConfig::default());
        tasks.push(stop.clone());
        state.tasks = tasks;
        let dispatcher = ActionDispatcher::with_defaults(None);

        act(&mut state, &dispatcher).await.unwrap();
        let held: Vec<_> = state.pending.iter().map(|t| t.kind).collect();
        assert_eq!(held, vec![ActionKind::Escalate, ActionKind::EquipmentControl]);

        state.human_decision = Some(crate::workflow::HumanDecision::Acknowledged);
        act(&mut state, &dispatcher).await.unwrap();
        act(&mut state, &dispatcher).await.unwrap();

        assert_eq!(state.pending.len(), 2);
        assert_eq!(
            state
                .pending
                .iter()
                .filter(|t| t.kind == ActionKind::Escalate)
                .count(),
            1
        );
    }

    #[test]
    fn supervise_never_loops_at_the_iteration_bound() {
        let config = WorkflowConfig::default();
        let mut state = SessionState::new();
        state.risk_level = RiskLevel::Critical;

        state.iteration = 3;
        assert_eq!(supervise(&mut state, &config), Route::Loop);
        assert_eq!(state.iteration, 4);

        assert_eq!(supervise(&mut state, &config), Route::Done);
        assert_eq!(state.iteration, 5);

        state.iteration = 40;
        assert_eq!(supervise(&mut state, &config), Route::Done);
    }

    #[test]
    fn supervise_escalates_only_without_decision() {
        let config = WorkflowConfig::default();
        let mut state = SessionState::new();
        state.requires_escalation = true;
        state.risk_level = RiskLevel::Critical;
        assert_eq!(supervise(&mut state, &config), Route::Escalate);

        state.human_decision = Some(crate::workflow::HumanDecision::Acknowledged);
        assert_eq!(supervise(&mut state, &config), Route::Loop);
    }

    #[test]
    fn learn_records_one_entry_per_executed_action() {
        let mut state = SessionState::new();
        state.requires_escalation = true;
        state.risk_score = 90;
        state.tasks = build_plan(&state, &WorkflowConfig::default());
        state.executed = state
            .tasks
            .iter()
            .filter(|t| !t.gated)
            .map(|t| ExecutedAction {
                task: t.clone(),
                success: true,
                result: None,
                error: None,
                executed_at: Utc::now(),
            })
            .collect();

        learn(&mut state).unwrap();

        assert_eq!(state.learning.len(), 1);
        let metrics = state.metrics.last().unwrap();
        assert_eq!(metrics.escalations, 1);
        assert_eq!(metrics.autonomy_level, 3);
        assert_eq!(metrics.actions_executed, 1);
        assert_eq!(state.audit_log.len(), 1);
    }
}
