//! Monitoring sessions end to end: scoring, routing, escalation, twins

mod common;

use common::*;
use safetwin::workflow::{
    plant_floor, score_signals, ActionDispatcher, ActionKind, ScriptedSignals, Signal, SignalSnapshot,
    StaticSignals,
};
use safetwin::{
    GraphStore, HumanDecision, MemoryGraphStore, NodeId, RiskLevel, SessionState, SessionStatus,
    TwinStore, WorkflowConfig, WorkflowEngine,
};
use std::sync::Arc;

fn engine_for(snapshot: SignalSnapshot, config: WorkflowConfig) -> WorkflowEngine {
    WorkflowEngine::new(config, Arc::new(StaticSignals::new(snapshot)))
}

/// Every combination of nominal / warning / critical over four signals.
fn all_level_combinations() -> Vec<[u8; 4]> {
    let mut combos = Vec::new();
    for n in 0..81u32 {
        let mut levels = [0u8; 4];
        let mut rest = n;
        for level in levels.iter_mut() {
            *level = (rest % 3) as u8;
            rest /= 3;
        }
        combos.push(levels);
    }
    combos
}

fn snapshot_at(levels: [u8; 4]) -> SignalSnapshot {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let value = match level {
                0 => 1.0,
                1 => 10.0,
                _ => 20.0,
            };
            (
                format!("sensor_{i}"),
                Signal::new(value, "u", 10.0, 20.0, format!("Zone {i}")),
            )
        })
        .collect()
}

// === Scenario: scoring properties ===

#[test]
fn signals_below_warning_are_low_without_escalation() {
    let config = WorkflowConfig::default();
    for levels in all_level_combinations().into_iter().filter(|l| l.iter().all(|x| *x == 0)) {
        let assessment = score_signals(&snapshot_at(levels)).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.risk_score < config.escalation_threshold);
    }
}

#[test]
fn adding_a_critical_breach_strictly_raises_the_score() {
    for levels in all_level_combinations() {
        for i in 0..4 {
            if levels[i] == 2 {
                continue;
            }
            let mut breached = levels;
            breached[i] = 2;
            let before = score_signals(&snapshot_at(levels)).unwrap().risk_score;
            let after = score_signals(&snapshot_at(breached)).unwrap().risk_score;
            assert!(after > before, "{levels:?} -> {breached:?}: {before} !< {after}");
        }
    }
}

#[tokio::test]
async fn score_equal_to_threshold_escalates_and_one_below_does_not() {
    // 95 + 95 + 75 + 75 = 85
    let at_85 = plant_floor(45.0, 13.0, 11.0, 86.0);

    let escalated = engine_for(at_85.clone(), WorkflowConfig::default())
        .run(SessionState::new())
        .await
        .unwrap();
    assert_eq!(escalated.risk_score, 85);
    assert!(escalated.requires_escalation);
    assert_eq!(escalated.status, SessionStatus::Escalated);

    let config = WorkflowConfig {
        escalation_threshold: 86,
        ..WorkflowConfig::default()
    };
    let calm = engine_for(at_85, config).run(SessionState::new()).await.unwrap();
    assert!(!calm.requires_escalation);
    assert_eq!(calm.status, SessionStatus::Done);
}

// === Scenario: vibration 13 mm/s on Compresseur P-101 ===

#[tokio::test]
async fn single_critical_vibration_is_low_risk_with_one_anomaly() {
    let state = engine_for(vibration_breach(), WorkflowConfig::default())
        .run(SessionState::new())
        .await
        .unwrap();

    assert_eq!(state.risk_score, 46);
    assert_eq!(state.risk_level, RiskLevel::Low);
    assert_eq!(state.anomalies.len(), 1);
    assert_eq!(state.anomalies[0].signal, "vibration");
    assert_eq!(state.status, SessionStatus::Done);

    let alert = state
        .executed
        .iter()
        .find(|a| a.task.kind == ActionKind::Alert)
        .unwrap();
    assert!(alert.success);
}

// === Scenario: the loop bound ===

#[tokio::test]
async fn persistent_high_risk_stops_after_five_iterations() {
    let high = plant_floor(36.0, 13.0, 11.0, 86.0);
    let signals = ScriptedSignals::new(vec![high.clone(), high.clone(), high]);
    let engine = WorkflowEngine::new(WorkflowConfig::default(), Arc::new(signals));

    let state = engine.run(SessionState::new()).await.unwrap();

    assert_eq!(state.risk_level, RiskLevel::High);
    assert_eq!(state.iteration, 5);
    assert_eq!(state.status, SessionStatus::Done);
}

#[tokio::test]
async fn improving_signals_end_the_loop_early() {
    let signals = ScriptedSignals::new(vec![
        plant_floor(36.0, 13.0, 11.0, 86.0),
        nominal(),
    ]);
    let engine = WorkflowEngine::new(WorkflowConfig::default(), Arc::new(signals));

    let state = engine.run(SessionState::new()).await.unwrap();

    assert_eq!(state.iteration, 2);
    assert_eq!(state.risk_level, RiskLevel::Low);
    assert_eq!(state.metrics.len(), 2);
}

// === Scenario: escalation requires an explicit decision ===

#[tokio::test]
async fn escalated_session_waits_then_resumes_and_records_the_twin() {
    let store = Arc::new(MemoryGraphStore::new());
    let twins = Arc::new(TwinStore::new());
    let mut config = WorkflowConfig::default();
    config.interlocks.insert("vibration".into(), "P-101".into());
    let engine = engine_for(all_critical(), config)
        .with_dispatcher(ActionDispatcher::with_defaults(Some(store.clone() as Arc<dyn GraphStore>)))
        .with_twin_store(twins.clone());

    let escalated = engine
        .run(SessionState::new().for_twin("TWIN-PLANT-A"))
        .await
        .unwrap();
    assert_eq!(escalated.status, SessionStatus::Escalated);
    assert!(twins.get_twin("TWIN-PLANT-A").is_none());

    let pending: Vec<_> = escalated.pending.iter().map(|t| t.kind).collect();
    assert_eq!(pending, vec![ActionKind::Escalate, ActionKind::EquipmentControl]);
    let event = store
        .load_node("AnalysisEvent", &NodeId::from(escalated.session_id.as_str()))
        .unwrap()
        .unwrap();
    assert!(event.has_label("AnalysisEvent"));

    let done = engine
        .resume(escalated, HumanDecision::Halt)
        .await
        .unwrap();
    assert_eq!(done.status, SessionStatus::Done);
    assert_eq!(twins.get_twin("TWIN-PLANT-A").unwrap().version, 1);

    let metrics = engine.metrics();
    assert_eq!(metrics.total_sessions, 1);
    assert_eq!(metrics.escalations, 1);
    assert_eq!(metrics.escalation_rate, 1.0);
}

// === Scenario: sessions sharing one engine ===

#[tokio::test]
async fn concurrent_sessions_keep_separate_state() {
    let engine = engine_for(nominal(), WorkflowConfig::default());

    let (a, b) = tokio::join!(
        engine.run(SessionState::with_id("s-a")),
        engine.run(SessionState::with_id("s-b")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.audit_log.len(), 5);
    assert_eq!(b.audit_log.len(), 5);
    assert_eq!(engine.sessions().session_ids(), vec!["s-a", "s-b"]);
}

#[tokio::test]
async fn cancelled_engine_stops_before_any_stage() {
    let engine = engine_for(all_critical(), WorkflowConfig::default());
    let token = engine.cancellation_token();
    token.cancel();

    let state = engine.run(SessionState::new()).await.unwrap();

    assert_eq!(state.status, SessionStatus::Cancelled);
    assert!(state.tasks.is_empty());
}
