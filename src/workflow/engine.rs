//! Sequential stage pipeline with bounded looping and human escalation

use super::actions::ActionDispatcher;
use super::advisory::Recommender;
use super::cancel::CancellationToken;
use super::signals::SignalSource;
use super::stages::{self, Route};
use super::state::{HumanDecision, SessionState, SessionStatus, Stage};
use super::WorkflowError;
use crate::config::WorkflowConfig;
use crate::twin::{EngineMetrics, SessionStore, TwinStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Drives one session at a time through
/// Perceive → Plan → Act → Learn → Supervise.
///
/// The engine is shareable; concurrent sessions each own their
/// `SessionState`, so two stages of one session never overlap.
pub struct WorkflowEngine {
    config: WorkflowConfig,
    signals: Arc<dyn SignalSource>,
    dispatcher: ActionDispatcher,
    recommender: Option<Arc<dyn Recommender>>,
    cancel: CancellationToken,
    sessions: Arc<SessionStore>,
    twins: Option<Arc<TwinStore>>,
}

enum CycleEnd {
    Routed(Route),
    Cancelled,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig, signals: Arc<dyn SignalSource>) -> Self {
        Self {
            config,
            signals,
            dispatcher: ActionDispatcher::with_defaults(None),
            recommender: None,
            cancel: CancellationToken::new(),
            sessions: Arc::new(SessionStore::new()),
            twins: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: ActionDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_recommender(mut self, recommender: Arc<dyn Recommender>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_twin_store(mut self, twins: Arc<TwinStore>) -> Self {
        self.twins = Some(twins);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// A handle that stops every session of this engine at the next stage boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.sessions.metrics()
    }

    /// Run a fresh or caller-supplied `Running` session until it is done,
    /// escalated or cancelled.
    pub async fn run(&self, state: SessionState) -> Result<SessionState, WorkflowError> {
        match state.status {
            SessionStatus::Running => {}
            SessionStatus::Escalated => {
                return Err(WorkflowError::AwaitingDecision(state.session_id))
            }
            status => return Err(WorkflowError::AlreadyTerminal(status)),
        }
        info!(session = %state.session_id, twin = ?state.twin_id, "session started");
        self.drive(state).await
    }

    /// Answer an escalation and continue routing from where Supervise stopped.
    pub async fn resume(
        &self,
        mut state: SessionState,
        decision: HumanDecision,
    ) -> Result<SessionState, WorkflowError> {
        if state.status != SessionStatus::Escalated {
            return Err(WorkflowError::NotEscalated(state.status));
        }

        state.human_decision = Some(decision);
        state.audit("Human", "decision_recorded", json!({ "decision": decision }));
        info!(session = %state.session_id, ?decision, "escalation answered");

        match decision {
            HumanDecision::Halt => state.status = SessionStatus::Done,
            HumanDecision::Acknowledged => match stages::route_after_cycle(&state, &self.config) {
                Route::Loop => {
                    state.status = SessionStatus::Running;
                    return self.drive(state).await;
                }
                Route::Done | Route::Escalate => state.status = SessionStatus::Done,
            },
        }
        self.finish(&state);
        Ok(state)
    }

    async fn drive(&self, mut state: SessionState) -> Result<SessionState, WorkflowError> {
        loop {
            match self.cycle(&mut state).await {
                Ok(CycleEnd::Routed(Route::Loop)) => continue,
                Ok(CycleEnd::Routed(Route::Escalate)) => {
                    state.status = SessionStatus::Escalated;
                    break;
                }
                Ok(CycleEnd::Routed(Route::Done)) => {
                    state.status = SessionStatus::Done;
                    break;
                }
                Ok(CycleEnd::Cancelled) => {
                    state.status = SessionStatus::Cancelled;
                    break;
                }
                Err((stage, cause)) => {
                    error!(session = %state.session_id, %stage, %cause, "stage failed");
                    state.status = SessionStatus::Failed;
                    self.sessions.save(&state);
                    return Err(WorkflowError::StageFailure {
                        stage,
                        cause,
                        state: Box::new(state),
                    });
                }
            }
        }
        self.finish(&state);
        Ok(state)
    }

    async fn cycle(&self, state: &mut SessionState) -> Result<CycleEnd, (Stage, String)> {
        for stage in Stage::PIPELINE {
            if self.cancel.is_cancelled() {
                state.audit("Engine", "cancelled", json!({ "before_stage": stage }));
                return Ok(CycleEnd::Cancelled);
            }
            debug!(session = %state.session_id, %stage, iteration = state.iteration, "stage");

            let outcome = match stage {
                Stage::Perceive => {
                    stages::perceive(state, self.signals.as_ref(), &self.config).await
                }
                Stage::Plan => {
                    stages::plan(state, &self.config, self.recommender.as_deref()).await
                }
                Stage::Act => stages::act(state, &self.dispatcher).await,
                Stage::Learn => stages::learn(state),
                Stage::Supervise => {
                    return Ok(CycleEnd::Routed(stages::supervise(state, &self.config)))
                }
            };
            outcome.map_err(|cause| (stage, cause))?;
        }
        // PIPELINE ends with Supervise
        Ok(CycleEnd::Routed(Route::Done))
    }

    fn finish(&self, state: &SessionState) {
        info!(
            session = %state.session_id,
            status = ?state.status,
            iterations = state.iteration,
            risk_score = state.risk_score,
            pending = state.pending.len(),
            "session finished"
        );
        self.sessions.save(state);
        if state.status == SessionStatus::Done {
            if let Some(twins) = &self.twins {
                twins.record_session(state);
            }
        }
    }
}
