//! Optional recommendation collaborator
//!
//! A recommender (rule base, language model, ...) may add narrative advice
//! during Plan. Scoring, escalation and the task list never depend on it.

use super::state::SessionState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Who produced the advice
    pub source: String,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Error)]
#[error("recommender failed: {0}")]
pub struct RecommendError(pub String);

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn advise(&self, state: &SessionState) -> Result<Advisory, RecommendError>;
}

/// Deterministic advice from the session's anomalies.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedRecommender;

#[async_trait]
impl Recommender for RuleBasedRecommender {
    async fn advise(&self, state: &SessionState) -> Result<Advisory, RecommendError> {
        let recommendations = state
            .anomalies
            .iter()
            .map(|a| {
                format!(
                    "Inspect {} at {}: {} {} against threshold {}",
                    a.signal, a.location, a.value, a.unit, a.threshold
                )
            })
            .collect();

        Ok(Advisory {
            source: "rules".to_string(),
            summary: format!(
                "Risk {} ({}) with {} anomalies",
                state.risk_score,
                state.risk_level.as_str(),
                state.anomalies.len()
            ),
            recommendations,
            confidence: None,
        })
    }
}
