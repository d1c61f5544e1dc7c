//! In-memory session and twin stores

use super::playbook::{generate_playbooks, Playbook};
use crate::graph::{GraphNode, GraphRelationship, NodeId};
use crate::normalize::NormalizationResult;
use crate::schema::Dimension;
use crate::workflow::{RiskLevel, SessionState, SessionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Aggregate figures over every stored session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub total_sessions: usize,
    pub escalations: usize,
    pub escalation_rate: f64,
    pub average_risk_score: f64,
    /// Share of sessions that completed without escalation.
    pub success_rate: f64,
}

/// Latest state per session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored state for this session.
    pub fn save(&self, state: &SessionState) {
        self.sessions.insert(state.session_id.clone(), state.clone());
    }

    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn metrics(&self) -> EngineMetrics {
        let total = self.sessions.len();
        if total == 0 {
            return EngineMetrics::default();
        }
        let mut escalations = 0;
        let mut risk_sum = 0u64;
        for entry in self.sessions.iter() {
            if entry.requires_escalation {
                escalations += 1;
            }
            risk_sum += u64::from(entry.risk_score);
        }
        EngineMetrics {
            total_sessions: total,
            escalations,
            escalation_rate: escalations as f64 / total as f64,
            average_risk_score: risk_sum as f64 / total as f64,
            success_rate: (total - escalations) as f64 / total as f64,
        }
    }
}

/// What a twin remembers about the last session run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub iterations: u32,
}

impl From<&SessionState> for SessionSummary {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            status: state.status,
            risk_score: state.risk_score,
            risk_level: state.risk_level,
            iterations: state.iteration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twin {
    pub id: String,
    pub version: u64,
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
    pub playbooks: Vec<Playbook>,
    pub recommendations: Vec<String>,
    /// Node ids per dimension; reference nodes have no dimension and are omitted.
    pub layers: BTreeMap<Dimension, Vec<NodeId>>,
    pub last_session: Option<SessionSummary>,
    pub updated_at: DateTime<Utc>,
}

impl Twin {
    fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            version: 0,
            nodes: Vec::new(),
            relationships: Vec::new(),
            playbooks: Vec::new(),
            recommendations: Vec::new(),
            layers: BTreeMap::new(),
            last_session: None,
            updated_at: Utc::now(),
        }
    }
}

fn layers_of(nodes: &[GraphNode]) -> BTreeMap<Dimension, Vec<NodeId>> {
    let mut layers: BTreeMap<Dimension, Vec<NodeId>> = BTreeMap::new();
    for node in nodes {
        let dimension = node
            .property("dimension")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Dimension>().ok());
        if let Some(dimension) = dimension {
            layers.entry(dimension).or_default().push(node.id.clone());
        }
    }
    layers
}

/// Versioned twins keyed by twin id.
#[derive(Debug, Default)]
pub struct TwinStore {
    twins: DashMap<String, Twin>,
}

impl TwinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the twin's entity set with `result` and bump its version.
    pub fn update_twin(&self, twin_id: &str, result: &NormalizationResult) -> Twin {
        let mut entry = self
            .twins
            .entry(twin_id.to_string())
            .or_insert_with(|| Twin::empty(twin_id));
        let twin = entry.value_mut();

        let (playbooks, recommendations) = generate_playbooks(&result.nodes);
        twin.version += 1;
        twin.nodes = result.nodes.clone();
        twin.relationships = result.relationships.clone();
        twin.layers = layers_of(&twin.nodes);
        twin.playbooks = playbooks;
        twin.recommendations = recommendations;
        twin.updated_at = Utc::now();

        info!(
            twin = twin_id,
            version = twin.version,
            nodes = twin.nodes.len(),
            playbooks = twin.playbooks.len(),
            "twin updated"
        );
        twin.clone()
    }

    /// Record a completed session against its twin, creating the twin at
    /// version 1 if absent. Sessions without a twin id are ignored.
    pub fn record_session(&self, state: &SessionState) -> Option<Twin> {
        let twin_id = state.twin_id.as_deref()?;
        let mut entry = self
            .twins
            .entry(twin_id.to_string())
            .or_insert_with(|| Twin::empty(twin_id));
        let twin = entry.value_mut();
        twin.version += 1;
        twin.last_session = Some(SessionSummary::from(state));
        twin.updated_at = Utc::now();
        Some(twin.clone())
    }

    pub fn get_twin(&self, twin_id: &str) -> Option<Twin> {
        self.twins.get(twin_id).map(|t| t.clone())
    }

    /// All twins, ordered by id.
    pub fn list_twins(&self) -> Vec<Twin> {
        let mut twins: Vec<Twin> = self.twins.iter().map(|e| e.value().clone()).collect();
        twins.sort_by(|a, b| a.id.cmp(&b.id));
        twins
    }
}
