//! Action dispatch: one handler per action kind
//!
//! Handlers are opaque side effects. Act only looks at the `status` of the
//! returned result.

use super::state::{ActionKind, ActionResult, Task};
use crate::graph::{GraphNode, PropertyValue};
use crate::storage::{GraphStore, StorageError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no handler registered for {0}")]
    NoHandler(ActionKind),

    #[error("missing parameter: {0}")]
    MissingParam(String),

    #[error("action failed: {0}")]
    Failed(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, params: &Map<String, Value>) -> Result<ActionResult, ActionError>;
}

fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str, ActionError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::MissingParam(key.to_string()))
}

fn short_id(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// Routes tasks to their handlers.
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging handlers for alerts, reports and equipment, plus a graph
    /// update handler when a store is given.
    pub fn with_defaults(store: Option<Arc<dyn GraphStore>>) -> Self {
        let mut dispatcher = Self::new()
            .with_handler(ActionKind::Alert, Arc::new(LogAlertHandler))
            .with_handler(ActionKind::Report, Arc::new(LogReportHandler))
            .with_handler(ActionKind::EquipmentControl, Arc::new(EquipmentLogHandler));
        if let Some(store) = store {
            dispatcher.register(ActionKind::UpdateKnowledgeBase, Arc::new(GraphUpdateHandler::new(store)));
        }
        dispatcher
    }

    pub fn with_handler(mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub async fn dispatch(&self, task: &Task) -> Result<ActionResult, ActionError> {
        let handler = self
            .handlers
            .get(&task.kind)
            .ok_or(ActionError::NoHandler(task.kind))?;
        handler.execute(&task.params).await
    }
}

/// Logs the alert instead of calling a messaging service.
pub struct LogAlertHandler;

#[async_trait]
impl ActionHandler for LogAlertHandler {
    async fn execute(&self, params: &Map<String, Value>) -> Result<ActionResult, ActionError> {
        let channel = param_str(params, "channel")?;
        let severity = param_str(params, "severity")?;
        let message = param_str(params, "message")?;
        let alert_id = short_id("ALT");
        match severity {
            "critical" => warn!(%alert_id, channel, message, "alert"),
            _ => info!(%alert_id, channel, severity, message, "alert"),
        }
        Ok(ActionResult::new("sent")
            .with_field("alert_id", alert_id)
            .with_field("channel", channel))
    }
}

/// Records that a report was requested.
pub struct LogReportHandler;

#[async_trait]
impl ActionHandler for LogReportHandler {
    async fn execute(&self, params: &Map<String, Value>) -> Result<ActionResult, ActionError> {
        let report_type = param_str(params, "report_type")?;
        let report_id = short_id("RPT");
        info!(%report_id, report_type, "report requested");
        Ok(ActionResult::new("generated")
            .with_field("report_id", report_id)
            .with_field("report_type", report_type))
    }
}

/// Logs equipment commands. Stop commands never reach it: Act holds them.
pub struct EquipmentLogHandler;

#[async_trait]
impl ActionHandler for EquipmentLogHandler {
    async fn execute(&self, params: &Map<String, Value>) -> Result<ActionResult, ActionError> {
        let equipment_id = param_str(params, "equipment_id")?;
        let command = param_str(params, "command")?;
        info!(equipment_id, command, "equipment command");
        Ok(ActionResult::success()
            .with_field("equipment_id", equipment_id)
            .with_field("command", command))
    }
}

/// Upserts an event node (e.g. `AnalysisEvent`) into the graph store.
pub struct GraphUpdateHandler {
    store: Arc<dyn GraphStore>,
}

impl GraphUpdateHandler {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionHandler for GraphUpdateHandler {
    async fn execute(&self, params: &Map<String, Value>) -> Result<ActionResult, ActionError> {
        let entity_type = param_str(params, "entity_type")?;
        let entity_id = param_str(params, "entity_id")?;

        let mut node = GraphNode::new(entity_id, entity_type);
        if let Some(Value::Object(props)) = params.get("properties") {
            for (key, value) in props {
                if let Some(pv) = PropertyValue::from_json(value) {
                    node.properties.insert(key.clone(), pv);
                }
            }
        }
        self.store.upsert_node(&node)?;

        Ok(ActionResult::new("updated")
            .with_field("entity_type", entity_type)
            .with_field("entity_id", entity_id))
    }
}
