//! Session and twin stores, with playbook generation

mod playbook;
mod store;

pub use playbook::{generate_playbooks, Playbook, PlaybookStep};
pub use store::{EngineMetrics, SessionStore, SessionSummary, Twin, TwinStore};
