//! The top-level cluster-orchestration facade: wires the provider registry,
//! resource graph, mesh coordinator, bootstrap protocol, remote executor
//! and manifest registry into one `Engine::reconcile(manifest)` entry point.

mod engine;
mod error;
mod validate;
mod vertices;

pub use engine::{Engine, ReconcileOutcome};
pub use error::EngineError;
pub use validate::validate_manifest;
pub use vertices::default_firewall_rules;
