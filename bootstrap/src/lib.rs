//! The RKE2 cluster-bootstrap protocol (component C5): drives a manifest's
//! masters and workers through install, join, and readiness, then the
//! optional addon phase. Upgrade and etcd snapshot/restore live here too
//! since they reuse the same readiness polling and script generation.

mod addon;
mod bootstrap;
mod config;
mod election;
mod error;
mod poll;
mod snapshot;
mod state;
mod upgrade;

pub use addon::{install_addons, AddonReport};
pub use bootstrap::{rewrite_kubeconfig_server, BootstrapOutcome, BootstrapSettings, ClusterBootstrapper};
pub use config::{
    agent_install_script, readiness_script, recent_log_script, server_install_script, token_read_script,
    AgentConfig, ServerConfig, NODE_TOKEN_PATH,
};
pub use election::{check_drift, elect_first_master};
pub use error::BootstrapError;
pub use poll::poll_until_ready;
pub use snapshot::{restore_snapshot, snapshot_name, take_snapshot};
pub use state::ClusterBootstrapState;
pub use upgrade::{upgrade_master, upgrade_worker};
