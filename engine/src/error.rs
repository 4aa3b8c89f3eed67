//! The engine's own error taxonomy (§7): a `ConfigError` for manifest
//! invariant violations plus `#[from]` wrapping of every leaf component's
//! error, and the aggregate `ReconcileError` the top-level facade surfaces.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid manifest: {0}")]
    Config(String),

    #[error(transparent)]
    Provider(#[from] fleetwright_provider::ProviderError),

    #[error(transparent)]
    Graph(#[from] fleetwright_graph::GraphError),

    #[error(transparent)]
    Mesh(#[from] fleetwright_mesh::MeshError),

    #[error(transparent)]
    Bootstrap(#[from] fleetwright_bootstrap::BootstrapError),

    #[error(transparent)]
    Cost(#[from] fleetwright_cost::CostError),
}
