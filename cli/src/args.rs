use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Reconcile a cluster manifest against its provider fleet
    Apply(ApplyArgs),
    /// Check a manifest's invariants without reconciling anything
    Validate(ValidateArgs),
    /// Project the monthly cost of a manifest's node pools
    Estimate(EstimateArgs),
    /// Run the health check battery against one cluster node
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Path to the cluster manifest, YAML or JSON
    #[arg(long, env = "FLEETWRIGHT_MANIFEST")]
    pub manifest: String,

    #[command(flatten)]
    pub engine: fleetwright_common::args::EngineArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the cluster manifest, YAML or JSON
    #[arg(long, env = "FLEETWRIGHT_MANIFEST")]
    pub manifest: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EstimateArgs {
    /// Path to the cluster manifest, YAML or JSON
    #[arg(long, env = "FLEETWRIGHT_MANIFEST")]
    pub manifest: String,

    /// Number of load balancers to price into the total
    #[arg(long, default_value_t = 0)]
    pub load_balancers: u32,

    /// Monthly cost of one load balancer
    #[arg(long, default_value_t = 10.0)]
    pub load_balancer_monthly: f64,

    #[command(flatten)]
    pub engine: fleetwright_common::args::EngineArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    /// Host or IP of the node to check
    #[arg(long, env = "FLEETWRIGHT_HEALTH_HOST", default_value = "10.8.0.10")]
    pub host: String,

    /// SSH user on the target node
    #[arg(long, default_value = "root")]
    pub user: String,

    /// SSH private key path
    #[arg(long, default_value = "~/.ssh/id_rsa")]
    pub key_path: String,

    /// Run the check battery concurrently rather than sequentially
    #[arg(long, default_value_t = false)]
    pub parallel: bool,
}
