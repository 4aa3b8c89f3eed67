//! The cost estimator (component C11): per-provider price tables behind a
//! TTL-bounded cache, node- and cluster-level aggregation, and advice.

mod cache;
mod error;
mod estimate;
mod price;

pub use cache::PriceCache;
pub use error::CostError;
pub use estimate::{
    estimate_cluster_cost, estimate_cluster_cost_with_events, estimate_node_cost, ClusterCostEstimate,
    NamedNodeEstimate, Recommendation,
};
pub use price::{PriceProvider, PriceQuote, StaticPriceProvider};
