//! Node and cluster cost estimation and advice (§4.11).

use std::collections::HashMap;

use fleetwright_common::EventEmitter;
use fleetwright_types::{CloudProvider, CostEstimate, Event, NodePool};

use crate::cache::PriceCache;
use crate::error::CostError;
use crate::price::PriceProvider;

const HOURS_PER_MONTH: f64 = 730.0;
const DEFAULT_STORAGE_GB: f64 = 50.0;
const FIXED_NETWORK_OVERHEAD_MONTHLY: f64 = 10.0;
const RIGHT_SIZING_THRESHOLD_HOURLY: f64 = 0.50;
const RESERVED_INSTANCE_YEARLY_THRESHOLD: f64 = 5000.0;

/// A recommendation the estimator attaches to a cluster-level estimate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recommendation {
    pub kind: String,
    pub message: String,
}

impl Recommendation {
    fn spot_usage(pool: &str) -> Self {
        Self {
            kind: "spot_usage".to_string(),
            message: format!("pool '{pool}' has no spot instances; consider enabling spot for cost savings"),
        }
    }

    fn right_sizing(node: &str, hourly: f64) -> Self {
        Self {
            kind: "right_sizing".to_string(),
            message: format!("node '{node}' costs ${hourly:.2}/hr; investigate right-sizing"),
        }
    }

    fn reserved_instances(yearly: f64) -> Self {
        Self {
            kind: "reserved_instances".to_string(),
            message: format!(
                "projected yearly spend ${yearly:.2} exceeds ${RESERVED_INSTANCE_YEARLY_THRESHOLD:.2}; consider reserved instances"
            ),
        }
    }
}

/// One node's estimate plus the name it belongs to, for cluster-level
/// aggregation and per-node recommendations.
#[derive(Clone, Debug)]
pub struct NamedNodeEstimate {
    pub node_name: String,
    pub pool_name: String,
    pub estimate: CostEstimate,
}

#[derive(Clone, Debug)]
pub struct ClusterCostEstimate {
    pub nodes: Vec<NamedNodeEstimate>,
    pub load_balancer_monthly: f64,
    pub network_overhead_monthly: f64,
    pub total: CostEstimate,
    pub recommendations: Vec<Recommendation>,
}

/// Combines a price quote into one node's estimate (§4.11: `hourly * 730 +
/// storage * 50GB default`, spot savings as `(base-spot)/base * 100`).
pub fn estimate_node_cost(quote: &crate::price::PriceQuote, spot: bool, storage_gb: Option<f64>) -> CostEstimate {
    let storage_gb = storage_gb.unwrap_or(DEFAULT_STORAGE_GB);
    let instance_hourly = if spot { quote.spot_hourly } else { quote.instance_hourly };
    let storage_monthly = quote.storage_per_gb_month * storage_gb;
    let hourly = instance_hourly;
    let monthly = hourly * HOURS_PER_MONTH + storage_monthly;
    let yearly = monthly * 12.0;

    let spot_savings_percent = if spot && quote.instance_hourly > 0.0 {
        Some(((quote.instance_hourly - quote.spot_hourly) / quote.instance_hourly) * 100.0)
    } else {
        None
    };

    let mut breakdown = HashMap::new();
    breakdown.insert("instance".to_string(), hourly * HOURS_PER_MONTH);
    breakdown.insert("storage".to_string(), storage_monthly);

    CostEstimate {
        hourly,
        monthly,
        yearly,
        currency: "USD".to_string(),
        spot,
        spot_savings_percent,
        breakdown,
    }
}

/// Looks up a cached quote, refilling from `provider` on a miss.
async fn quote_for(
    provider: &dyn PriceProvider,
    cache: &PriceCache,
    cloud: CloudProvider,
    size: &str,
    region: &str,
    spot: bool,
) -> Result<crate::price::PriceQuote, CostError> {
    let provider_key = cloud.to_string();
    if let Some(hit) = cache.get(&provider_key, size, region, spot) {
        return Ok(hit);
    }
    let quote = provider.price(size, region).await?;
    cache.insert(&provider_key, size, region, spot, quote);
    Ok(quote)
}

/// Expands every pool into its nodes and estimates each (§4.11:
/// `EstimateClusterCost` "sums all nodes, pools expanded").
pub async fn estimate_cluster_cost(
    pools: &HashMap<String, NodePool>,
    provider: &dyn PriceProvider,
    cache: &PriceCache,
    load_balancer_count: u32,
    load_balancer_monthly_each: f64,
) -> Result<ClusterCostEstimate, CostError> {
    estimate_cluster_cost_with_events(pools, provider, cache, load_balancer_count, load_balancer_monthly_each, None)
        .await
}

/// Same as [`estimate_cluster_cost`], additionally publishing
/// `cost_estimate_generated` on the given event bus (§6) once the estimate is
/// ready.
pub async fn estimate_cluster_cost_with_events(
    pools: &HashMap<String, NodePool>,
    provider: &dyn PriceProvider,
    cache: &PriceCache,
    load_balancer_count: u32,
    load_balancer_monthly_each: f64,
    events: Option<&EventEmitter>,
) -> Result<ClusterCostEstimate, CostError> {
    let mut pool_names: Vec<&String> = pools.keys().collect();
    pool_names.sort();

    let mut nodes = Vec::new();
    for pool_name in pool_names {
        let pool = &pools[pool_name];
        for spec in pool.expand() {
            let quote = quote_for(provider, cache, pool.provider, &pool.size, &pool.region, pool.spot).await?;
            let estimate = estimate_node_cost(&quote, pool.spot, None);
            nodes.push(NamedNodeEstimate {
                node_name: spec.name,
                pool_name: pool_name.clone(),
                estimate,
            });
        }
    }

    let load_balancer_monthly = load_balancer_count as f64 * load_balancer_monthly_each;
    let network_overhead_monthly = FIXED_NETWORK_OVERHEAD_MONTHLY;

    let total_monthly: f64 =
        nodes.iter().map(|n| n.estimate.monthly).sum::<f64>() + load_balancer_monthly + network_overhead_monthly;
    let total_hourly: f64 = nodes.iter().map(|n| n.estimate.hourly).sum();
    let total_yearly = total_monthly * 12.0;

    let mut breakdown = HashMap::new();
    breakdown.insert("nodes".to_string(), nodes.iter().map(|n| n.estimate.monthly).sum());
    breakdown.insert("load_balancer".to_string(), load_balancer_monthly);
    breakdown.insert("network_overhead".to_string(), network_overhead_monthly);

    let total = CostEstimate {
        hourly: total_hourly,
        monthly: total_monthly,
        yearly: total_yearly,
        currency: "USD".to_string(),
        spot: false,
        spot_savings_percent: None,
        breakdown,
    };

    let mut recommendations = Vec::new();
    for pool_name in {
        let mut names: Vec<&String> = pools.keys().collect();
        names.sort();
        names
    } {
        let pool = &pools[pool_name];
        let worker_like = pool.roles.iter().any(|r| matches!(r, fleetwright_types::NodeRole::Worker));
        if worker_like && !pool.spot {
            recommendations.push(Recommendation::spot_usage(pool_name));
        }
    }
    for node in &nodes {
        if node.estimate.hourly > RIGHT_SIZING_THRESHOLD_HOURLY {
            recommendations.push(Recommendation::right_sizing(&node.node_name, node.estimate.hourly));
        }
    }
    if total_yearly > RESERVED_INSTANCE_YEARLY_THRESHOLD {
        recommendations.push(Recommendation::reserved_instances(total_yearly));
    }

    if let Some(events) = events {
        events.emit(
            Event::new("cost_estimate_generated", "cost").with("monthly", format!("{total_monthly:.2}")),
        );
    }

    Ok(ClusterCostEstimate {
        nodes,
        load_balancer_monthly,
        network_overhead_monthly,
        total,
        recommendations,
    })
}
