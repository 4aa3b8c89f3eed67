//! Wraps any `Provider` so every call retries transient failures through
//! `fleetwright_common`'s backoff kernel (§4.2: "the reconciler decides
//! whether to retry via C1").

use std::sync::Arc;

use async_trait::async_trait;
use fleetwright_common::wait::{retry, RetryConfig};
use fleetwright_types::{CloudProvider, ClusterManifest, NodeOutput, NodePool, NodeSpec};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::{FirewallOutput, FirewallRule, LoadBalancerOutput, LoadBalancerSpec, NetworkOutput, NetworkSpec, Provider};

pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    cfg: RetryConfig,
    cancel: CancellationToken,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, cfg: RetryConfig, cancel: CancellationToken) -> Self {
        Self { inner, cfg, cancel }
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        fleetwright_common::metrics::retry_attempted(&self.inner.name().to_string());
        retry(&self.cancel, &self.cfg, ProviderError::is_retryable, op)
            .await
            .map_err(|e| match e {
                fleetwright_common::error::CommonError::Cancelled { last: Some(inner) } => {
                    ProviderError::Other(format!("cancelled: {inner}"))
                }
                fleetwright_common::error::CommonError::Cancelled { last: None } => {
                    ProviderError::Other("cancelled".to_string())
                }
                fleetwright_common::error::CommonError::Exhausted(inner) => inner,
            })
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> CloudProvider {
        self.inner.name()
    }

    async fn initialize(&self, manifest: &ClusterManifest) -> Result<(), ProviderError> {
        self.run(|| self.inner.initialize(manifest)).await
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkOutput, ProviderError> {
        self.run(|| self.inner.create_network(spec)).await
    }

    async fn create_node(&self, spec: &NodeSpec) -> Result<NodeOutput, ProviderError> {
        self.run(|| self.inner.create_node(spec)).await
    }

    async fn create_node_pool(&self, pool: &NodePool) -> Result<Vec<NodeOutput>, ProviderError> {
        self.run(|| self.inner.create_node_pool(pool)).await
    }

    async fn create_firewall(
        &self,
        rules: &[FirewallRule],
        node_ids: &[String],
    ) -> Result<FirewallOutput, ProviderError> {
        self.run(|| self.inner.create_firewall(rules, node_ids)).await
    }

    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancerOutput, ProviderError> {
        self.run(|| self.inner.create_load_balancer(spec)).await
    }

    async fn get_regions(&self) -> Result<Vec<String>, ProviderError> {
        self.run(|| self.inner.get_regions()).await
    }

    async fn get_sizes(&self) -> Result<Vec<String>, ProviderError> {
        self.run(|| self.inner.get_sizes()).await
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        self.run(|| self.inner.cleanup()).await
    }
}
