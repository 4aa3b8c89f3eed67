//! `NodeScaler`: the autoscaling manager's only way of touching real
//! infrastructure, composed from four independent capabilities so a caller
//! can swap, e.g., the selector without touching the provider plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AutoscaleError;

/// The facts a selector needs about one live node to decide whether it is
/// safe to remove; deliberately narrower than `fleetwright_types::NodeOutput`
/// so the selector has no way to reach for fields it shouldn't need.
#[derive(Clone, Debug)]
pub struct ScalableNode {
    pub name: String,
    pub is_worker: bool,
    pub created_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

#[async_trait]
pub trait NodeCreator: Send + Sync {
    async fn create_nodes(&self, pool: &str, count: u32) -> Result<Vec<String>, AutoscaleError>;
}

#[async_trait]
pub trait NodeDeleter: Send + Sync {
    async fn delete_nodes(&self, names: &[String]) -> Result<(), AutoscaleError>;
}

#[async_trait]
pub trait NodeCounter: Send + Sync {
    async fn count(&self, pool: &str) -> Result<u32, AutoscaleError>;
    async fn list(&self, pool: &str) -> Result<Vec<ScalableNode>, AutoscaleError>;
}

/// Decides which nodes to remove when scaling down. Pure and synchronous:
/// the set of candidates is already known, so there is nothing to await.
pub trait NodeSelector: Send + Sync {
    fn select_for_removal(&self, candidates: &[ScalableNode], count: u32) -> Vec<String>;
}

/// §9 Open Question #3: "workers only, prefer newest, skip nodes hosting
/// singleton pods" — a node is treated as a singleton host via the
/// `labels["singleton"] == "true"` convention.
pub struct DefaultSelector;

impl NodeSelector for DefaultSelector {
    fn select_for_removal(&self, candidates: &[ScalableNode], count: u32) -> Vec<String> {
        let mut eligible: Vec<&ScalableNode> = candidates
            .iter()
            .filter(|n| n.is_worker)
            .filter(|n| n.labels.get("singleton").map(String::as_str) != Some("true"))
            .collect();
        eligible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        eligible.into_iter().take(count as usize).map(|n| n.name.clone()).collect()
    }
}

/// Binds the four scaling capabilities to one pool.
pub struct NodeScaler {
    pool: String,
    creator: Arc<dyn NodeCreator>,
    deleter: Arc<dyn NodeDeleter>,
    counter: Arc<dyn NodeCounter>,
    selector: Arc<dyn NodeSelector>,
}

impl NodeScaler {
    pub fn new(
        pool: impl Into<String>,
        creator: Arc<dyn NodeCreator>,
        deleter: Arc<dyn NodeDeleter>,
        counter: Arc<dyn NodeCounter>,
        selector: Arc<dyn NodeSelector>,
    ) -> Self {
        Self {
            pool: pool.into(),
            creator,
            deleter,
            counter,
            selector,
        }
    }

    pub fn with_default_selector(
        pool: impl Into<String>,
        creator: Arc<dyn NodeCreator>,
        deleter: Arc<dyn NodeDeleter>,
        counter: Arc<dyn NodeCounter>,
    ) -> Self {
        Self::new(pool, creator, deleter, counter, Arc::new(DefaultSelector))
    }

    pub async fn current_count(&self) -> Result<u32, AutoscaleError> {
        self.counter.count(&self.pool).await
    }

    pub async fn scale_up(&self, count: u32) -> Result<Vec<String>, AutoscaleError> {
        self.creator.create_nodes(&self.pool, count).await
    }

    pub async fn scale_down(&self, count: u32) -> Result<Vec<String>, AutoscaleError> {
        let candidates = self.counter.list(&self.pool).await?;
        let names = self.selector.select_for_removal(&candidates, count);
        if names.is_empty() {
            return Ok(names);
        }
        self.deleter.delete_nodes(&names).await?;
        Ok(names)
    }
}
