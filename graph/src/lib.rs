//! The resource graph and reconciler (component C3): the desired-state DAG
//! and the topological, dependency-aware apply/destroy walk over it.

mod error;
mod output;

pub use error::GraphError;
pub use output::OutputTable;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use fleetwright_common::EventEmitter;
use fleetwright_types::Event;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// The kind of work a vertex performs, mirrored from §3's `ResourceNode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Network,
    Firewall,
    Node,
    Bootstrap,
    Addon,
}

impl VertexKind {
    fn label(self) -> &'static str {
        match self {
            VertexKind::Network => "network",
            VertexKind::Firewall => "firewall",
            VertexKind::Node => "node",
            VertexKind::Bootstrap => "bootstrap",
            VertexKind::Addon => "addon",
        }
    }
}

/// Shared context every vertex's work function receives: the output table
/// it reads parent outputs from and publishes its own outputs into, a
/// cancellation token, and the event bus.
pub struct GraphContext {
    pub outputs: OutputTable,
    pub cancel: CancellationToken,
    pub events: EventEmitter,
}

impl GraphContext {
    pub fn new(events: EventEmitter, cancel: CancellationToken) -> Self {
        Self {
            outputs: OutputTable::new(),
            cancel,
            events,
        }
    }
}

/// One unit of reconcilable work (§3's `ResourceNode`). The work function
/// publishes its own outputs into `ctx.outputs` under its own id; it does
/// not return a value directly, since output types vary per vertex.
#[async_trait]
pub trait VertexWork: Send + Sync {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError>;

    /// Best-effort teardown. Errors are reported but never abort the sweep.
    async fn destroy(&self, _ctx: &GraphContext) -> Result<(), GraphError> {
        Ok(())
    }
}

pub struct ResourceNode {
    pub id: String,
    pub kind: VertexKind,
    pub parents: Vec<String>,
    /// Vertices sharing a `resource_key` are serialized against each other
    /// even when the DAG would otherwise allow them to run concurrently
    /// (§4.3: "one RKE2 action per node at a time").
    pub resource_key: Option<String>,
    pub work: Arc<dyn VertexWork>,
}

impl ResourceNode {
    pub fn new(
        id: impl Into<String>,
        kind: VertexKind,
        parents: Vec<String>,
        work: Arc<dyn VertexWork>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            parents,
            resource_key: None,
            work,
        }
    }

    pub fn with_resource_key(mut self, key: impl Into<String>) -> Self {
        self.resource_key = Some(key.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VertexStatus {
    Succeeded,
    Failed(String),
    SkippedFailed,
}

#[derive(Default)]
pub struct ReconcileReport {
    pub statuses: HashMap<String, VertexStatus>,
}

impl ReconcileReport {
    pub fn all_ok(&self) -> bool {
        self.statuses
            .values()
            .all(|s| matches!(s, VertexStatus::Succeeded))
    }

    pub fn into_result(self) -> Result<Self, GraphError> {
        let details: Vec<(String, String)> = self
            .statuses
            .iter()
            .filter_map(|(id, status)| match status {
                VertexStatus::Failed(msg) => Some((id.clone(), msg.clone())),
                VertexStatus::SkippedFailed => Some((id.clone(), "skipped: ancestor failed".to_string())),
                VertexStatus::Succeeded => None,
            })
            .collect();
        if details.is_empty() {
            Ok(self)
        } else {
            Err(GraphError::Aggregated {
                failed: details.len(),
                details,
            })
        }
    }
}

/// The desired-state DAG: vertices keyed by id, edges implied by `parents`.
#[derive(Default)]
pub struct ResourceGraph {
    nodes: HashMap<String, ResourceNode>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: ResourceNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds the `petgraph` view, validates every parent id resolves, and
    /// returns the topological order. Fails fast on a cycle — a bug in graph
    /// construction, not a runtime condition (§4.3 step 1).
    fn topo_order(&self) -> Result<Vec<String>, GraphError> {
        let mut graph = DiGraph::<String, ()>::new();
        let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
        for id in self.nodes.keys() {
            index_of.insert(id.clone(), graph.add_node(id.clone()));
        }
        for node in self.nodes.values() {
            for parent in &node.parents {
                let parent_idx = index_of
                    .get(parent)
                    .ok_or_else(|| GraphError::UnknownParent(node.id.clone(), parent.clone()))?;
                graph.add_edge(*parent_idx, index_of[&node.id], ());
            }
        }
        let order = toposort(&graph, None).map_err(|_| GraphError::Cycle)?;
        Ok(order.into_iter().map(|idx| graph[idx].clone()).collect())
    }

    fn out_degree(&self) -> HashMap<String, usize> {
        let mut degree: HashMap<String, usize> = self.nodes.keys().map(|id| (id.clone(), 0)).collect();
        for node in self.nodes.values() {
            for parent in &node.parents {
                if let Some(d) = degree.get_mut(parent) {
                    *d += 1;
                }
            }
        }
        degree
    }

    /// Walks the graph in dependency order, applying ready vertices in
    /// concurrent rounds bounded by `concurrency`, serializing any sharing a
    /// `resource_key`. A vertex's failure marks every transitive descendant
    /// `SkippedFailed`; independent subgraphs still run to completion.
    pub async fn apply(
        &self,
        ctx: &GraphContext,
        concurrency: usize,
    ) -> Result<ReconcileReport, GraphError> {
        let order = self.topo_order()?;
        let out_degree = self.out_degree();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let resource_locks: HashMap<String, Arc<AsyncMutex<()>>> = self
            .nodes
            .values()
            .filter_map(|n| n.resource_key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .map(|key| (key, Arc::new(AsyncMutex::new(()))))
            .collect();

        let mut remaining_parents: HashMap<String, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.parents.len()))
            .collect();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for node in self.nodes.values() {
            for parent in &node.parents {
                children.entry(parent.clone()).or_default().push(node.id.clone());
            }
        }

        let mut report = ReconcileReport::default();
        let mut ready: Vec<String> = order
            .iter()
            .filter(|id| remaining_parents.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();

        while !ready.is_empty() {
            // Tie-break: higher out-degree descends first, lex name breaks ties.
            ready.sort_by(|a, b| {
                out_degree[b]
                    .cmp(&out_degree[a])
                    .then_with(|| a.cmp(b))
            });

            let mut handles = Vec::new();
            for id in ready.drain(..) {
                let node_parents = &self.nodes[&id].parents;
                let ancestor_failed = node_parents.iter().any(|p| {
                    matches!(
                        report.statuses.get(p),
                        Some(VertexStatus::Failed(_)) | Some(VertexStatus::SkippedFailed)
                    )
                });
                if ancestor_failed {
                    report.statuses.insert(id.clone(), VertexStatus::SkippedFailed);
                    continue;
                }

                let semaphore = semaphore.clone();
                let lock = self.nodes[&id]
                    .resource_key
                    .as_ref()
                    .map(|k| resource_locks[k].clone());
                let work = self.nodes[&id].work.clone();
                let kind = self.nodes[&id].kind;
                let vid = id.clone();
                let cancel = ctx.cancel.clone();

                // SAFETY for lifetimes: `ctx` is borrowed for the duration of
                // this function's await, and every spawned future is joined
                // before `apply` returns, so the borrow outlives the tasks.
                let ctx_ref: &GraphContext = ctx;
                handles.push(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                    let _resource_guard = match lock {
                        Some(l) => Some(l.lock_owned().await),
                        None => None,
                    };
                    if cancel.is_cancelled() {
                        return (vid, VertexStatus::Failed("cancelled".to_string()));
                    }
                    fleetwright_common::metrics::vertex_evaluated(kind.label());
                    let started = std::time::Instant::now();
                    let outcome = work.apply(ctx_ref).await;
                    fleetwright_common::metrics::vertex_duration(
                        kind.label(),
                        started.elapsed().as_secs_f64(),
                    );
                    match outcome {
                        Ok(()) => {
                            ctx_ref.events.emit(
                                Event::new("vertex_succeeded", "graph").with("vertex", vid.clone()),
                            );
                            (vid, VertexStatus::Succeeded)
                        }
                        Err(e) => {
                            fleetwright_common::metrics::vertex_failed(kind.label());
                            ctx_ref.events.emit(
                                Event::new("vertex_failed", "graph")
                                    .with("vertex", vid.clone())
                                    .with("error", e.to_string()),
                            );
                            (vid, VertexStatus::Failed(e.to_string()))
                        }
                    }
                });
            }

            let results = futures::future::join_all(handles).await;
            let mut next_ready = Vec::new();
            for (id, status) in results {
                report.statuses.insert(id.clone(), status);
                for child in children.get(&id).cloned().unwrap_or_default() {
                    if let Some(count) = remaining_parents.get_mut(&child) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next_ready.push(child);
                        }
                    }
                }
            }
            ready = next_ready;
        }

        Ok(report)
    }

    /// Reverse-topological, best-effort teardown: every vertex's `destroy`
    /// runs regardless of whether an earlier one failed.
    pub async fn destroy(&self, ctx: &GraphContext) -> ReconcileReport {
        let mut order = match self.topo_order() {
            Ok(order) => order,
            Err(_) => self.nodes.keys().cloned().collect(),
        };
        order.reverse();

        let mut report = ReconcileReport::default();
        for id in order {
            let node = &self.nodes[&id];
            match node.work.destroy(ctx).await {
                Ok(()) => {
                    report.statuses.insert(id.clone(), VertexStatus::Succeeded);
                }
                Err(e) => {
                    tracing::warn!(vertex = %id, error = %e, "best-effort destroy failed");
                    ctx.events.emit(
                        Event::new("vertex_destroy_failed", "graph")
                            .with("vertex", id.clone())
                            .with("error", e.to_string()),
                    );
                    report.statuses.insert(id.clone(), VertexStatus::Failed(e.to_string()));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingWork {
        id: String,
        order: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl VertexWork for RecordingWork {
        async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
            self.order.lock().unwrap().push(self.id.clone());
            ctx.outputs.publish(&self.id, self.id.clone());
            if self.fail {
                Err(GraphError::MissingOutput("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn work(id: &str, order: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn VertexWork> {
        Arc::new(RecordingWork {
            id: id.to_string(),
            order: order.clone(),
            fail,
        })
    }

    fn ctx() -> GraphContext {
        GraphContext::new(EventEmitter::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn applies_in_dependency_respecting_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new("net", VertexKind::Network, vec![], work("net", &order, false)));
        graph.add(ResourceNode::new(
            "node-0",
            VertexKind::Node,
            vec!["net".to_string()],
            work("node-0", &order, false),
        ));
        graph.add(ResourceNode::new(
            "fw",
            VertexKind::Firewall,
            vec!["net".to_string()],
            work("fw", &order, false),
        ));

        let context = ctx();
        let report = graph.apply(&context, 4).await.unwrap();
        assert!(report.all_ok());
        let seen = order.lock().unwrap().clone();
        assert_eq!(seen[0], "net");
        assert!(seen.contains(&"node-0".to_string()));
        assert!(seen.contains(&"fw".to_string()));
    }

    #[tokio::test]
    async fn cycle_is_rejected_before_any_work_runs() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new("a", VertexKind::Node, vec!["b".to_string()], work("a", &order, false)));
        graph.add(ResourceNode::new("b", VertexKind::Node, vec!["a".to_string()], work("b", &order, false)));
        let context = ctx();
        let err = graph.apply(&context, 4).await.unwrap_err();
        assert!(matches!(err, GraphError::Cycle));
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_marks_descendants_skipped_but_independent_subgraph_completes() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new("root", VertexKind::Network, vec![], work("root", &order, true)));
        graph.add(ResourceNode::new(
            "child",
            VertexKind::Node,
            vec!["root".to_string()],
            work("child", &order, false),
        ));
        graph.add(ResourceNode::new("other", VertexKind::Node, vec![], work("other", &order, false)));

        let context = ctx();
        let report = graph.apply(&context, 4).await.unwrap();
        assert!(matches!(report.statuses["root"], VertexStatus::Failed(_)));
        assert_eq!(report.statuses["child"], VertexStatus::SkippedFailed);
        assert_eq!(report.statuses["other"], VertexStatus::Succeeded);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, GraphError::Aggregated { failed: 2, .. }));
    }

    #[tokio::test]
    async fn unknown_parent_is_reported_not_panicked() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new(
            "child",
            VertexKind::Node,
            vec!["missing".to_string()],
            work("child", &order, false),
        ));
        let context = ctx();
        let err = graph.apply(&context, 4).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownParent(_, _)));
    }

    #[tokio::test]
    async fn destroy_runs_every_vertex_even_when_one_fails() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingWork(Arc<AtomicUsize>, bool);
        #[async_trait]
        impl VertexWork for CountingWork {
            async fn apply(&self, _ctx: &GraphContext) -> Result<(), GraphError> {
                Ok(())
            }
            async fn destroy(&self, _ctx: &GraphContext) -> Result<(), GraphError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                if self.1 {
                    Err(GraphError::MissingOutput("cleanup failed".to_string()))
                } else {
                    Ok(())
                }
            }
        }
        let mut graph = ResourceGraph::new();
        graph.add(ResourceNode::new("a", VertexKind::Node, vec![], Arc::new(CountingWork(calls.clone(), true))));
        graph.add(ResourceNode::new(
            "b",
            VertexKind::Node,
            vec!["a".to_string()],
            Arc::new(CountingWork(calls.clone(), false)),
        ));
        let _ = order;
        let context = ctx();
        let report = graph.destroy(&context).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!report.all_ok());
    }
}
