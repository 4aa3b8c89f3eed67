//! The autoscaling control loop (§4.7): a single long-lived task per
//! cluster that periodically evaluates the active strategy and, honoring
//! per-direction cooldowns, drives the `NodeScaler`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleetwright_common::metrics as fw_metrics;
use fleetwright_common::EventEmitter;
use fleetwright_types::{AutoScalingStatus, Event};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::AutoscaleError;
use crate::scaler::NodeScaler;
use crate::strategy::{AutoscaleConfig, Metrics, Strategy};

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleAction {
    None,
    ScaledUp(u32),
    ScaledDown(u32),
}

pub struct AutoscalingManager {
    cfg: AutoscaleConfig,
    strategy: Box<dyn Strategy>,
    scaler: NodeScaler,
    scale_up_cooldown: Duration,
    scale_down_delay: Duration,
    check_interval: Duration,
    status: RwLock<AutoScalingStatus>,
    events: Option<EventEmitter>,
    running: Arc<AtomicBool>,
}

impl AutoscalingManager {
    pub fn new(
        cfg: AutoscaleConfig,
        strategy: Box<dyn Strategy>,
        scaler: NodeScaler,
        scale_up_cooldown: Duration,
        scale_down_delay: Duration,
        events: Option<EventEmitter>,
    ) -> Self {
        let status = AutoScalingStatus {
            enabled: true,
            current_nodes: 0,
            min_nodes: cfg.min_nodes,
            max_nodes: cfg.max_nodes,
            strategy: strategy.name().to_string(),
            last_scale_up: None,
            last_scale_down: None,
            running: false,
        };
        Self {
            cfg,
            strategy,
            scaler,
            scale_up_cooldown,
            scale_down_delay,
            check_interval: scale_up_cooldown.min(DEFAULT_CHECK_INTERVAL).max(Duration::from_secs(1)),
            status: RwLock::new(status),
            events,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn status(&self) -> AutoScalingStatus {
        self.status.read().await.clone()
    }

    fn emit(&self, kind: &str) {
        if let Some(events) = &self.events {
            events.emit(Event::new(kind, "autoscale"));
        }
    }

    /// Runs one evaluation cycle: a scale-up verdict always takes priority
    /// over scale-down (§4.7 step 3).
    pub async fn evaluate(&self, metrics: &Metrics) -> Result<ScaleAction, AutoscaleError> {
        let current = self.scaler.current_count().await.map_err(|e| AutoscaleError::Scaler(e.to_string()))?;
        {
            let mut status = self.status.write().await;
            status.current_nodes = current;
        }

        let (scale_up, add_n) = self.strategy.should_scale_up(metrics, &self.cfg);
        if scale_up {
            let mut status = self.status.write().await;
            let cooled_down = status
                .last_scale_up
                .map(|t| Utc::now() - t >= chrono::Duration::from_std(self.scale_up_cooldown).unwrap_or_default())
                .unwrap_or(true);
            if cooled_down {
                let to_add = add_n.min(self.cfg.max_nodes.saturating_sub(current));
                if to_add > 0 {
                    drop(status);
                    self.emit("autoscaling_scale_up_start");
                    match self.scaler.scale_up(to_add).await {
                        Ok(_) => {
                            let mut status = self.status.write().await;
                            status.last_scale_up = Some(Utc::now());
                            status.current_nodes = current + to_add;
                            fw_metrics::autoscale_decision("up");
                            drop(status);
                            self.emit("autoscaling_scale_up_complete");
                            return Ok(ScaleAction::ScaledUp(to_add));
                        }
                        Err(e) => {
                            self.emit("autoscaling_scale_up_failed");
                            return Err(AutoscaleError::Scaler(e.to_string()));
                        }
                    }
                }
            }
            return Ok(ScaleAction::None);
        }

        let (scale_down, remove_n) = self.strategy.should_scale_down(metrics, &self.cfg);
        if scale_down && current > self.cfg.min_nodes {
            let mut status = self.status.write().await;
            let cooled_down = status
                .last_scale_down
                .map(|t| Utc::now() - t >= chrono::Duration::from_std(self.scale_down_delay).unwrap_or_default())
                .unwrap_or(true);
            if cooled_down {
                let to_remove = remove_n.min(current - self.cfg.min_nodes);
                if to_remove > 0 {
                    drop(status);
                    self.emit("autoscaling_scale_down_start");
                    match self.scaler.scale_down(to_remove).await {
                        Ok(removed) => {
                            let mut status = self.status.write().await;
                            status.last_scale_down = Some(Utc::now());
                            status.current_nodes = current.saturating_sub(removed.len() as u32);
                            fw_metrics::autoscale_decision("down");
                            drop(status);
                            self.emit("autoscaling_scale_down_complete");
                            return Ok(ScaleAction::ScaledDown(removed.len() as u32));
                        }
                        Err(e) => {
                            self.emit("autoscaling_scale_down_failed");
                            return Err(AutoscaleError::Scaler(e.to_string()));
                        }
                    }
                }
            }
        }

        Ok(ScaleAction::None)
    }

    /// Drives `evaluate` on `check_interval` until `cancel` fires. Refuses
    /// to run a second instance concurrently (§4.7 step 1).
    pub async fn run<F>(&self, metrics_source: F, cancel: CancellationToken) -> Result<(), AutoscaleError>
    where
        F: Fn() -> Metrics + Send + Sync,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AutoscaleError::AlreadyRunning);
        }
        {
            let mut status = self.status.write().await;
            status.running = true;
        }
        let result = self.run_loop(&metrics_source, &cancel).await;
        {
            let mut status = self.status.write().await;
            status.running = false;
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_loop(&self, metrics_source: &dyn Fn() -> Metrics, cancel: &CancellationToken) -> Result<(), AutoscaleError> {
        let mut interval = tokio::time::interval(self.check_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    let metrics = metrics_source();
                    if let Err(e) = self.evaluate(&metrics).await {
                        tracing::warn!(error = %e, "autoscale evaluation failed");
                        self.emit("autoscaling_error");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::{NodeCounter, NodeCreator, NodeDeleter, ScalableNode};
    use crate::strategy::CompositeStrategy;
    use crate::strategy::CpuStrategy;
    use crate::strategy::MemoryStrategy;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedCapability {
        count: AtomicU32Cell,
    }

    struct AtomicU32Cell(Mutex<u32>);

    #[async_trait]
    impl NodeCreator for FixedCapability {
        async fn create_nodes(&self, _pool: &str, count: u32) -> Result<Vec<String>, AutoscaleError> {
            let mut c = self.count.0.lock().unwrap();
            *c += count;
            Ok((0..count).map(|i| format!("new-{i}")).collect())
        }
    }

    #[async_trait]
    impl NodeDeleter for FixedCapability {
        async fn delete_nodes(&self, names: &[String]) -> Result<(), AutoscaleError> {
            let mut c = self.count.0.lock().unwrap();
            *c = c.saturating_sub(names.len() as u32);
            Ok(())
        }
    }

    #[async_trait]
    impl NodeCounter for FixedCapability {
        async fn count(&self, _pool: &str) -> Result<u32, AutoscaleError> {
            Ok(*self.count.0.lock().unwrap())
        }

        async fn list(&self, _pool: &str) -> Result<Vec<ScalableNode>, AutoscaleError> {
            let n = *self.count.0.lock().unwrap();
            Ok((0..n)
                .map(|i| ScalableNode {
                    name: format!("workers-{i}"),
                    is_worker: true,
                    created_at: Utc::now() - chrono::Duration::seconds(i as i64),
                    labels: HashMap::new(),
                })
                .collect())
        }
    }

    fn manager(current: u32) -> (AutoscalingManager, Arc<FixedCapability>) {
        let cap = Arc::new(FixedCapability {
            count: AtomicU32Cell(Mutex::new(current)),
        });
        let scaler = NodeScaler::with_default_selector("workers", cap.clone(), cap.clone(), cap.clone());
        let strategy: Box<dyn Strategy> = Box::new(CompositeStrategy::new(vec![
            Box::new(CpuStrategy::default()),
            Box::new(MemoryStrategy::default()),
        ]));
        let cfg = AutoscaleConfig {
            min_nodes: 1,
            max_nodes: 10,
            target_cpu_percent: 70.0,
            target_memory_percent: 75.0,
        };
        let mgr = AutoscalingManager::new(
            cfg,
            strategy,
            scaler,
            Duration::from_secs(300),
            Duration::from_secs(300),
            None,
        );
        (mgr, cap)
    }

    #[tokio::test]
    async fn scenario_five_composite_guard_blocks_then_allows_scale_down() {
        let (mgr, cap) = manager(3);
        let blocked = mgr
            .evaluate(&Metrics { cpu_percent: 30.0, memory_percent: 60.0, custom: None })
            .await
            .unwrap();
        assert_eq!(blocked, ScaleAction::None);
        assert_eq!(*cap.count.0.lock().unwrap(), 3);

        let allowed = mgr
            .evaluate(&Metrics { cpu_percent: 30.0, memory_percent: 40.0, custom: None })
            .await
            .unwrap();
        assert_eq!(allowed, ScaleAction::ScaledDown(1));
        assert_eq!(*cap.count.0.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn scale_down_never_crosses_min_nodes_floor() {
        let (mgr, cap) = manager(1);
        let action = mgr
            .evaluate(&Metrics { cpu_percent: 10.0, memory_percent: 10.0, custom: None })
            .await
            .unwrap();
        assert_eq!(action, ScaleAction::None);
        assert_eq!(*cap.count.0.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn scale_up_is_cooldown_gated() {
        let (mgr, cap) = manager(2);
        let first = mgr
            .evaluate(&Metrics { cpu_percent: 150.0, memory_percent: 90.0, custom: None })
            .await
            .unwrap();
        assert!(matches!(first, ScaleAction::ScaledUp(_)));
        let count_after_first = *cap.count.0.lock().unwrap();

        let second = mgr
            .evaluate(&Metrics { cpu_percent: 150.0, memory_percent: 90.0, custom: None })
            .await
            .unwrap();
        assert_eq!(second, ScaleAction::None);
        assert_eq!(*cap.count.0.lock().unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn second_concurrent_run_is_refused() {
        let (mgr, _cap) = manager(2);
        let mgr = Arc::new(mgr);
        let cancel = CancellationToken::new();

        let mgr2 = mgr.clone();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { mgr2.run(Metrics::default, cancel2).await });
        tokio::task::yield_now().await;

        let err = mgr.run(Metrics::default, cancel.clone()).await.unwrap_err();
        assert!(matches!(err, AutoscaleError::AlreadyRunning));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
