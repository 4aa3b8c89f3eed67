//! Scaling strategies (§4.7): a `Strategy` consults the latest metrics and
//! the resolved config to decide whether to scale up or down, and by how
//! many nodes. `margin` is the gap below target at which a low-utilization
//! signal counts as "comfortably idle" rather than merely "not over target" —
//! without it, a metric sitting exactly at target would oscillate between
//! scale-up and scale-down on every tick.

/// A point-in-time reading of cluster utilization.
#[derive(Clone, Copy, Debug, Default)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub custom: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct AutoscaleConfig {
    pub min_nodes: u32,
    pub max_nodes: u32,
    pub target_cpu_percent: f64,
    pub target_memory_percent: f64,
}

const DEFAULT_MARGIN: f64 = 15.0;

/// `ShouldScaleUp`/`ShouldScaleDown` from §4.7, returning whether to act and
/// how many nodes to add (scale-up) or remove (scale-down is always by one
/// at a time per the manager's own guard, but the strategy still reports a
/// magnitude for callers that want it).
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn should_scale_up(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32);
    fn should_scale_down(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32);
}

pub struct CpuStrategy {
    pub margin: f64,
}

impl Default for CpuStrategy {
    fn default() -> Self {
        Self { margin: DEFAULT_MARGIN }
    }
}

impl Strategy for CpuStrategy {
    fn name(&self) -> &str {
        "cpu"
    }

    fn should_scale_up(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        scale_up_by_ratio(metrics.cpu_percent, cfg.target_cpu_percent)
    }

    fn should_scale_down(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        scale_down_below_margin(metrics.cpu_percent, cfg.target_cpu_percent, self.margin)
    }
}

pub struct MemoryStrategy {
    pub margin: f64,
}

impl Default for MemoryStrategy {
    fn default() -> Self {
        Self { margin: DEFAULT_MARGIN }
    }
}

impl Strategy for MemoryStrategy {
    fn name(&self) -> &str {
        "memory"
    }

    fn should_scale_up(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        scale_up_by_ratio(metrics.memory_percent, cfg.target_memory_percent)
    }

    fn should_scale_down(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        scale_down_below_margin(metrics.memory_percent, cfg.target_memory_percent, self.margin)
    }
}

fn scale_up_by_ratio(value: f64, target: f64) -> (bool, u32) {
    if target <= 0.0 || value <= target {
        return (false, 0);
    }
    let magnitude = ((value - target) / target).ceil().max(1.0) as u32;
    (true, magnitude)
}

fn scale_down_below_margin(value: f64, target: f64, margin: f64) -> (bool, u32) {
    if value < target - margin {
        (true, 1)
    } else {
        (false, 0)
    }
}

/// Scale up if ANY wrapped strategy demands it (taking the largest requested
/// magnitude); scale down only if ALL wrapped strategies agree (taking the
/// smallest requested magnitude, i.e. the most conservative one).
pub struct CompositeStrategy {
    strategies: Vec<Box<dyn Strategy>>,
}

impl CompositeStrategy {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }
}

impl Strategy for CompositeStrategy {
    fn name(&self) -> &str {
        "composite"
    }

    fn should_scale_up(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        self.strategies
            .iter()
            .filter_map(|s| {
                let (yes, n) = s.should_scale_up(metrics, cfg);
                yes.then_some(n)
            })
            .max()
            .map(|n| (true, n))
            .unwrap_or((false, 0))
    }

    fn should_scale_down(&self, metrics: &Metrics, cfg: &AutoscaleConfig) -> (bool, u32) {
        if self.strategies.is_empty() {
            return (false, 0);
        }
        let votes: Vec<(bool, u32)> = self
            .strategies
            .iter()
            .map(|s| s.should_scale_down(metrics, cfg))
            .collect();
        if votes.iter().all(|(yes, _)| *yes) {
            let magnitude = votes.iter().map(|(_, n)| *n).min().unwrap_or(1);
            (true, magnitude)
        } else {
            (false, 0)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomDirection {
    Up,
    Down,
}

/// A user-supplied custom metric threshold, read from `Metrics::custom`. A
/// missing custom reading never triggers a scale action.
pub struct CustomStrategy {
    pub threshold: f64,
    pub direction: CustomDirection,
}

impl Strategy for CustomStrategy {
    fn name(&self) -> &str {
        "custom"
    }

    fn should_scale_up(&self, metrics: &Metrics, _cfg: &AutoscaleConfig) -> (bool, u32) {
        match (self.direction, metrics.custom) {
            (CustomDirection::Up, Some(v)) if v > self.threshold => (true, 1),
            _ => (false, 0),
        }
    }

    fn should_scale_down(&self, metrics: &Metrics, _cfg: &AutoscaleConfig) -> (bool, u32) {
        match (self.direction, metrics.custom) {
            (CustomDirection::Down, Some(v)) if v < self.threshold => (true, 1),
            _ => (false, 0),
        }
    }
}
