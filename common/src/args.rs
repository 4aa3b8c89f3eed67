//! Engine-wide operational configuration (ambient concern A3). These are
//! knobs for the *engine itself* — concurrency caps, polling cadences, cache
//! TTLs — never for the declarative cluster manifest, which is parsed
//! upstream of this crate. Follows the sibling services' `clap` derive +
//! `env` convention so every flag is also settable from the environment.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct EngineArgs {
    /// Max concurrent in-flight operations per provider
    #[arg(long, env = "FLEETWRIGHT_PROVIDER_CONCURRENCY", default_value_t = 4)]
    pub provider_concurrency: usize,

    /// Global ceiling on concurrently running reconcile tasks
    #[arg(long, env = "FLEETWRIGHT_TASK_CEILING", default_value_t = 32)]
    pub task_ceiling: usize,

    /// Default readiness-poll cadence, in milliseconds
    #[arg(long, env = "FLEETWRIGHT_POLL_INTERVAL_MS", default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    /// Price cache TTL, in seconds
    #[arg(long, env = "FLEETWRIGHT_PRICE_CACHE_TTL_SECS", default_value_t = 3_600)]
    pub price_cache_ttl_secs: u64,

    /// Event bus buffer size (events retained for slow subscribers)
    #[arg(long, env = "FLEETWRIGHT_EVENT_BUFFER", default_value_t = 256)]
    pub event_buffer: usize,
}

impl Default for EngineArgs {
    fn default() -> Self {
        Self {
            provider_concurrency: 4,
            task_ceiling: 32,
            poll_interval_ms: 5_000,
            price_cache_ttl_secs: 3_600,
            event_buffer: 256,
        }
    }
}
