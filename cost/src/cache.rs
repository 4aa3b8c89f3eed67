//! TTL-bounded price cache (§4.11). Keyed by `provider:size:region:spot`;
//! grounded on `common/src/wait_registry.rs`'s `Arc<Mutex<HashMap<K,
//! (V,Instant)>>>` cache-with-expiry shape.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::price::PriceQuote;

fn cache_key(provider: &str, size: &str, region: &str, spot: bool) -> String {
    format!("{provider}:{size}:{region}:{spot}")
}

struct Entry {
    quote: PriceQuote,
    inserted_at: Instant,
}

/// A read-many/write-one price cache with a fixed TTL. Reads that find a
/// stale entry fall through as a miss; the caller is responsible for
/// refilling via `insert`.
pub struct PriceCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(3600))
    }

    pub fn get(&self, provider: &str, size: &str, region: &str, spot: bool) -> Option<PriceQuote> {
        let key = cache_key(provider, size, region, spot);
        let entries = self.entries.lock().expect("price cache lock poisoned");
        entries.get(&key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.quote)
            } else {
                None
            }
        })
    }

    pub fn insert(&self, provider: &str, size: &str, region: &str, spot: bool, quote: PriceQuote) {
        let key = cache_key(provider, size, region, spot);
        let mut entries = self.entries.lock().expect("price cache lock poisoned");
        entries.insert(
            key,
            Entry {
                quote,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("price cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(hourly: f64) -> PriceQuote {
        PriceQuote {
            instance_hourly: hourly,
            spot_hourly: hourly / 3.0,
            storage_per_gb_month: 0.10,
            network_per_gb: 0.01,
        }
    }

    #[test]
    fn miss_then_hit_after_insert() {
        let cache = PriceCache::new(Duration::from_secs(60));
        assert!(cache.get("digitalocean", "s-2vcpu-4gb", "nyc3", false).is_none());
        cache.insert("digitalocean", "s-2vcpu-4gb", "nyc3", false, quote(0.028));
        let hit = cache.get("digitalocean", "s-2vcpu-4gb", "nyc3", false).unwrap();
        assert_eq!(hit.instance_hourly, 0.028);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = PriceCache::new(Duration::from_millis(1));
        cache.insert("digitalocean", "s-2vcpu-4gb", "nyc3", false, quote(0.028));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("digitalocean", "s-2vcpu-4gb", "nyc3", false).is_none());
    }

    #[test]
    fn spot_and_on_demand_are_distinct_keys() {
        let cache = PriceCache::new(Duration::from_secs(60));
        cache.insert("digitalocean", "s-2vcpu-4gb", "nyc3", false, quote(0.028));
        assert!(cache.get("digitalocean", "s-2vcpu-4gb", "nyc3", true).is_none());
    }
}
