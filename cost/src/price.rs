//! Per-cloud price tables (§4.11). A `PriceQuote` bundles everything one
//! size/region lookup yields; providers never see the requesting node's
//! spot preference, only its size and region.

use async_trait::async_trait;
use fleetwright_types::CloudProvider;

use crate::error::CostError;

#[derive(Clone, Copy, Debug)]
pub struct PriceQuote {
    pub instance_hourly: f64,
    pub spot_hourly: f64,
    pub storage_per_gb_month: f64,
    pub network_per_gb: f64,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn price(&self, size: &str, region: &str) -> Result<PriceQuote, CostError>;
}

/// A small built-in price table covering the sizes exercised by this
/// engine's own tests; a real deployment would swap this for a driver that
/// calls the cloud's pricing API.
pub struct StaticPriceProvider {
    provider: CloudProvider,
    rows: Vec<(&'static str, PriceQuote)>,
    default_quote: PriceQuote,
}

impl StaticPriceProvider {
    pub fn digital_ocean() -> Self {
        Self {
            provider: CloudProvider::DigitalOcean,
            rows: vec![
                (
                    "s-2vcpu-4gb",
                    PriceQuote {
                        instance_hourly: 0.028,
                        spot_hourly: 0.0084,
                        storage_per_gb_month: 0.10,
                        network_per_gb: 0.01,
                    },
                ),
                (
                    "s-4vcpu-8gb",
                    PriceQuote {
                        instance_hourly: 0.056,
                        spot_hourly: 0.0168,
                        storage_per_gb_month: 0.10,
                        network_per_gb: 0.01,
                    },
                ),
            ],
            default_quote: PriceQuote {
                instance_hourly: 0.05,
                spot_hourly: 0.015,
                storage_per_gb_month: 0.10,
                network_per_gb: 0.01,
            },
        }
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    async fn price(&self, size: &str, _region: &str) -> Result<PriceQuote, CostError> {
        Ok(self.rows.iter().find(|(s, _)| *s == size).map(|(_, q)| *q).unwrap_or(self.default_quote))
    }
}

impl StaticPriceProvider {
    pub fn provider(&self) -> CloudProvider {
        self.provider
    }
}
