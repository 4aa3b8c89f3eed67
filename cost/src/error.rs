use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("no price data for provider '{provider}', size '{size}', region '{region}'")]
    NoPriceData {
        provider: String,
        size: String,
        region: String,
    },
}
