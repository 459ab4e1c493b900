use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("swap request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("swap api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("swap rejected: {0}")]
    Rejected(String),
}

/// The external swap primitive. `Ok(false)` and `Err(_)` are both failed
/// attempts to the caller; only the error carries a reason.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SwapTrader: Send + Sync {
    async fn buy(&self, token: &str, sol_amount: f64, slippage: f64) -> Result<bool, TradeError>;

    async fn sell(&self, token: &str, sell_percent: f64, slippage: f64)
    -> Result<bool, TradeError>;
}
