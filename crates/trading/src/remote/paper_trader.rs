use async_trait::async_trait;
use tracing::info;

use crate::traits::{SwapTrader, TradeError};

/// Dry-run trader: every swap succeeds and nothing leaves the process.
#[derive(Debug, Default, Clone)]
pub struct PaperTrader;

#[async_trait]
impl SwapTrader for PaperTrader {
    async fn buy(&self, token: &str, sol_amount: f64, slippage: f64) -> Result<bool, TradeError> {
        info!("[DRY RUN] buy {} for {} SOL at {}% slippage", token, sol_amount, slippage);
        Ok(true)
    }

    async fn sell(
        &self,
        token: &str,
        sell_percent: f64,
        slippage: f64,
    ) -> Result<bool, TradeError> {
        info!("[DRY RUN] sell {}% of {} at {}% slippage", sell_percent, token, slippage);
        Ok(true)
    }
}
