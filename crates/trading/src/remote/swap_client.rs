use std::env;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info};
use url::Url;

use crate::traits::{SwapTrader, TradeError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
pub struct BuyRequest<'a> {
    pub mint: &'a str,
    pub sol_amount: f64,
    pub slippage: f64,
}

#[derive(Debug, Serialize)]
pub struct SellRequest<'a> {
    pub mint: &'a str,
    pub percentage: f64,
    pub slippage: f64,
}

#[derive(Debug, Deserialize)]
pub struct SwapResponse {
    pub success: bool,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP adapter for a swap execution service.
#[derive(Clone)]
pub struct HttpSwapClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    secret_key: Option<String>,
}

impl HttpSwapClient {
    pub fn new(
        base_url: Url,
        api_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, TradeError> {
        let client = Client::builder()
            .user_agent("swap_signal_bot/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            api_key,
            secret_key,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("SWAP_API_URL")
            .map_err(|_| anyhow::anyhow!("SWAP_API_URL must be set unless DRY_RUN=true"))?;
        let base_url = Url::parse(&raw)?;
        let api_key = env::var("SWAP_API_KEY").ok().filter(|k| !k.is_empty());
        let secret_key = env::var("SWAP_API_SECRET").ok().filter(|k| !k.is_empty());
        Ok(Self::new(base_url, api_key, secret_key)?)
    }

    fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret_key.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, TradeError> {
        self.base_url
            .join(path)
            .map_err(|e| TradeError::Rejected(format!("bad endpoint {path}: {e}")))
    }

    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<bool, TradeError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| TradeError::Rejected(format!("unserializable request: {e}")))?;

        let mut req = self
            .client
            .post(self.endpoint(path)?)
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        if let Some(signature) = self.sign(&body) {
            req = req.header("x-signature", signature);
        }

        let resp = req.body(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            error!("Swap API {} failed ({}): {}", path, status, body);
            return Err(TradeError::Api { status, body });
        }

        let swap = resp.json::<SwapResponse>().await?;
        match (swap.success, swap.error) {
            (true, _) => {
                info!(
                    "Swap {} confirmed: {}",
                    path,
                    swap.signature.as_deref().unwrap_or("-")
                );
                Ok(true)
            }
            (false, Some(reason)) => Err(TradeError::Rejected(reason)),
            (false, None) => Ok(false),
        }
    }
}

/// `join` replaces the last path segment unless the base ends in `/`,
/// so `https://host/api` must become `https://host/api/` first.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl SwapTrader for HttpSwapClient {
    async fn buy(&self, token: &str, sol_amount: f64, slippage: f64) -> Result<bool, TradeError> {
        self.post(
            "buy",
            &BuyRequest {
                mint: token,
                sol_amount,
                slippage,
            },
        )
        .await
    }

    async fn sell(
        &self,
        token: &str,
        sell_percent: f64,
        slippage: f64,
    ) -> Result<bool, TradeError> {
        self.post(
            "sell",
            &SellRequest {
                mint: token,
                percentage: sell_percent,
                slippage,
            },
        )
        .await
    }
}
