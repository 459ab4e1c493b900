use std::{env, time::Duration};

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{0}")]
    OutOfRange(String),
}

/// Trading knobs, one per recognized option.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub hold_time: TimeDelta,
    pub max_buy_attempts: u32,
    pub raydium_only: bool,
    pub sol_amount: f64,
    pub sell_percentage: f64,
    pub buy_slippage: f64,
    pub sell_slippage: f64,
    pub slippage_increase: f64,
    pub max_sell_slippage: f64,
    /// `None` keeps retrying a sell forever.
    pub max_sell_attempts: Option<u32>,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            hold_time: TimeDelta::seconds(1),
            max_buy_attempts: 5,
            raydium_only: true,
            sol_amount: 0.01,
            sell_percentage: 100.0,
            buy_slippage: 30.0,
            sell_slippage: 30.0,
            slippage_increase: 5.0,
            max_sell_slippage: 95.0,
            max_sell_attempts: None,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl TradingConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for
    /// unset keys, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOLD_TIME") {
            let secs = parse_u64("HOLD_TIME", &v)?;
            cfg.hold_time = i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .ok_or_else(|| ConfigError::OutOfRange(format!("HOLD_TIME {secs}s is too large")))?;
        }
        if let Some(v) = get("MAX_BUY_ATTEMPTS") {
            cfg.max_buy_attempts = parse_u32("MAX_BUY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("RAYDIUM_ONLY") {
            cfg.raydium_only = parse_bool("RAYDIUM_ONLY", &v)?;
        }
        if let Some(v) = get("SOL_AMOUNT") {
            cfg.sol_amount = parse_f64("SOL_AMOUNT", &v)?;
        }
        if let Some(v) = get("SELL_PERCENTAGE") {
            cfg.sell_percentage = parse_f64("SELL_PERCENTAGE", &v)?;
        }
        if let Some(v) = get("BUY_SLIPPAGE") {
            cfg.buy_slippage = parse_f64("BUY_SLIPPAGE", &v)?;
        }
        if let Some(v) = get("SELL_SLIPPAGE") {
            cfg.sell_slippage = parse_f64("SELL_SLIPPAGE", &v)?;
        }
        if let Some(v) = get("SLIPPAGE_INCREASE") {
            cfg.slippage_increase = parse_f64("SLIPPAGE_INCREASE", &v)?;
        }
        if let Some(v) = get("MAX_SELL_SLIPPAGE") {
            cfg.max_sell_slippage = parse_f64("MAX_SELL_SLIPPAGE", &v)?;
        }
        if let Some(v) = get("MAX_SELL_ATTEMPTS") {
            let n = parse_u32("MAX_SELL_ATTEMPTS", &v)?;
            cfg.max_sell_attempts = (n > 0).then_some(n);
        }
        if let Some(v) = get("RETRY_DELAY_MS") {
            cfg.retry_delay = Duration::from_millis(parse_u64("RETRY_DELAY_MS", &v)?);
        }
        if let Some(v) = get("POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(parse_u64("POLL_INTERVAL_MS", &v)?);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buy_attempts == 0 {
            return Err(ConfigError::OutOfRange(
                "MAX_BUY_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.sol_amount <= 0.0 {
            return Err(ConfigError::OutOfRange("SOL_AMOUNT must be positive".into()));
        }
        if !(self.sell_percentage > 0.0 && self.sell_percentage <= 100.0) {
            return Err(ConfigError::OutOfRange(
                "SELL_PERCENTAGE must be in (0, 100]".into(),
            ));
        }
        for (key, value) in [
            ("BUY_SLIPPAGE", self.buy_slippage),
            ("SELL_SLIPPAGE", self.sell_slippage),
            ("MAX_SELL_SLIPPAGE", self.max_sell_slippage),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange(format!(
                    "{key} must be a percentage in [0, 100], got {value}"
                )));
            }
        }
        if self.slippage_increase < 0.0 {
            return Err(ConfigError::OutOfRange(
                "SLIPPAGE_INCREASE must not be negative".into(),
            ));
        }
        if self.sell_slippage > self.max_sell_slippage {
            return Err(ConfigError::OutOfRange(format!(
                "SELL_SLIPPAGE ({}) exceeds MAX_SELL_SLIPPAGE ({})",
                self.sell_slippage, self.max_sell_slippage
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange(
                "POLL_INTERVAL_MS must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_f64(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            expected: "a number",
        })
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        expected: "a non-negative integer",
    })
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        expected: "a non-negative integer",
    })
}
