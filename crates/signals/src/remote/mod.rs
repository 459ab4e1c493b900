use std::env;

use thiserror::Error;
use url::Url;

pub mod feed_message;

pub use feed_message::{ChannelMessage, Embed};

const DEFAULT_FEED_URL: &str = "ws://127.0.0.1:8765/signals";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("malformed feed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid feed url {0:?}: {1}")]
    BadUrl(String, url::ParseError),
    #[error("feed url must use ws:// or wss://, got {0}")]
    BadScheme(String),
}

pub fn get_feed_url() -> Result<Url, FeedError> {
    let raw = env::var("SIGNAL_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());
    parse_feed_url(&raw)
}

pub fn parse_feed_url(raw: &str) -> Result<Url, FeedError> {
    let url = Url::parse(raw).map_err(|e| FeedError::BadUrl(raw.to_string(), e))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(FeedError::BadScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url_schemes() {
        assert!(parse_feed_url("wss://relay.example/feed").is_ok());
        assert!(matches!(
            parse_feed_url("https://relay.example/feed"),
            Err(FeedError::BadScheme(s)) if s == "https"
        ));
        assert!(matches!(parse_feed_url("not a url"), Err(FeedError::BadUrl(..))));
    }
}
