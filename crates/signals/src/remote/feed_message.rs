use serde::Deserialize;

use common::models::{NotificationField, NotificationPayload};

use super::FeedError;

/// A chat message as relayed onto the signal feed.
#[derive(Debug, Deserialize)]
pub struct ChannelMessage {
    pub channel_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<NotificationField>,
}

impl ChannelMessage {
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Messages from other channels are not ours to act on.
    pub fn is_from(&self, target_channel: Option<&str>) -> bool {
        target_channel.is_none_or(|id| id == self.channel_id)
    }

    /// One payload per embed, in message order.
    pub fn into_payloads(self) -> Vec<NotificationPayload> {
        self.embeds
            .into_iter()
            .map(|e| NotificationPayload::new(e.fields))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "channel_id": "123456789",
        "author": "tracker",
        "embeds": [
            {"title": "Swap", "fields": [
                {"name": "Type", "value": "SWAP"},
                {"name": "Description", "value": "swapped 1 SOL for 5 ABCpump"}
            ]},
            {"fields": []}
        ]
    }"#;

    #[test]
    fn test_parse_message_with_embeds() {
        let msg = ChannelMessage::parse(RAW).unwrap();
        assert_eq!(msg.author.as_deref(), Some("tracker"));
        assert!(msg.is_from(Some("123456789")));
        assert!(msg.is_from(None));
        assert!(!msg.is_from(Some("42")));

        let payloads = msg.into_payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].field("Type"), Some("SWAP"));
        assert!(payloads[1].fields.is_empty());
    }

    #[test]
    fn test_missing_embeds_is_empty() {
        let msg = ChannelMessage::parse(r#"{"channel_id": "1"}"#).unwrap();
        assert!(msg.into_payloads().is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            ChannelMessage::parse("{not json"),
            Err(FeedError::Malformed(_))
        ));
    }
}
