use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Swap,
    Other,
    Unknown,
}

/// Trade direction of the observed actor, inferred from the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSignal {
    pub kind: SignalKind,
    pub source: Option<String>,
    pub token_address: Option<String>,
    pub direction: Direction,
    pub description_tokens: Vec<String>,
    pub explorer_url: Option<String>,
}

impl Default for SwapSignal {
    fn default() -> Self {
        Self {
            kind: SignalKind::Unknown,
            source: None,
            token_address: None,
            direction: Direction::Unknown,
            description_tokens: Vec::new(),
            explorer_url: None,
        }
    }
}
