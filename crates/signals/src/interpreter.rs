//! Turns one relayed swap notification into a [`SwapSignal`].
//!
//! The description of a swap notification reads like
//! `"<wallet> swapped 0.5 SOL for 1200 ABCpump"`. The rules applied here are
//! heuristics on free text, so callers must tolerate wrong guesses.

use common::models::{Direction, NotificationPayload, SignalKind, SwapSignal};

const SWAP_TYPE: &str = "SWAP";
const QUOTE_SYMBOL: &str = "SOL";
const TOKEN_MARKERS: [&str; 2] = ["pump", "start"];

/// Never fails: missing fields stay `None` and the direction `Unknown`.
pub fn interpret(payload: &NotificationPayload) -> SwapSignal {
    let mut signal = SwapSignal::default();

    for field in &payload.fields {
        match field.name.as_str() {
            "Type" => {
                signal.kind = if field.value == SWAP_TYPE {
                    SignalKind::Swap
                } else {
                    SignalKind::Other
                };
            }
            "Source" => signal.source = Some(field.value.clone()),
            "Description" => {
                signal.description_tokens = tokenize(&field.value);
                signal.token_address = find_token_address(&signal.description_tokens);
                signal.direction = infer_direction(&signal.description_tokens);
            }
            "Explorer" => signal.explorer_url = Some(field.value.clone()),
            _ => {}
        }
    }

    signal
}

/// Token address and direction of a raw description.
pub fn parse_description(description: &str) -> (Option<String>, Direction) {
    let tokens = tokenize(description);
    (find_token_address(&tokens), infer_direction(&tokens))
}

fn tokenize(description: &str) -> Vec<String> {
    description.split_whitespace().map(str::to_owned).collect()
}

/// First token mentioning one of the launchpad markers, case-insensitive.
fn find_token_address(tokens: &[String]) -> Option<String> {
    tokens
        .iter()
        .find(|t| {
            let lower = t.to_lowercase();
            TOKEN_MARKERS.iter().any(|m| lower.contains(m))
        })
        .cloned()
}

/// SOL as the last word means the actor received SOL (sell); SOL anywhere
/// else means they spent it (buy).
fn infer_direction(tokens: &[String]) -> Direction {
    let is_quote = |t: &String| t.to_uppercase() == QUOTE_SYMBOL;

    match tokens.last() {
        None => Direction::Unknown,
        Some(last) if is_quote(last) => Direction::Sell,
        Some(_) if tokens.iter().any(is_quote) => Direction::Buy,
        Some(_) => Direction::Unknown,
    }
}
