pub mod notification;
pub mod signal;
pub mod trade;

pub use notification::{NotificationField, NotificationPayload};
pub use signal::{Direction, SignalKind, SwapSignal};
pub use trade::{
    ActiveTrade, ExitState, SellReason, TradeEvent, TradeHistoryRecord, TradeStatus,
};
