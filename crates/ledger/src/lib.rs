pub mod summary;
mod token_locks;
pub mod trade_ledger;

pub use token_locks::TokenGuard;
pub use trade_ledger::{BuyFill, SellFill, TradeLedger};
