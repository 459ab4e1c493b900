pub mod dispatcher;
pub mod retry_executor;
pub mod sell_scheduler;


pub use dispatcher::{Dispatch, Dispatcher, DispatcherService, RejectReason};
pub use retry_executor::{SellOutcome, TradeExecutor, next_slippage};
pub use sell_scheduler::{SchedulerService, SellScheduler};
