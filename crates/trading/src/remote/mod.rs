pub mod paper_trader;
pub mod swap_client;

pub use paper_trader::PaperTrader;
pub use swap_client::HttpSwapClient;
