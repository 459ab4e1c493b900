pub mod signal_gateway;

pub use signal_gateway::SignalGateway;
