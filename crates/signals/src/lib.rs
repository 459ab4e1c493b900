pub mod interpreter;
pub mod remote;
pub mod services;

pub use interpreter::{interpret, parse_description};
