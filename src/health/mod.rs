// Health monitor feature

mod config;
mod monitor;
mod state;

pub use config::*;
pub use monitor::*;
pub use state::*;
