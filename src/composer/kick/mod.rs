// Publisher kick feature

mod config;
mod kicker;
mod token;

pub use config::*;
pub use kicker::*;
pub use token::*;
