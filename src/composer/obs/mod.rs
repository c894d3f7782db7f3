// OBS websocket client

mod auth;
mod client;
mod composer;
mod config;
mod heartbeat;
mod message;
mod status;

pub use auth::*;
pub use client::*;
pub use composer::*;
pub use config::*;
pub use heartbeat::*;
pub use message::*;
pub use status::*;
