// Webhook and admin HTTP server

mod admin;
mod config;
mod context;
mod webhooks;
mod server;
mod stream_key;

pub use admin::*;
pub use config::*;
pub use context::*;
pub use webhooks::*;
pub use server::*;
pub use stream_key::*;
