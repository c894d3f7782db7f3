// Job dispatcher feature

mod config;
mod dispatcher;
mod error;
mod job;
mod source;

pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use job::*;
pub use source::*;
