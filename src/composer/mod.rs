// Media composer collaborator

mod composer;
mod error;
mod status;

pub mod kick;
pub mod obs;

pub use composer::*;
pub use error::*;
pub use status::*;
