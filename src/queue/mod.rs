// Queue of publishers competing for the broadcast slot

mod snapshot;
mod state;
mod store;

pub use snapshot::*;
pub use state::*;
pub use store::*;
