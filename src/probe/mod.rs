// Output prober collaborator

mod prober;

pub use prober::*;
