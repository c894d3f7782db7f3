// Admission of publishers to the broadcast slot

mod controller;
mod decision;
mod reconciler;

pub use controller::*;
pub use decision::*;
pub use reconciler::*;
