// Utils module

mod env;
mod key_validation;
mod string_compare_secure;
mod template;

pub use env::*;
pub use key_validation::*;
pub use string_compare_secure::*;
pub use template::*;
