pub mod action;
pub mod dates;
pub mod types;
pub mod validate;

pub use action::*;
pub use types::*;
