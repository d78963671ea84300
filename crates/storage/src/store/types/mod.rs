#![forbid(unsafe_code)]

mod reports;
mod undo;

pub use reports::*;
pub use undo::*;
