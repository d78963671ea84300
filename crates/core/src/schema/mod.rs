#![forbid(unsafe_code)]

mod catalog;
mod shape;

pub use catalog::*;
pub use shape::*;
