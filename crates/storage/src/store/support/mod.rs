#![forbid(unsafe_code)]

mod rows;
mod savepoint;
mod schema;
mod sql;
mod time;

pub(super) use rows::*;
pub(super) use savepoint::*;
pub(super) use schema::install_engine_schema;
pub(super) use sql::*;
pub(super) use time::*;
