//! btdb is a tiny embedded SQL database: a single-file B+tree store with a
//! catalog of table schemas layered on top, driven by a minimal
//! CREATE/INSERT/SELECT front end.

#[macro_use]
pub mod errors;
pub mod catalog;
pub mod database;
pub mod exec;
pub mod repl;
pub mod sql;
pub mod store;
