#![doc = include_str!("../README.md")]

//! # SQL Statement Execution
//!
//! The statement primitive used by `strata-orm`: issue SQL text plus
//! positional arguments and get back either a row cursor or an
//! affected-row/last-insert-id result.
//!
//! Backends implement [`Connection`]. [`SqlDefault`] is an embedded `SQLite`
//! backend suitable for development and tests.

#![forbid(unsafe_code)]

mod connection;
pub mod default_impl;
mod traits;
mod types;

pub use crate::connection::Connection;
pub use crate::default_impl::{ConnectOptions, SqlDefault};
pub use crate::traits::{Backend, FromEnv, FutureResult};
pub use crate::types::{Column, DataType, ExecResult, Field, Row, Rows, into_json};
