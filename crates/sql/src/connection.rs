use std::fmt::Debug;

use crate::traits::FutureResult;
use crate::types::{DataType, ExecResult, Rows};

/// SQL providers implement the [`Connection`] trait to let the ORM execute
/// transcribed statements against a backend (`SQLite`, `MySQL`, etc).
pub trait Connection: Debug + Send + Sync + 'static {
    /// Dialect identity used to select the transcriber for this connection.
    fn dialect(&self) -> &'static str;

    /// Execute a query and return a cursor over the resulting rows.
    fn query(&self, query: String, params: Vec<DataType>) -> FutureResult<Rows>;

    /// Execute a statement that does not return rows (e.g., an `INSERT`,
    /// `UPDATE`, or `DELETE`).
    fn exec(&self, query: String, params: Vec<DataType>) -> FutureResult<ExecResult>;
}
