//! The raw link capability consumed by the session layer.
//!
//! The session engine does not speak the wire protocol itself. It drives one
//! [`RawLink`] per network connection, provided by a lower-level driver, and
//! confines itself to lifecycle, retry and release semantics on top of it.

use crate::error::ServerError;
use crate::opts::Opts;
use crate::row::{Row, Value};

/// Identifies one raw link within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Outcome of a raw operation: success, or the server's error report with
/// code, SQLSTATE and message intact.
pub type LinkResult<T> = Result<T, ServerError>;

/// Blocking query, prepared-statement and result-cursor primitives against
/// one network connection.
///
/// Every fallible operation returns the server's [`ServerError`] verbatim;
/// classifying it (retry, surface, absorb) is the session layer's job.
pub trait RawLink {
    /// Raw prepared-statement handle produced by [`RawLink::prepare`].
    type Statement: RawStatement;

    /// Open a link. Options are read here, once, and never re-read.
    fn connect(opts: &Opts) -> LinkResult<Self>
    where
        Self: Sized;

    /// Process-unique id of this link.
    fn id(&self) -> LinkId;

    /// Execute `sql`, leaving the produced result set pending on the link.
    fn raw_query(&mut self, sql: &str) -> LinkResult<()>;

    /// Execute one or multiple `;`-separated statements. The first result
    /// set becomes pending; the rest are reachable via
    /// [`RawLink::next_result`].
    fn multi_raw_query(&mut self, sql: &str) -> LinkResult<()>;

    /// Buffer the pending result set and clear it from the link.
    ///
    /// Returns `None` when the last statement produced no result set at all
    /// (e.g. an UPDATE), as opposed to a result set with zero rows.
    fn store_result(&mut self) -> LinkResult<Option<Vec<Row>>>;

    /// True while further result sets are pending after a multi-statement
    /// query.
    fn more_results(&self) -> bool;

    /// Advance to the next pending result set. Returns `false` when there
    /// is none left.
    fn next_result(&mut self) -> LinkResult<bool>;

    /// Discard the current pending result set without reading it.
    fn close_result(&mut self) -> LinkResult<()>;

    /// Toggle autocommit. Enabling it commits any open transaction.
    fn set_autocommit(&mut self, on: bool) -> LinkResult<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> LinkResult<()>;

    /// Lightweight liveness probe.
    fn ping(&mut self) -> bool;

    /// Compile `sql` into a raw prepared-statement handle.
    fn prepare(&mut self, sql: &str) -> LinkResult<Self::Statement>;

    /// Send `sql` without waiting for its result.
    fn dispatch_query(&mut self, sql: &str) -> LinkResult<()>;

    /// True once a dispatched query's result is readable.
    fn async_ready(&self) -> bool;

    /// Collect the result of a dispatched query, leaving it pending on the
    /// link the same way [`RawLink::raw_query`] does.
    fn reap_async(&mut self) -> LinkResult<()>;

    /// Rows affected by the last statement.
    fn affected_rows(&self) -> u64;

    /// Auto-generated id of the last inserted row, or 0.
    fn last_insert_id(&self) -> u64;

    /// Terminate the link. Further use is a driver error.
    fn close(&mut self);
}

/// A compiled statement handle bound to one raw link.
pub trait RawStatement {
    /// Number of `?` placeholders the compiled statement requires.
    fn param_count(&self) -> usize;

    /// Forward an already-validated binding to the driver. `types` is the
    /// per-parameter type signature (`i`/`d`/`s`/`b`), `values` has one
    /// entry per character.
    fn bind(&mut self, types: &str, values: &[Value]) -> LinkResult<()>;

    /// Execute with the current binding.
    fn execute(&mut self) -> LinkResult<()>;

    /// Buffer the statement's result set; `None` if it produces none.
    fn store_result(&mut self) -> LinkResult<Option<Vec<Row>>>;

    /// Rows affected by the last execution.
    fn affected_rows(&self) -> u64;
}
