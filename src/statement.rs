//! Prepared statements.

use std::sync::Arc;

use crate::conn::SessionToken;
use crate::error::{Error, Result};
use crate::link::RawStatement;
use crate::result::ResultSet;
use crate::row::Value;

/// A prepared statement bound to one connection.
///
/// Created by [`Connection::prepare`](crate::Connection::prepare); reusable
/// across many [`Statement::execute`] calls with different bound values.
/// There is no statement-level retry: re-executing after a transient failure
/// is the caller's decision.
#[derive(Debug)]
pub struct Statement<S: RawStatement> {
    raw: S,
    session: Arc<SessionToken>,
}

impl<S: RawStatement> Statement<S> {
    pub(crate) fn new(raw: S, session: Arc<SessionToken>) -> Self {
        Self { raw, session }
    }

    /// Number of parameters the compiled statement requires.
    pub fn param_count(&self) -> usize {
        self.raw.param_count()
    }

    /// Rows affected by the last execution.
    pub fn affected_rows(&self) -> u64 {
        self.raw.affected_rows()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.session.is_closed() {
            return Err(Error::InvalidHandle(
                "statement used after its connection was released or closed".into(),
            ));
        }
        Ok(())
    }

    /// Bind `values` to the statement's parameters.
    ///
    /// `types` is a type signature with one character per parameter:
    /// `i` integer, `d` double, `s` string, `b` blob. Validation happens
    /// locally, before any network round-trip, and reports the first
    /// applicable violation in this order:
    ///
    /// 1. an unrecognized type code — [`Error::InvalidBinding`];
    /// 2. signature length differing from the value count —
    ///    [`Error::ArityMismatch`];
    /// 3. value count differing from the statement's required parameter
    ///    count — [`Error::ArityMismatch`].
    pub fn bind_param(&mut self, types: &str, values: &[Value]) -> Result<()> {
        self.ensure_open()?;
        if let Some(c) = types.chars().find(|c| !matches!(c, 'i' | 'd' | 's' | 'b')) {
            return Err(Error::InvalidBinding(format!(
                "unknown data type {c:?} in {types:?}"
            )));
        }
        let type_count = types.chars().count();
        if type_count != values.len() {
            return Err(Error::ArityMismatch(format!(
                "number of specified types ({}) and number of specified values ({}) does not match",
                type_count,
                values.len()
            )));
        }
        if values.len() != self.raw.param_count() {
            return Err(Error::ArityMismatch(format!(
                "number of specified parameters ({}) does not match required parameters ({})",
                values.len(),
                self.raw.param_count()
            )));
        }
        self.raw.bind(types, values).map_err(Error::Query)
    }

    /// Execute the statement with the current binding.
    ///
    /// Returns `None` when the statement produces no result set at all
    /// (e.g. an UPDATE) — distinct from `Some` of an empty result set.
    /// Server errors surface as [`Error::Query`] with code, SQLSTATE and
    /// message.
    pub fn execute(&mut self) -> Result<Option<ResultSet>> {
        self.ensure_open()?;
        self.raw.execute().map_err(Error::Query)?;
        let rows = self.raw.store_result().map_err(Error::Query)?;
        Ok(rows.map(ResultSet::from_rows))
    }
}
