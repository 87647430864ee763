//! The connection/session engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::link::{LinkId, LinkResult, RawLink};
use crate::opts::Opts;
use crate::pool::Poolable;
use crate::result::ResultSet;
use crate::statement::Statement;

/// Number of attempts a query is executed until a transient lock error
/// (deadlock or lock wait timeout) is considered unresolvable.
pub const DEADLOCK_ATTEMPTS: u32 = 5;

/// Tracks whether the session a statement was created under is still live.
///
/// Releasing or closing a connection invalidates the token, so statements
/// that outlive their session fail with [`Error::InvalidHandle`] instead of
/// reaching a link now owned by another borrower.
#[derive(Debug, Default)]
pub(crate) struct SessionToken {
    closed: AtomicBool,
}

impl SessionToken {
    pub(crate) fn invalidate(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A single logical connection to a MySQL server.
///
/// One connection services one caller's request sequence at a time;
/// exclusive ownership is how the type is meant to be held. Synchronous
/// queries retry transparently on the two transient lock error codes, up to
/// [`DEADLOCK_ATTEMPTS`] total attempts, with no backoff. Asynchronous
/// queries are dispatched once and never retried.
#[derive(Debug)]
pub struct Connection<L: RawLink> {
    link: L,
    id: LinkId,
    session: Arc<SessionToken>,
    in_transaction: bool,
    async_pending: bool,
    pooling: bool,
}

impl<L: RawLink> Connection<L> {
    /// Connect to a MySQL server. Options are read here, once.
    ///
    /// A nonzero handshake error surfaces as [`Error::Connect`] and the
    /// connection is never constructed.
    pub fn connect(opts: &Opts) -> Result<Self> {
        let link = L::connect(opts).map_err(Error::Connect)?;
        let mut conn = Self::with_link(link);
        conn.pooling = opts.pooling;
        Ok(conn)
    }

    /// Wrap an already-open link.
    pub fn with_link(link: L) -> Self {
        let id = link.id();
        Self {
            link,
            id,
            session: Arc::new(SessionToken::default()),
            in_transaction: false,
            async_pending: false,
            pooling: true,
        }
    }

    /// Process-unique id of the underlying link.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Shared access to the underlying link.
    pub fn raw(&self) -> &L {
        &self.link
    }

    /// Run `op` under the deadlock-retry policy: the same statement is
    /// re-issued while the server reports a transient lock error, up to
    /// [`DEADLOCK_ATTEMPTS`] total attempts. Any other error, or the last
    /// attempt's error, surfaces as [`Error::Query`].
    fn with_retry(&mut self, mut op: impl FnMut(&mut L) -> LinkResult<()>) -> Result<()> {
        let mut attempt = 1u32;
        loop {
            match op(&mut self.link) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient_lock() && attempt < DEADLOCK_ATTEMPTS => {
                    tracing::debug!(code = e.code, attempt, "retrying after transient lock error");
                    attempt += 1;
                }
                Err(e) => return Err(Error::Query(e)),
            }
        }
    }

    fn store_result_set(&mut self) -> Result<ResultSet> {
        let rows = self.link.store_result().map_err(Error::Query)?;
        Ok(rows.map_or_else(ResultSet::empty, ResultSet::from_rows))
    }

    /// Execute `sql` synchronously and materialize its result set.
    ///
    /// A statement that produces no result set (e.g. an UPDATE) yields an
    /// empty [`ResultSet`]; the affected-row count is available from
    /// [`Connection::affected_rows`].
    pub fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.with_retry(|link| link.raw_query(sql))?;
        self.store_result_set()
    }

    /// Execute one or multiple `;`-separated statements under the same
    /// retry policy as [`Connection::query`].
    ///
    /// The first result set is materialized and returned; the caller is
    /// responsible for draining the remaining ones via
    /// [`Connection::more_results`] / [`Connection::next_result_set`] before
    /// the connection is released.
    pub fn multi_query(&mut self, sql: &str) -> Result<ResultSet> {
        self.with_retry(|link| link.multi_raw_query(sql))?;
        self.store_result_set()
    }

    /// True while further result sets of a multi-statement query are
    /// pending on the link.
    pub fn more_results(&self) -> bool {
        self.link.more_results()
    }

    /// Advance to and materialize the next pending result set, or `None`
    /// when there is none left.
    pub fn next_result_set(&mut self) -> Result<Option<ResultSet>> {
        if !self.link.next_result().map_err(Error::Query)? {
            return Ok(None);
        }
        self.store_result_set().map(Some)
    }

    /// Compile `sql` into a prepared statement bound to this connection.
    ///
    /// A compilation failure (syntax error, unknown table) surfaces as
    /// [`Error::Prepare`] with the server's code, SQLSTATE and message.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement<L::Statement>> {
        let raw = self.link.prepare(sql).map_err(Error::Prepare)?;
        Ok(Statement::new(raw, Arc::clone(&self.session)))
    }

    /// Dispatch `sql` without blocking for the result and register this
    /// connection with `dispatcher`.
    ///
    /// No deadlock retry is applied on the asynchronous path; a transient
    /// lock error surfaces like any other once the result is collected.
    /// A connection whose dispatched query is never polled stays registered
    /// and out of circulation until it is collected or closed.
    pub fn async_query(&mut self, sql: &str, dispatcher: &Dispatcher) -> Result<()> {
        if self.async_pending {
            return Err(Error::InvalidUsage(
                "an asynchronous query is already pending on this connection".into(),
            ));
        }
        self.link.dispatch_query(sql).map_err(Error::Query)?;
        dispatcher.add_link(self.id);
        self.async_pending = true;
        Ok(())
    }

    /// True once a dispatched query's result is readable. Used by
    /// [`Dispatcher::poll`].
    pub fn async_ready(&self) -> bool {
        self.async_pending && self.link.async_ready()
    }

    /// Collect the result of a dispatched query, removing this connection
    /// from the dispatcher's active set whether the server reported success
    /// or an error. Server errors surface as [`Error::Query`], exactly like
    /// the synchronous path.
    pub fn collect_async(&mut self, dispatcher: &Dispatcher) -> Result<ResultSet> {
        if !self.async_pending {
            return Err(Error::InvalidUsage(
                "no asynchronous query is pending on this connection".into(),
            ));
        }
        self.async_pending = false;
        dispatcher.remove_link(self.id);
        self.link.reap_async().map_err(Error::Query)?;
        self.store_result_set()
    }

    /// Start a transaction by disabling autocommit. Nested transactions are
    /// not supported.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::InvalidUsage(
                "nested transactions are not supported".into(),
            ));
        }
        self.link.set_autocommit(false).map_err(Error::Query)?;
        self.in_transaction = true;
        Ok(())
    }

    /// End the transaction by re-enabling autocommit, committing any
    /// pending changes.
    pub fn end_transaction(&mut self) -> Result<()> {
        self.link.set_autocommit(true).map_err(Error::Query)?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.link.rollback().map_err(Error::Query)
    }

    /// Check if currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Rows affected by the last statement.
    pub fn affected_rows(&self) -> u64 {
        self.link.affected_rows()
    }

    /// Auto-generated id of the last inserted row, or 0.
    pub fn last_insert_id(&self) -> u64 {
        self.link.last_insert_id()
    }

    /// Terminate the underlying link. Distinct from releasing: a released
    /// connection returns to its pool, a closed one is destroyed.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.session.is_closed() {
            self.session.invalidate();
            self.link.close();
        }
    }
}

impl<L: RawLink> Poolable for Connection<L> {
    /// Restore session state before the connection is handed back: drain
    /// pending result sets (drain errors are absorbed and logged), force
    /// autocommit back on, and invalidate the session token so outstanding
    /// statements observe [`Error::InvalidHandle`].
    ///
    /// Returns `false` when the connection must be evicted instead of
    /// pooled: an uncollected asynchronous query, a failed autocommit
    /// restore, or pooling disabled in the options.
    fn release(&mut self) -> bool {
        if self.async_pending {
            return false;
        }
        while self.link.more_results() {
            match self.link.next_result() {
                Ok(true) => {
                    if let Err(e) = self.link.close_result() {
                        tracing::warn!(code = e.code, "error closing pending result set on release");
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(code = e.code, "error draining pending result sets on release");
                    break;
                }
            }
        }
        if self.link.set_autocommit(true).is_err() {
            return false;
        }
        self.in_transaction = false;
        self.session.invalidate();
        self.session = Arc::new(SessionToken::default());
        self.pooling
    }

    fn is_alive(&mut self) -> bool {
        self.link.ping()
    }
}

impl<L: RawLink> Drop for Connection<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
