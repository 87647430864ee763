//! In-memory raw link for tests and examples.
//!
//! [`MemoryLink`] implements [`RawLink`] against scripted in-process state
//! instead of a network socket. A test keeps the link's [`MemoryHandle`] to
//! queue replies ahead of time and to inspect what the session layer did:
//! which statements were issued, how often, whether autocommit was restored
//! and whether pending result sets were drained.
//!
//! The fake reproduces the driver behaviors the session layer's contracts
//! are written against: result sets stay pending on the link until stored or
//! closed, issuing a new command over a pending result set fails with
//! "commands out of sync" (2014), and a dead server answers every command
//! with "server has gone away" (2006).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{CR_COMMANDS_OUT_OF_SYNC, ER_LOCK_DEADLOCK, ER_LOCK_WAIT_TIMEOUT, ServerError};
use crate::link::{LinkId, LinkResult, RawLink, RawStatement};
use crate::opts::Opts;
use crate::row::{Row, Value};

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Build rows from column names and one value vector per row.
pub fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> Vec<Row> {
    let columns: Arc<[String]> = columns.iter().map(|c| (*c).to_string()).collect();
    data.into_iter()
        .map(|values| Row::new(Arc::clone(&columns), values))
        .collect()
}

/// A deadlock error (1213), as the server reports it.
pub fn deadlock() -> ServerError {
    ServerError::new(
        ER_LOCK_DEADLOCK,
        "40001",
        "Deadlock found when trying to get lock; try restarting transaction",
    )
}

/// A lock wait timeout error (1205), as the server reports it.
pub fn lock_wait_timeout() -> ServerError {
    ServerError::new(
        ER_LOCK_WAIT_TIMEOUT,
        "HY000",
        "Lock wait timeout exceeded; try restarting transaction",
    )
}

fn gone_away() -> ServerError {
    ServerError::new(2006, "HY000", "MySQL server has gone away")
}

fn out_of_sync() -> ServerError {
    ServerError::new(
        CR_COMMANDS_OUT_OF_SYNC,
        "HY000",
        "Commands out of sync; you can't run this command now",
    )
}

/// A scripted reply to one query on a [`MemoryLink`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// One result set with the given rows.
    Rows(Vec<Row>),
    /// Several result sets, as a multi-statement query produces them.
    ResultSets(Vec<Vec<Row>>),
    /// No result set; the given affected-row count.
    Affected(u64),
    /// A server error.
    Fail(ServerError),
}

#[derive(Debug, Clone)]
struct StatementScript {
    param_count: usize,
    reply: Reply,
}

#[derive(Debug)]
struct LinkState {
    replies: VecDeque<Reply>,
    statements: VecDeque<LinkResult<StatementScript>>,
    /// Result sets produced but not yet stored or closed; front is current.
    pending: VecDeque<Option<Vec<Row>>>,
    async_slot: Option<(Reply, bool)>,
    async_ready_default: bool,
    autocommit: bool,
    dead: bool,
    closed: bool,
    queries: Vec<String>,
    rollbacks: u64,
    affected: u64,
    last_insert_id: u64,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            replies: VecDeque::new(),
            statements: VecDeque::new(),
            pending: VecDeque::new(),
            async_slot: None,
            async_ready_default: true,
            autocommit: true,
            dead: false,
            closed: false,
            queries: Vec::new(),
            rollbacks: 0,
            affected: 0,
            last_insert_id: 0,
        }
    }
}

impl LinkState {
    fn check_usable(&self) -> LinkResult<()> {
        if self.closed || self.dead {
            return Err(gone_away());
        }
        Ok(())
    }

    fn begin_command(&mut self, sql: &str) -> LinkResult<Reply> {
        self.check_usable()?;
        if !self.pending.is_empty() {
            return Err(out_of_sync());
        }
        self.queries.push(sql.to_string());
        Ok(self.replies.pop_front().unwrap_or_else(|| Reply::Affected(0)))
    }

    fn apply_reply(&mut self, reply: Reply) -> LinkResult<()> {
        match reply {
            Reply::Rows(rows) => {
                self.affected = rows.len() as u64;
                self.pending.push_back(Some(rows));
            }
            Reply::ResultSets(sets) => {
                self.affected = 0;
                for set in sets {
                    self.pending.push_back(Some(set));
                }
            }
            Reply::Affected(n) => {
                self.affected = n;
                self.pending.push_back(None);
            }
            Reply::Fail(e) => return Err(e),
        }
        Ok(())
    }
}

fn lock_state(state: &Mutex<LinkState>) -> MutexGuard<'_, LinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory [`RawLink`] implementation.
#[derive(Debug)]
pub struct MemoryLink {
    id: LinkId,
    state: Arc<Mutex<LinkState>>,
}

impl MemoryLink {
    /// Open a fresh link with an empty script.
    pub fn new() -> Self {
        Self {
            id: LinkId(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)),
            state: Arc::new(Mutex::new(LinkState::default())),
        }
    }

    /// The test-side remote control for this link.
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RawLink for MemoryLink {
    type Statement = MemoryStatement;

    fn connect(opts: &Opts) -> LinkResult<Self> {
        if opts.host.is_empty() {
            return Err(ServerError::new(
                2002,
                "HY000",
                "Can't connect to MySQL server on ''",
            ));
        }
        Ok(Self::new())
    }

    fn id(&self) -> LinkId {
        self.id
    }

    fn raw_query(&mut self, sql: &str) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        let reply = state.begin_command(sql)?;
        state.apply_reply(reply)
    }

    fn multi_raw_query(&mut self, sql: &str) -> LinkResult<()> {
        self.raw_query(sql)
    }

    fn store_result(&mut self) -> LinkResult<Option<Vec<Row>>> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        Ok(state.pending.pop_front().flatten())
    }

    fn more_results(&self) -> bool {
        !lock_state(&self.state).pending.is_empty()
    }

    fn next_result(&mut self) -> LinkResult<bool> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        Ok(!state.pending.is_empty())
    }

    fn close_result(&mut self) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        state.pending.pop_front();
        Ok(())
    }

    fn set_autocommit(&mut self, on: bool) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        state.autocommit = on;
        Ok(())
    }

    fn rollback(&mut self) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        state.rollbacks += 1;
        Ok(())
    }

    fn ping(&mut self) -> bool {
        let state = lock_state(&self.state);
        !state.closed && !state.dead
    }

    fn prepare(&mut self, sql: &str) -> LinkResult<Self::Statement> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        state.queries.push(sql.to_string());
        let script = state.statements.pop_front().unwrap_or_else(|| {
            Ok(StatementScript {
                param_count: 0,
                reply: Reply::Affected(0),
            })
        })?;
        Ok(MemoryStatement {
            param_count: script.param_count,
            reply: script.reply,
            bound: None,
            stored: None,
            affected: 0,
        })
    }

    fn dispatch_query(&mut self, sql: &str) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        let reply = state.begin_command(sql)?;
        let ready = state.async_ready_default;
        state.async_slot = Some((reply, ready));
        Ok(())
    }

    fn async_ready(&self) -> bool {
        lock_state(&self.state)
            .async_slot
            .as_ref()
            .is_some_and(|(_, ready)| *ready)
    }

    fn reap_async(&mut self) -> LinkResult<()> {
        let mut state = lock_state(&self.state);
        state.check_usable()?;
        match state.async_slot.take() {
            Some((reply, _)) => state.apply_reply(reply),
            None => Err(out_of_sync()),
        }
    }

    fn affected_rows(&self) -> u64 {
        lock_state(&self.state).affected
    }

    fn last_insert_id(&self) -> u64 {
        lock_state(&self.state).last_insert_id
    }

    fn close(&mut self) {
        lock_state(&self.state).closed = true;
    }
}

/// An in-memory [`RawStatement`] implementation.
#[derive(Debug)]
pub struct MemoryStatement {
    param_count: usize,
    reply: Reply,
    bound: Option<(String, Vec<Value>)>,
    stored: Option<Option<Vec<Row>>>,
    affected: u64,
}

impl RawStatement for MemoryStatement {
    fn param_count(&self) -> usize {
        self.param_count
    }

    fn bind(&mut self, types: &str, values: &[Value]) -> LinkResult<()> {
        self.bound = Some((types.to_string(), values.to_vec()));
        Ok(())
    }

    fn execute(&mut self) -> LinkResult<()> {
        if self.param_count > 0 && self.bound.is_none() {
            return Err(ServerError::new(
                2031,
                "HY000",
                "No data supplied for parameters in prepared statement",
            ));
        }
        match self.reply.clone() {
            Reply::Fail(e) => Err(e),
            Reply::Rows(rows) => {
                self.affected = rows.len() as u64;
                self.stored = Some(Some(rows));
                Ok(())
            }
            Reply::ResultSets(mut sets) => {
                let first = if sets.is_empty() {
                    Vec::new()
                } else {
                    sets.remove(0)
                };
                self.affected = first.len() as u64;
                self.stored = Some(Some(first));
                Ok(())
            }
            Reply::Affected(n) => {
                self.affected = n;
                self.stored = Some(None);
                Ok(())
            }
        }
    }

    fn store_result(&mut self) -> LinkResult<Option<Vec<Row>>> {
        Ok(self.stored.take().flatten())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }
}

/// Test-side remote control and inspection for a [`MemoryLink`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<LinkState>>,
}

impl MemoryHandle {
    /// Queue the reply for the next query.
    pub fn push_reply(&self, reply: Reply) {
        lock_state(&self.state).replies.push_back(reply);
    }

    /// Queue `n` transient deadlock errors.
    pub fn push_deadlocks(&self, n: usize) {
        let mut state = lock_state(&self.state);
        for _ in 0..n {
            state.replies.push_back(Reply::Fail(deadlock()));
        }
    }

    /// Queue the script for the next prepared statement.
    pub fn push_statement(&self, param_count: usize, reply: Reply) {
        lock_state(&self.state)
            .statements
            .push_back(Ok(StatementScript { param_count, reply }));
    }

    /// Queue a compilation failure for the next prepare call.
    pub fn push_prepare_error(&self, error: ServerError) {
        lock_state(&self.state).statements.push_back(Err(error));
    }

    /// Mark the server side dead: pings fail, every command reports 2006.
    pub fn set_dead(&self, dead: bool) {
        lock_state(&self.state).dead = dead;
    }

    /// Control whether dispatched queries become readable immediately.
    /// Also applies to a query already in flight.
    pub fn set_async_ready(&self, ready: bool) {
        let mut state = lock_state(&self.state);
        state.async_ready_default = ready;
        if let Some((_, slot_ready)) = state.async_slot.as_mut() {
            *slot_ready = ready;
        }
    }

    /// Set the id reported by `last_insert_id`.
    pub fn set_last_insert_id(&self, id: u64) {
        lock_state(&self.state).last_insert_id = id;
    }

    /// Every statement issued over the link, in order.
    pub fn queries(&self) -> Vec<String> {
        lock_state(&self.state).queries.clone()
    }

    /// Number of statements issued over the link.
    pub fn query_count(&self) -> usize {
        lock_state(&self.state).queries.len()
    }

    /// Current autocommit mode.
    pub fn autocommit(&self) -> bool {
        lock_state(&self.state).autocommit
    }

    /// Number of result sets still pending on the link.
    pub fn pending_results(&self) -> usize {
        lock_state(&self.state).pending.len()
    }

    /// Number of rollbacks issued over the link.
    pub fn rollbacks(&self) -> u64 {
        lock_state(&self.state).rollbacks
    }

    /// True once the link was terminated.
    pub fn is_closed(&self) -> bool {
        lock_state(&self.state).closed
    }
}
