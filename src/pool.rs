//! Connection pool keyed by server role.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use std_semaphore::Semaphore;

use crate::conn::Connection;
use crate::error::Result;
use crate::link::RawLink;
use crate::opts::Opts;

/// Server role a connection can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The writable primary server.
    Primary,
    /// A read-only replica.
    Replica,
}

/// Contract the pool relies on when reclaiming a connection.
pub trait Poolable {
    /// Restore session state so the next borrower starts clean. Returns
    /// `false` when the connection must be evicted instead of pooled.
    fn release(&mut self) -> bool;

    /// Liveness probe used to decide eviction at acquire time.
    fn is_alive(&mut self) -> bool;
}

struct Shard<L: RawLink> {
    opts: Opts,
    conns: ArrayQueue<Connection<L>>,
    semaphore: Option<Semaphore>,
}

impl<L: RawLink> Shard<L> {
    fn new(opts: Opts) -> Self {
        let semaphore = opts
            .pool_max_concurrency
            .map(|n| Semaphore::new(n as isize));
        Self {
            conns: ArrayQueue::new(opts.pool_max_idle_conn.max(1)),
            opts,
            semaphore,
        }
    }
}

/// A registry of connections keyed by [`Role`].
///
/// Hands out exclusively-owned [`PooledConn`] guards; ownership is what
/// guarantees a connection is never held by two callers at once. Dropping
/// the guard runs the release protocol and returns the connection to its
/// shard.
pub struct Pool<L: RawLink> {
    primary: Shard<L>,
    replica: Option<Shard<L>>,
}

impl<L: RawLink> Pool<L> {
    /// Create a pool with a primary shard only. [`Role::Replica`] requests
    /// fall back to the primary.
    pub fn new(primary: Opts) -> Self {
        Self {
            primary: Shard::new(primary),
            replica: None,
        }
    }

    /// Create a pool with distinct primary and replica shards.
    pub fn with_replica(primary: Opts, replica: Opts) -> Self {
        Self {
            primary: Shard::new(primary),
            replica: Some(Shard::new(replica)),
        }
    }

    fn shard(&self, role: Role) -> &Shard<L> {
        match role {
            Role::Primary => &self.primary,
            Role::Replica => self.replica.as_ref().unwrap_or(&self.primary),
        }
    }

    /// Check out a connection for `role`.
    ///
    /// Idle connections failing the liveness probe are evicted until one
    /// passes or the shard is empty, in which case a fresh connection is
    /// opened. Blocks while the shard's concurrency cap (if configured) is
    /// exhausted.
    pub fn acquire(self: &Arc<Self>, role: Role) -> Result<PooledConn<L>> {
        let shard = self.shard(role);
        if let Some(sem) = &shard.semaphore {
            sem.acquire();
        }
        let conn = loop {
            match shard.conns.pop() {
                Some(mut c) => {
                    if c.is_alive() {
                        break c;
                    }
                    tracing::debug!(id = %c.id(), "evicting dead pooled connection");
                    // Connection dead, try next one
                }
                None => match Connection::connect(&shard.opts) {
                    Ok(c) => break c,
                    Err(e) => {
                        if let Some(sem) = &shard.semaphore {
                            sem.release();
                        }
                        return Err(e);
                    }
                },
            }
        };
        Ok(PooledConn {
            conn: ManuallyDrop::new(conn),
            pool: Arc::clone(self),
            role,
            evicted: false,
        })
    }

    fn check_in(&self, role: Role, mut conn: Connection<L>) {
        if !conn.release() {
            return;
        }
        let _ = self.shard(role).conns.push(conn);
    }

    /// Number of idle connections currently pooled for `role`.
    pub fn idle(&self, role: Role) -> usize {
        self.shard(role).conns.len()
    }
}

/// An exclusively-held connection checked out of a [`Pool`].
pub struct PooledConn<L: RawLink> {
    pool: Arc<Pool<L>>,
    role: Role,
    conn: ManuallyDrop<Connection<L>>,
    evicted: bool,
}

impl<L: RawLink> PooledConn<L> {
    /// Close this connection instead of returning it to the pool.
    pub fn evict(mut self) {
        // SAFETY: conn is never accessed after this; drop skips check-in
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        self.evicted = true;
        conn.close();
    }
}

impl<L: RawLink> Deref for PooledConn<L> {
    type Target = Connection<L>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<L: RawLink> DerefMut for PooledConn<L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<L: RawLink> Drop for PooledConn<L> {
    fn drop(&mut self) {
        if !self.evicted {
            // SAFETY: conn is never accessed after this
            let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
            self.pool.check_in(self.role, conn);
        }
        if let Some(sem) = &self.pool.shard(self.role).semaphore {
            sem.release();
        }
    }
}
