//! Tests for the pool and the connection release protocol.

use std::sync::Arc;

use mysql_session::testing::{self, MemoryHandle, MemoryLink, Reply};
use mysql_session::{Error, Opts, Pool, Role, Value};

fn pool_opts() -> Opts {
    Opts {
        host: "localhost".into(),
        user: "app".into(),
        database: Some("mydb".into()),
        ..Opts::default()
    }
}

fn new_pool(opts: Opts) -> Arc<Pool<MemoryLink>> {
    Arc::new(Pool::new(opts))
}

#[test]
fn test_release_drains_and_restores_autocommit() {
    let pool = new_pool(pool_opts());
    let mut conn = pool.acquire(Role::Primary).unwrap();
    let handle: MemoryHandle = conn.raw().handle();

    handle.push_reply(Reply::ResultSets(vec![
        testing::rows(&["a"], vec![vec![Value::Int(1)]]),
        testing::rows(&["b"], vec![vec![Value::Int(2)]]),
        testing::rows(&["c"], vec![vec![Value::Int(3)]]),
    ]));

    // Read only the first result set and leave the rest pending, inside an
    // open transaction.
    conn.begin_transaction().unwrap();
    let first = conn.multi_query("SELECT 1; SELECT 2; SELECT 3").unwrap();
    assert_eq!(first.count(), 1);
    assert!(conn.more_results());

    let id = conn.id();
    drop(conn);

    // Released clean: nothing pending, autocommit back on, back in the pool.
    assert_eq!(handle.pending_results(), 0);
    assert!(handle.autocommit());
    assert_eq!(pool.idle(Role::Primary), 1);

    // The reborrowed connection queries without "commands out of sync".
    let mut conn = pool.acquire(Role::Primary).unwrap();
    assert_eq!(conn.id(), id);
    handle.push_reply(Reply::Rows(testing::rows(&["n"], vec![vec![Value::Int(9)]])));
    let result = conn.query("SELECT n FROM t").unwrap();
    assert_eq!(result.count(), 1);
}

#[test]
fn test_pool_reuses_idle_connection() {
    let pool = new_pool(pool_opts());
    let conn = pool.acquire(Role::Primary).unwrap();
    let id = conn.id();
    drop(conn);

    let conn = pool.acquire(Role::Primary).unwrap();
    assert_eq!(conn.id(), id);
}

#[test]
fn test_pool_evicts_dead_connection() {
    let pool = new_pool(pool_opts());
    let conn = pool.acquire(Role::Primary).unwrap();
    let handle = conn.raw().handle();
    let id = conn.id();
    drop(conn);
    assert_eq!(pool.idle(Role::Primary), 1);

    // The pooled connection dies; the next acquire must not hand it out.
    handle.set_dead(true);
    let conn = pool.acquire(Role::Primary).unwrap();
    assert_ne!(conn.id(), id);
    assert_eq!(pool.idle(Role::Primary), 0);
}

#[test]
fn test_pooling_disabled_closes_on_release() {
    let opts = Opts {
        pooling: false,
        ..pool_opts()
    };
    let pool = new_pool(opts);
    let conn = pool.acquire(Role::Primary).unwrap();
    let handle = conn.raw().handle();
    let id = conn.id();
    drop(conn);

    assert!(handle.is_closed());
    assert_eq!(pool.idle(Role::Primary), 0);

    let conn = pool.acquire(Role::Primary).unwrap();
    assert_ne!(conn.id(), id);
}

#[test]
fn test_explicit_evict_closes_connection() {
    let pool = new_pool(pool_opts());
    let conn = pool.acquire(Role::Primary).unwrap();
    let handle = conn.raw().handle();

    conn.evict();
    assert!(handle.is_closed());
    assert_eq!(pool.idle(Role::Primary), 0);
}

#[test]
fn test_replica_role_falls_back_to_primary() {
    let pool = new_pool(pool_opts());
    let conn = pool.acquire(Role::Replica).unwrap();
    let id = conn.id();
    drop(conn);

    // Without a replica shard both roles share the primary pool.
    let conn = pool.acquire(Role::Primary).unwrap();
    assert_eq!(conn.id(), id);
}

#[test]
fn test_replica_shard_is_distinct() {
    let pool: Arc<Pool<MemoryLink>> =
        Arc::new(Pool::with_replica(pool_opts(), pool_opts()));
    let primary = pool.acquire(Role::Primary).unwrap();
    let replica = pool.acquire(Role::Replica).unwrap();
    assert_ne!(primary.id(), replica.id());
    drop(primary);
    drop(replica);
    assert_eq!(pool.idle(Role::Primary), 1);
    assert_eq!(pool.idle(Role::Replica), 1);
}

#[test]
fn test_statement_invalid_after_release() {
    let pool = new_pool(pool_opts());
    let mut conn = pool.acquire(Role::Primary).unwrap();
    let handle = conn.raw().handle();
    handle.push_statement(0, Reply::Affected(0));

    let mut stmt = conn.prepare("SELECT 1").unwrap();
    drop(conn);

    assert!(matches!(stmt.execute(), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_release_with_uncollected_async_evicts() {
    let dispatcher = mysql_session::Dispatcher::new();
    let pool = new_pool(pool_opts());
    let mut conn = pool.acquire(Role::Primary).unwrap();
    let handle = conn.raw().handle();

    conn.async_query("SELECT SLEEP(1)", &dispatcher).unwrap();
    drop(conn);

    // A connection with an uncollected asynchronous query must never be
    // pooled; it is closed instead.
    assert_eq!(pool.idle(Role::Primary), 0);
    assert!(handle.is_closed());
}
