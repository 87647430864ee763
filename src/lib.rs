//! A MySQL session layer over a pluggable low-level driver.
//!
//! # Features
//!
//! - **Session engine**: one [`Connection`] per network link, with bounded
//!   deadlock retry on the synchronous query path and a strict release
//!   protocol so pooled connections are always reborrowed clean
//! - **Prepared statements**: three-stage bind validation before any
//!   network round-trip
//! - **Materialized results**: buffered, rewindable row cursors that free
//!   the connection while the caller iterates
//! - **Async multiplexing**: a [`Dispatcher`] polling readiness across many
//!   in-flight asynchronous queries
//!
//! The wire protocol is not implemented here: the session layer drives a
//! [`RawLink`] capability supplied by a lower-level driver and confines
//! itself to lifecycle, retry and release semantics on top of it.
//!
//! # Example
//!
//! ```
//! use mysql_session::testing::{self, MemoryLink, Reply};
//! use mysql_session::{Connection, Value};
//!
//! fn main() -> mysql_session::Result<()> {
//!     let link = MemoryLink::new();
//!     link.handle().push_reply(Reply::Rows(testing::rows(
//!         &["id", "name"],
//!         vec![vec![Value::Int(1), Value::Text("ada".into())]],
//!     )));
//!
//!     let mut conn = Connection::with_link(link);
//!
//!     let mut result = conn.query("SELECT id, name FROM users")?;
//!     assert_eq!(result.count(), 1);
//!     while result.next() {
//!         let row = result.current().expect("cursor is on a row");
//!         assert_eq!(row.get("id").and_then(Value::as_int), Some(1));
//!     }
//!     Ok(())
//! }
//! ```

pub mod conn;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod opts;
pub mod pool;
pub mod result;
pub mod row;
pub mod sql;
pub mod statement;
pub mod testing;

pub use conn::{Connection, DEADLOCK_ATTEMPTS};
pub use dispatch::Dispatcher;
pub use error::{Error, Result, ServerError};
pub use link::{LinkId, LinkResult, RawLink, RawStatement};
pub use opts::Opts;
pub use pool::{Pool, Poolable, PooledConn, Role};
pub use result::ResultSet;
pub use row::{Row, Value};
pub use statement::Statement;
