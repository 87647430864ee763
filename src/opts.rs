//! Connection options.

use no_panic::no_panic;

/// Connection options for a MySQL session.
///
/// Options are read once when a connection is constructed and never re-read
/// afterward.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the MySQL server.
    ///
    /// Default: `3306`
    pub port: u16,

    /// Database name to use.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Whether released connections are returned to the pool. When `false`,
    /// a released connection is closed instead.
    ///
    /// Default: `true`
    pub pooling: bool,

    /// Maximum number of idle connections kept per pool shard.
    ///
    /// Default: `100`
    pub pool_max_idle_conn: usize,

    /// Maximum number of concurrent connections (None = unlimited).
    ///
    /// Default: `None`
    pub pool_max_concurrency: Option<usize>,
}

impl Default for Opts {
    #[no_panic]
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            database: None,
            user: String::new(),
            password: None,
            pooling: true,
            pool_max_idle_conn: 100,
            pool_max_concurrency: None,
        }
    }
}
