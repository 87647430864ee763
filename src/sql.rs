//! Small SQL helpers.

/// Append a MySQL `LIMIT` clause to `sql`.
///
/// With an offset the `LIMIT offset, count` form is used.
///
/// # Example
///
/// ```
/// use mysql_session::sql;
///
/// assert_eq!(sql::limit("SELECT * FROM t", 10, None), "SELECT * FROM t LIMIT 10");
/// assert_eq!(sql::limit("SELECT * FROM t", 10, Some(20)), "SELECT * FROM t LIMIT 20, 10");
/// ```
pub fn limit(sql: &str, count: u64, offset: Option<u64>) -> String {
    match offset {
        Some(offset) => format!("{sql} LIMIT {offset}, {count}"),
        None => format!("{sql} LIMIT {count}"),
    }
}
