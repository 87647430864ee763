//! Materialized, rewindable result cursor.

use crate::row::Row;

/// A forward-iterable, countable cursor over the rows of one result set.
///
/// Construction buffers every row up front, so the producing connection can
/// serve further queries while the caller iterates at leisure, and the
/// cursor can be rewound and replayed.
///
/// A fresh cursor sits before the first row; each [`ResultSet::next`] call
/// advances it by one and reports whether it now rests on a row.
///
/// # Example
///
/// ```
/// use mysql_session::{ResultSet, Row, Value};
/// use std::sync::Arc;
///
/// let columns: Arc<[String]> = vec!["n".to_string()].into();
/// let rows = (1..=3).map(|n| Row::new(Arc::clone(&columns), vec![Value::Int(n)]));
/// let mut result = ResultSet::from_rows(rows.collect());
///
/// let mut seen = Vec::new();
/// while result.next() {
///     seen.push(result.current().and_then(|r| r.get("n")?.as_int()).unwrap());
/// }
/// assert_eq!(seen, [1, 2, 3]);
/// assert_eq!(result.count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ResultSet {
    rows: Vec<Row>,
    position: usize,
    valid: bool,
    started: bool,
}

impl ResultSet {
    /// Build a result set over already-materialized rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            position: 0,
            valid: false,
            started: false,
        }
    }

    /// An empty result set.
    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    /// Advance the cursor to the next row. Returns `true` while the cursor
    /// rests on a row; once it runs past the last row it stays invalid until
    /// [`ResultSet::rewind`].
    pub fn next(&mut self) -> bool {
        if !self.started {
            self.started = true;
            self.position = 0;
        } else if self.valid {
            self.position += 1;
        }
        self.valid = self.position < self.rows.len();
        self.valid
    }

    /// The row under the cursor, or `None` when the cursor is not on a row.
    pub fn current(&self) -> Option<&Row> {
        if self.valid {
            self.rows.get(self.position)
        } else {
            None
        }
    }

    /// True while the cursor rests on a row.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Zero-based position of the current row, once iteration has started.
    pub fn position(&self) -> Option<usize> {
        self.valid.then_some(self.position)
    }

    /// Rewind the cursor so iteration restarts from the first row.
    pub fn rewind(&mut self) {
        self.started = false;
        self.position = 0;
        self.valid = false;
    }

    /// Total number of rows, available before iteration.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// True if the result set holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, in order, independent of the cursor.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use std::sync::Arc;

    fn numbered(n: i64) -> ResultSet {
        let columns: Arc<[String]> = vec!["n".to_string()].into();
        ResultSet::from_rows(
            (0..n)
                .map(|i| Row::new(Arc::clone(&columns), vec![Value::Int(i)]))
                .collect(),
        )
    }

    #[test]
    fn test_advances_equal_count() {
        let mut rs = numbered(3);
        let mut advances = 0;
        while rs.next() {
            advances += 1;
        }
        assert_eq!(advances, rs.count());
        assert!(!rs.valid());
        assert!(rs.current().is_none());
    }

    #[test]
    fn test_empty_set_never_valid() {
        let mut rs = ResultSet::empty();
        assert!(!rs.next());
        assert!(rs.current().is_none());
        assert_eq!(rs.count(), 0);
    }

    #[test]
    fn test_next_past_end_is_sticky() {
        let mut rs = numbered(1);
        assert!(rs.next());
        assert!(!rs.next());
        assert!(!rs.next());
        assert!(rs.position().is_none());
    }
}
