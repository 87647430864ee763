//! Multiplexed polling for in-flight asynchronous queries.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::conn::Connection;
use crate::link::{LinkId, RawLink};

/// Interval between readiness scans while a poll is blocking.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tracks connections with an outstanding asynchronous query and
/// multiplexes their readiness.
///
/// Constructed explicitly and passed by reference to whatever context
/// manages the connections; there is no process-wide instance. The active
/// set is shared state: registration and removal are mutually exclusive,
/// and a connection appears in it at most once.
#[derive(Debug, Default)]
pub struct Dispatcher {
    active: Mutex<HashSet<LinkId>>,
}

impl Dispatcher {
    /// Create a dispatcher with an empty active set.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<LinkId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_link(&self, id: LinkId) {
        self.lock().insert(id);
    }

    pub(crate) fn remove_link(&self, id: LinkId) {
        self.lock().remove(&id);
    }

    /// True while `id` has an uncollected asynchronous query.
    pub fn is_registered(&self, id: LinkId) -> bool {
        self.lock().contains(&id)
    }

    /// Number of connections with an uncollected asynchronous query.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no asynchronous query is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Block until at least one registered connection among `conns` is
    /// readable, or `timeout` elapses (empty return). Each ready connection
    /// is reported exactly once per poll.
    ///
    /// A server-side error also makes a connection ready; the error itself
    /// surfaces when its result is collected. If none of `conns` are
    /// registered the poll returns immediately.
    pub fn poll<L: RawLink>(
        &self,
        conns: &[&Connection<L>],
        timeout: Option<Duration>,
    ) -> Vec<LinkId> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let ready: Vec<LinkId> = {
                let active = self.lock();
                conns
                    .iter()
                    .filter(|c| active.contains(&c.id()) && c.async_ready())
                    .map(|c| c.id())
                    .collect()
            };
            if !ready.is_empty() {
                return ready;
            }
            let any_registered = {
                let active = self.lock();
                conns.iter().any(|c| active.contains(&c.id()))
            };
            if !any_registered {
                return Vec::new();
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Vec::new();
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_set_dedups() {
        let dispatcher = Dispatcher::new();
        dispatcher.add_link(LinkId(7));
        dispatcher.add_link(LinkId(7));
        assert_eq!(dispatcher.len(), 1);
        dispatcher.remove_link(LinkId(7));
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.is_registered(LinkId(7)));
    }
}
