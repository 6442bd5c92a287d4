//! Session and revision management.
//!
//! Sessions move `Unauthenticated -> Active -> Closed`; `Closed` is
//! terminal and a closed id is never reissued for the lifetime of the
//! manager. The catalog revision is a process-wide monotonic counter,
//! incremented by exactly one per mutation notification and compared
//! against a client-supplied revision to decide whether an update
//! request answers immediately or long-polls.
//!
//! # Concurrency
//!
//! The revision counter is single-writer (mutation notifications) and
//! many-reader. Waiters park on a `tokio::sync::watch` channel - a
//! registered-waiter list woken on mutation, never a poll loop - so a
//! suspended update request consumes no CPU and never blocks other
//! sessions' request handling. The session table lives behind a plain
//! `std::sync::Mutex` that is never held across an await point.
//!
//! # Example
//!
//! ```
//! use dmap_share::session::SessionManager;
//!
//! let sessions = SessionManager::new();
//! let id = sessions.create_session();
//! assert!(sessions.validate(id));
//! sessions.close(id);
//! assert!(!sessions.validate(id));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};

use crate::error::{DmapError, Result};

/// Default idle timeout before a session is expired by housekeeping.
/// The protocol material never fixes a number; this is configurable
/// via [`SessionManager::with_timeout`].
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Revision counter starting value.
const INITIAL_REVISION: u64 = 1;

/// Why a session left the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetireReason {
    LoggedOut,
    Expired,
}

struct SessionEntry {
    last_seen: Instant,
    /// Woken when the session closes, releasing any parked update
    /// request it registered.
    closed: Arc<Notify>,
}

#[derive(Default)]
struct SessionTable {
    active: HashMap<u32, SessionEntry>,
    retired: HashMap<u32, RetireReason>,
}

/// Issues and validates session ids; owns the catalog revision counter.
pub struct SessionManager {
    table: Mutex<SessionTable>,
    revision: watch::Sender<u64>,
    session_timeout: Duration,
}

impl SessionManager {
    /// Create a manager with [`DEFAULT_SESSION_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    /// Create a manager with a custom idle timeout.
    pub fn with_timeout(session_timeout: Duration) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            revision: watch::Sender::new(INITIAL_REVISION),
            session_timeout,
        }
    }

    /// The configured idle timeout.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Allocate a new Active session id, retrying on collision with
    /// any live or previously used id. Id 0 is never issued.
    pub fn create_session(&self) -> u32 {
        let mut table = self.table.lock().expect("session lock poisoned");
        loop {
            let id: u32 = rand::random();
            if id == 0 || table.active.contains_key(&id) || table.retired.contains_key(&id) {
                continue;
            }
            table.active.insert(
                id,
                SessionEntry {
                    last_seen: Instant::now(),
                    closed: Arc::new(Notify::new()),
                },
            );
            tracing::debug!(session_id = id, "session created");
            return id;
        }
    }

    /// True only while the session is Active.
    pub fn validate(&self, id: u32) -> bool {
        self.table
            .lock()
            .expect("session lock poisoned")
            .active
            .contains_key(&id)
    }

    /// Validate with the full error taxonomy: Active is fine, an
    /// expired session reports [`DmapError::SessionExpired`], anything
    /// else [`DmapError::SessionInvalid`].
    pub fn check(&self, id: u32) -> Result<()> {
        let table = self.table.lock().expect("session lock poisoned");
        if table.active.contains_key(&id) {
            return Ok(());
        }
        match table.retired.get(&id) {
            Some(RetireReason::Expired) => Err(DmapError::SessionExpired(id)),
            _ => Err(DmapError::SessionInvalid(id)),
        }
    }

    /// Refresh a session's idle clock. Call once per validated request.
    pub fn touch(&self, id: u32) -> Result<()> {
        let mut table = self.table.lock().expect("session lock poisoned");
        match table.active.get_mut(&id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                Ok(())
            }
            None => Err(DmapError::SessionInvalid(id)),
        }
    }

    /// Close a session (logout or transport close). Terminal; wakes
    /// any update request the session had parked. Returns whether the
    /// session was Active.
    pub fn close(&self, id: u32) -> bool {
        self.retire(id, RetireReason::LoggedOut)
    }

    fn retire(&self, id: u32, reason: RetireReason) -> bool {
        let entry = {
            let mut table = self.table.lock().expect("session lock poisoned");
            let entry = table.active.remove(&id);
            if entry.is_some() {
                table.retired.insert(id, reason);
            }
            entry
        };
        match entry {
            Some(entry) => {
                tracing::debug!(session_id = id, ?reason, "session closed");
                entry.closed.notify_waiters();
                true
            }
            None => false,
        }
    }

    /// Housekeeping pass: close sessions idle past the timeout.
    /// Returns how many were expired.
    pub fn expire_idle(&self) -> usize {
        let stale: Vec<u32> = {
            let table = self.table.lock().expect("session lock poisoned");
            table
                .active
                .iter()
                .filter(|(_, entry)| entry.last_seen.elapsed() > self.session_timeout)
                .map(|(&id, _)| id)
                .collect()
        };

        let count = stale.len();
        for id in stale {
            self.retire(id, RetireReason::Expired);
        }
        if count > 0 {
            tracing::debug!(count, "expired idle sessions");
        }
        count
    }

    /// Number of Active sessions.
    pub fn active_count(&self) -> usize {
        self.table
            .lock()
            .expect("session lock poisoned")
            .active
            .len()
    }

    /// Current catalog revision. Starts at 1.
    pub fn current_revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Record one catalog mutation: the revision advances by exactly 1
    /// and every parked update request is woken.
    pub fn notify_mutation(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Wait until the revision exceeds `client_rev` or the deadline
    /// elapses, then return the current revision.
    ///
    /// Returns immediately when the client is already behind. Otherwise
    /// the caller parks on the watch channel; a mutation or the
    /// deadline wakes it, whichever comes first.
    pub async fn await_revision(&self, client_rev: u64, deadline: Duration) -> u64 {
        let mut rx = self.revision.subscribe();
        let current = *rx.borrow_and_update();
        if client_rev < current {
            return current;
        }

        let _ = tokio::time::timeout(deadline, async {
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() > client_rev {
                    break;
                }
            }
        })
        .await;

        self.current_revision()
    }

    /// Session-bound long poll: like [`await_revision`], but fails fast
    /// on an unknown session and is released early when the session is
    /// closed mid-wait, so a logout never leaks a parked waiter.
    ///
    /// [`await_revision`]: SessionManager::await_revision
    pub async fn await_revision_for(
        &self,
        session_id: u32,
        client_rev: u64,
        deadline: Duration,
    ) -> Result<u64> {
        let closed = {
            let table = self.table.lock().expect("session lock poisoned");
            table
                .active
                .get(&session_id)
                .map(|entry| entry.closed.clone())
                .ok_or(DmapError::SessionInvalid(session_id))?
        };

        let notified = closed.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // The session may have closed between the lookup and the
        // waiter registration; recheck before parking.
        if !self.validate(session_id) {
            return Err(DmapError::SessionInvalid(session_id));
        }

        tokio::select! {
            revision = self.await_revision(client_rev, deadline) => Ok(revision),
            _ = notified => Err(DmapError::SessionInvalid(session_id)),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_close_invalidates() {
        let sessions = SessionManager::new();
        let id = sessions.create_session();

        assert!(sessions.validate(id));
        assert!(sessions.check(id).is_ok());
        assert!(sessions.close(id));
        assert!(!sessions.validate(id));
        assert!(!sessions.close(id));
        assert!(matches!(
            sessions.check(id),
            Err(DmapError::SessionInvalid(_))
        ));
    }

    #[test]
    fn test_no_collisions_across_ten_thousand_sessions() {
        let sessions = SessionManager::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let id = sessions.create_session();
            assert_ne!(id, 0);
            assert!(seen.insert(id), "duplicate session id {}", id);
        }
        assert_eq!(sessions.active_count(), 10_000);
    }

    #[test]
    fn test_touch_unknown_session() {
        let sessions = SessionManager::new();
        assert!(matches!(
            sessions.touch(12345),
            Err(DmapError::SessionInvalid(12345))
        ));
    }

    #[test]
    fn test_expire_idle_reports_expired() {
        let sessions = SessionManager::with_timeout(Duration::from_millis(0));
        let id = sessions.create_session();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(sessions.expire_idle(), 1);
        assert!(!sessions.validate(id));
        assert!(matches!(
            sessions.check(id),
            Err(DmapError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_touch_defers_expiry() {
        let sessions = SessionManager::with_timeout(Duration::from_secs(60));
        let id = sessions.create_session();
        sessions.touch(id).unwrap();
        assert_eq!(sessions.expire_idle(), 0);
        assert!(sessions.validate(id));
    }

    #[test]
    fn test_revision_starts_at_one_and_counts_mutations() {
        let sessions = SessionManager::new();
        assert_eq!(sessions.current_revision(), 1);

        for expected in 2..=10 {
            sessions.notify_mutation();
            assert_eq!(sessions.current_revision(), expected);
        }
    }

    #[tokio::test]
    async fn test_await_revision_immediate_when_behind() {
        let sessions = SessionManager::new();
        sessions.notify_mutation(); // revision now 2

        let start = Instant::now();
        let revision = sessions.await_revision(1, Duration::from_secs(5)).await;
        assert_eq!(revision, 2);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_await_revision_times_out_unchanged() {
        let sessions = SessionManager::new();

        let start = Instant::now();
        let revision = sessions.await_revision(1, Duration::from_millis(50)).await;
        assert_eq!(revision, 1);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_await_revision_woken_by_mutation() {
        let sessions = Arc::new(SessionManager::new());

        let waiter = {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.await_revision(1, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        sessions.notify_mutation();

        let revision = waiter.await.unwrap();
        assert_eq!(revision, 2);
    }

    #[tokio::test]
    async fn test_await_revision_for_unknown_session() {
        let sessions = SessionManager::new();
        assert!(matches!(
            sessions
                .await_revision_for(777, 1, Duration::from_secs(1))
                .await,
            Err(DmapError::SessionInvalid(777))
        ));
    }

    #[tokio::test]
    async fn test_close_releases_parked_waiter() {
        let sessions = Arc::new(SessionManager::new());
        let id = sessions.create_session();

        let waiter = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .await_revision_for(id, 1, Duration::from_secs(30))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let start = Instant::now();
        sessions.close(id);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(DmapError::SessionInvalid(_))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_await_revision_for_happy_path() {
        let sessions = Arc::new(SessionManager::new());
        let id = sessions.create_session();

        let waiter = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .await_revision_for(id, 1, Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        sessions.notify_mutation();

        assert_eq!(waiter.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_many_waiters_all_woken() {
        let sessions = Arc::new(SessionManager::new());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.await_revision(1, Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        sessions.notify_mutation();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 2);
        }
    }
}
