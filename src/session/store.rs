//! Live session state storage.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use super::{LiveSessionState, LiveSnapshot};
use crate::ids::SessionId;

/// Process-wide store of live session state.
///
/// Backed by a sharded concurrent map: operations on one session identity
/// are mutually exclusive, operations on different identities only contend
/// when they hash to the same shard. Nothing here is persisted; callers must
/// tolerate losing every entry on restart.
#[derive(Debug, Default)]
pub struct SessionStateStore {
    entries: DashMap<SessionId, LiveSessionState>,
}

impl SessionStateStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Current tuple for a session, defaulting when nothing was written yet.
    pub fn get(&self, id: &SessionId) -> LiveSnapshot {
        self.entries
            .get(id)
            .map(|entry| entry.snapshot())
            .unwrap_or_default()
    }

    /// Full copy of the stored record, if any.
    pub fn state(&self, id: &SessionId) -> Option<LiveSessionState> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Atomically read-modify-write the record for `id`.
    ///
    /// The record is created with defaults stamped at `now` if absent. The
    /// closure runs while the entry is exclusively locked, so it must not
    /// block or re-enter the store.
    pub fn apply<F, R>(&self, id: SessionId, now: DateTime<Utc>, f: F) -> R
    where
        F: FnOnce(&mut LiveSessionState) -> R,
    {
        let mut entry = self
            .entries
            .entry(id)
            .or_insert_with(|| LiveSessionState::new(now));
        f(entry.value_mut())
    }

    /// Refresh the write timestamp of an existing record.
    ///
    /// Returns `false` if the session has no record; none is created.
    pub fn touch(&self, id: &SessionId, now: DateTime<Utc>) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.touch(now);
                true
            }
            None => false,
        }
    }

    /// Drop the record for a session.
    pub fn remove(&self, id: &SessionId) -> Option<LiveSessionState> {
        self.entries.remove(id).map(|(_, state)| state)
    }

    /// Remove records with no write for at least `max_idle`.
    ///
    /// Returns the number of records removed.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: TimeDelta) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, state| {
            let keep = now - state.updated_at < max_idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of sessions with a live record.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ExerciseSessionId;

    #[test]
    fn test_get_defaults_when_absent() {
        let store = SessionStateStore::new();
        let snapshot = store.get(&SessionId::from_raw(42));

        assert!(snapshot.active_exercise_id.is_none());
        assert!(!snapshot.terminated);
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_creates_lazily() {
        let store = SessionStateStore::new();
        let id = SessionId::from_raw(1);
        let now = Utc::now();

        store.apply(id, now, |s| {
            s.active_exercise_id = Some(ExerciseSessionId::from_raw(7));
        });

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&id).active_exercise_id,
            Some(ExerciseSessionId::from_raw(7))
        );
        assert_eq!(store.state(&id).unwrap().updated_at, now);
    }

    #[test]
    fn test_apply_returns_closure_result() {
        let store = SessionStateStore::new();
        let was_terminated = store.apply(SessionId::from_raw(1), Utc::now(), |s| {
            let before = s.terminated;
            s.terminated = true;
            before
        });
        assert!(!was_terminated);
    }

    #[test]
    fn test_touch_does_not_create() {
        let store = SessionStateStore::new();
        assert!(!store.touch(&SessionId::from_raw(5), Utc::now()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove() {
        let store = SessionStateStore::new();
        let id = SessionId::from_raw(3);
        store.apply(id, Utc::now(), |s| s.terminated = true);

        let removed = store.remove(&id).unwrap();
        assert!(removed.terminated);
        assert!(!store.get(&id).terminated);
    }

    #[test]
    fn test_evict_idle() {
        let store = SessionStateStore::new();
        let start = Utc::now();
        store.apply(SessionId::from_raw(1), start, |s| s.terminated = true);
        store.apply(
            SessionId::from_raw(2),
            start + TimeDelta::hours(2),
            |s| s.terminated = true,
        );

        let removed = store.evict_idle(start + TimeDelta::hours(3), TimeDelta::hours(2));

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.state(&SessionId::from_raw(2)).is_some());
    }

    #[test]
    fn test_concurrent_apply_is_serialized() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SessionStateStore::new());
        let id = SessionId::from_raw(9);
        let now = Utc::now();
        let mut handles = vec![];

        // Each thread increments the exercise id; lost updates would show up
        // as a final value below 100.
        for _ in 0..100 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.apply(id, now, |s| {
                    let next = s.active_exercise_id.map(|e| e.as_u64()).unwrap_or(0) + 1;
                    s.active_exercise_id = Some(ExerciseSessionId::from_raw(next));
                });
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get(&id).active_exercise_id,
            Some(ExerciseSessionId::from_raw(100))
        );
    }
}
