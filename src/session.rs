//! Per-user session storage
//!
//! Each user's [`SessionContext`] lives behind its own async mutex. A caller
//! acquires the session, mutates it through the guard and releases it; while
//! the guard is held no other task can see or change that user's context.

use crate::state_machine::{SessionContext, UserId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<SessionContext>>;

/// Index of live sessions, keyed by user
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Slot>>,
}

/// Exclusive access to one user's context
pub struct SessionGuard {
    user_id: UserId,
    guard: OwnedMutexGuard<SessionContext>,
}

impl Deref for SessionGuard {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        &self.guard
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut SessionContext {
        &mut self.guard
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self) -> MutexGuard<'_, HashMap<UserId, Slot>> {
        // The map holds no invariant a panicking holder could break
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to a user's session, creating an idle one
    /// if the user has none
    pub async fn acquire(&self, user_id: UserId) -> SessionGuard {
        let slot = {
            let mut sessions = self.index();
            Arc::clone(
                sessions
                    .entry(user_id)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(SessionContext::new(user_id)))),
            )
        };
        SessionGuard {
            user_id,
            guard: slot.lock_owned().await,
        }
    }

    /// Give the session back. An idle session nobody else is waiting for is
    /// dropped from the index.
    pub fn release(&self, guard: SessionGuard) {
        let user_id = guard.user_id;
        let idle = guard.state.is_idle();

        let mut sessions = self.index();
        drop(guard);
        if !idle {
            return;
        }
        if sessions
            .get(&user_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            sessions.remove(&user_id);
            tracing::debug!(user_id = %user_id, "Evicted idle session");
        }
    }

    /// Drop a user's session whatever its state, unless someone holds or
    /// awaits it. Returns whether it was dropped.
    pub fn evict(&self, user_id: UserId) -> bool {
        let mut sessions = self.index();
        let unused = sessions
            .get(&user_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if unused {
            sessions.remove(&user_id);
        }
        unused
    }

    /// Number of sessions currently indexed
    #[allow(dead_code)] // Used in tests
    pub fn active_sessions(&self) -> usize {
        self.index().len()
    }
}
