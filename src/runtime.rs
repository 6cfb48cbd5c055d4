//! Runtime for executing wizard sessions
//!
//! Every user gets a worker task fed by a bounded queue, so one user's
//! events are handled strictly in arrival order while different users run
//! in parallel. Workers retire after a period without events.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::session::SessionStore;
use crate::state_machine::{
    ChatId, Event, UserId, WizardEnv, DEFAULT_PHOTO_COUNTS, DEFAULT_RESULT_COUNTS,
};
use chrono::{Local, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One event from the chat platform, tagged with who sent it
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub event: Event,
    /// Present for button presses; answered before the event is handled
    pub callback_id: Option<String>,
}

/// Tunables shared by all sessions
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Upper bound on every provider call
    pub provider_timeout: Duration,
    /// A worker with no events for this long shuts down
    pub idle_timeout: Duration,
    /// Per-user queue length; further events are dropped
    pub queue_capacity: usize,
    pub result_counts: Vec<u8>,
    pub photo_counts: Vec<u8>,
    pub history_limit: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(900),
            queue_capacity: 32,
            result_counts: DEFAULT_RESULT_COUNTS.to_vec(),
            photo_counts: DEFAULT_PHOTO_COUNTS.to_vec(),
            history_limit: 5,
        }
    }
}

/// Collaborators and state shared by every worker
pub struct Services<T, P, A> {
    pub transport: T,
    pub provider: P,
    pub audit: A,
    pub sessions: SessionStore,
    pub settings: RuntimeSettings,
}

impl<T, P, A> Services<T, P, A> {
    /// Environment for the next transition
    pub fn env(&self) -> WizardEnv {
        WizardEnv::new(Utc::now(), Local::now().date_naive())
            .with_counts(
                self.settings.result_counts.clone(),
                self.settings.photo_counts.clone(),
            )
            .with_history_limit(self.settings.history_limit)
    }
}

/// Handle to a running session worker
struct WorkerHandle {
    id: u64,
    tx: mpsc::Sender<Inbound>,
}

type Registry = Arc<Mutex<HashMap<UserId, WorkerHandle>>>;

fn lock_registry(registry: &Mutex<HashMap<UserId, WorkerHandle>>) -> MutexGuard<'_, HashMap<UserId, WorkerHandle>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes inbound events to per-user workers
pub struct SessionManager<T, P, A> {
    services: Arc<Services<T, P, A>>,
    workers: Registry,
    next_worker_id: AtomicU64,
}

impl<T, P, A> SessionManager<T, P, A>
where
    T: ChatTransport + 'static,
    P: HotelProvider + 'static,
    A: AuditLog + 'static,
{
    pub fn new(transport: T, provider: P, audit: A, settings: RuntimeSettings) -> Self {
        Self {
            services: Arc::new(Services {
                transport,
                provider,
                audit,
                sessions: SessionStore::new(),
                settings,
            }),
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_worker_id: AtomicU64::new(1),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn services(&self) -> &Arc<Services<T, P, A>> {
        &self.services
    }

    /// Queue an event for its user's worker, starting one if needed.
    ///
    /// Never waits: a full queue drops the event with a warning.
    pub fn dispatch(&self, inbound: Inbound) {
        let user_id = inbound.user_id;
        let mut workers = lock_registry(&self.workers);

        let inbound = match workers.get(&user_id) {
            Some(handle) => match handle.tx.try_send(inbound) {
                Ok(()) => return,
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        event = ?dropped.event.kind(),
                        "Session queue full, dropping event"
                    );
                    return;
                }
                Err(TrySendError::Closed(inbound)) => {
                    tracing::warn!(user_id = %user_id, "Session worker gone, restarting");
                    workers.remove(&user_id);
                    inbound
                }
            },
            None => inbound,
        };

        let handle = self.spawn_worker(user_id);
        if let Err(e) = handle.tx.try_send(inbound) {
            tracing::error!(user_id = %user_id, error = %e, "Fresh session queue rejected event");
        }
        workers.insert(user_id, handle);
    }

    fn spawn_worker(&self, user_id: UserId) -> WorkerHandle {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.services.settings.queue_capacity.max(1));
        let runtime = SessionRuntime::new(
            user_id,
            id,
            Arc::clone(&self.services),
            rx,
            Arc::clone(&self.workers),
        );
        tokio::spawn(runtime.run());
        tracing::debug!(user_id = %user_id, worker_id = id, "Started session worker");
        WorkerHandle { id, tx }
    }

    /// Number of users with a live worker
    pub fn active_workers(&self) -> usize {
        lock_registry(&self.workers).len()
    }
}
