//! Session runtime executor

use super::traits::{AuditLog, ChatTransport, HotelProvider};
use super::{lock_registry, Inbound, Registry, Services};
use crate::provider::ProviderError;
use crate::state_machine::{transition, ChatId, Effect, Event, UserId};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Worker that owns one user's event queue
pub struct SessionRuntime<T, P, A> {
    user_id: UserId,
    worker_id: u64,
    services: Arc<Services<T, P, A>>,
    rx: mpsc::Receiver<Inbound>,
    workers: Registry,
}

impl<T, P, A> SessionRuntime<T, P, A>
where
    T: ChatTransport + 'static,
    P: HotelProvider + 'static,
    A: AuditLog + 'static,
{
    pub(super) fn new(
        user_id: UserId,
        worker_id: u64,
        services: Arc<Services<T, P, A>>,
        rx: mpsc::Receiver<Inbound>,
        workers: Registry,
    ) -> Self {
        Self {
            user_id,
            worker_id,
            services,
            rx,
            workers,
        }
    }

    pub async fn run(mut self) {
        let idle_timeout = self.services.settings.idle_timeout;

        loop {
            let inbound = match tokio::time::timeout(idle_timeout, self.rx.recv()).await {
                Ok(Some(inbound)) => inbound,
                Ok(None) => break,
                Err(_) => match self.retire() {
                    Some(inbound) => inbound,
                    None => break,
                },
            };
            self.handle(inbound).await;
        }

        tracing::debug!(user_id = %self.user_id, worker_id = self.worker_id, "Session worker stopped");
    }

    /// Unregister after an idle period, unless an event slipped in. The
    /// user's session expires with the worker, whatever wizard step it was at.
    ///
    /// Runs under the registry lock, which `dispatch` also holds while
    /// queueing, so no event can land in a queue nobody reads.
    fn retire(&mut self) -> Option<Inbound> {
        let mut workers = lock_registry(&self.workers);
        if let Ok(inbound) = self.rx.try_recv() {
            return Some(inbound);
        }
        if workers
            .get(&self.user_id)
            .is_some_and(|handle| handle.id == self.worker_id)
        {
            workers.remove(&self.user_id);
            if self.services.sessions.evict(self.user_id) {
                tracing::debug!(user_id = %self.user_id, "Expired idle session");
            }
        }
        None
    }

    async fn handle(&self, inbound: Inbound) {
        let Inbound {
            user_id,
            chat_id,
            event,
            callback_id,
        } = inbound;

        if let Some(callback_id) = callback_id {
            if let Err(e) = self.services.transport.answer_callback(&callback_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to answer callback");
            }
        }

        let env = self.services.env();
        let mut session = self.services.sessions.acquire(user_id).await;

        // Effects may produce follow-up events; handle them in order
        let mut events_to_process = VecDeque::from([event]);
        while let Some(event) = events_to_process.pop_front() {
            let kind = event.kind();
            let result = match transition(&session, &env, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(user_id = %user_id, state = ?session.state, error = %e, "Event ignored");
                    continue;
                }
            };

            let from = session.state;
            *session = result.new_context;
            if from != session.state {
                tracing::info!(
                    user_id = %user_id,
                    from = ?from,
                    to = ?session.state,
                    event = ?kind,
                    "State changed"
                );
            }

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(user_id, chat_id, effect).await {
                    events_to_process.push_back(generated);
                }
            }
        }

        self.services.sessions.release(session);
    }

    /// Execute one effect. Provider and audit reads come back as events;
    /// transport failures are logged and swallowed.
    async fn execute_effect(&self, user_id: UserId, chat_id: ChatId, effect: Effect) -> Option<Event> {
        let transport = &self.services.transport;

        match effect {
            Effect::SendText { text, keyboard } => {
                let sent = transport.send_text(chat_id, &text, keyboard.as_ref()).await;
                log_transport(user_id, "send_text", sent.map(|_| ()));
                None
            }

            Effect::EditText {
                message_id,
                text,
                keyboard,
            } => {
                let edited = transport
                    .edit_text(chat_id, message_id, &text, keyboard.as_ref())
                    .await;
                log_transport(user_id, "edit_text", edited);
                None
            }

            Effect::DeleteMessage { message_id } => {
                log_transport(
                    user_id,
                    "delete_message",
                    transport.delete_message(chat_id, message_id).await,
                );
                None
            }

            Effect::SendMedia { media } => {
                log_transport(user_id, "send_media", transport.send_media(chat_id, &media).await);
                None
            }

            Effect::LookupCity { query } => {
                let lookup = self.bounded(self.services.provider.lookup_city(&query)).await;
                Some(match lookup {
                    Ok(matches) => Event::CitiesFound { matches },
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, kind = ?e.kind, error = %e, "City lookup failed");
                        Event::CityLookupFailed {
                            reason: e.to_string(),
                        }
                    }
                })
            }

            Effect::SearchHotels { criteria } => {
                let search = self.bounded(self.services.provider.search_hotels(&criteria)).await;
                Some(match search {
                    Ok(results) => Event::SearchCompleted { results },
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, kind = ?e.kind, error = %e, "Hotel search failed");
                        Event::SearchFailed {
                            reason: e.to_string(),
                        }
                    }
                })
            }

            Effect::RecordSearch { record } => {
                let services = Arc::clone(&self.services);
                tokio::spawn(async move {
                    if let Err(e) = services.audit.append_search(&record).await {
                        tracing::error!(user_id = %record.user_id, error = %e, "Failed to record search");
                    }
                });
                None
            }

            Effect::LoadHistory { limit } => {
                Some(match self.services.audit.recent_searches(user_id, limit).await {
                    Ok(records) => Event::HistoryLoaded { records },
                    Err(e) => {
                        tracing::error!(user_id = %user_id, error = %e, "Failed to load history");
                        Event::HistoryFailed {
                            reason: e.to_string(),
                        }
                    }
                })
            }
        }
    }

    /// Apply the provider timeout to a call
    async fn bounded<R>(
        &self,
        call: impl Future<Output = Result<R, ProviderError>>,
    ) -> Result<R, ProviderError> {
        let limit = self.services.settings.provider_timeout;
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(ProviderError::timeout(format!(
                "no reply within {}s",
                limit.as_secs_f64()
            )))
        })
    }
}

fn log_transport(user_id: UserId, operation: &str, result: Result<(), crate::telegram::TransportError>) {
    if let Err(e) = result {
        tracing::warn!(user_id = %user_id, operation, error = %e, "Chat transport call failed");
    }
}
