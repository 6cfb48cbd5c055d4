//! Mock implementations for testing
//!
//! These mocks enable driving the real runtime without real I/O.

use super::traits::*;
use crate::db::{DbError, SearchRecord};
use crate::provider::{HotelResult, ProviderError, SearchCriteria};
use crate::state_machine::{ChatId, CityMatch, Keyboard, MediaBlock, MessageId, UserId};
use crate::telegram::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Chat Transport
// ============================================================================

/// One outbound call recorded by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        message_id: MessageId,
        text: String,
    },
    Delete {
        message_id: MessageId,
    },
    Media {
        media: MediaBlock,
    },
    CallbackAnswer {
        id: String,
    },
}

/// Transport that records every call
pub struct MockTransport {
    pub sent: Mutex<Vec<Sent>>,
    next_message_id: AtomicI64,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1000),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every call fail (after recording it)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of all sent messages, in order
    pub fn texts(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sent_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(sent);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: 400,
                description: "Bad Request: mock failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let message_id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        self.record(Sent::Text {
            chat,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        })?;
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        _chat: ChatId,
        message: MessageId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.record(Sent::Edit {
            message_id: message,
            text: text.to_string(),
        })
    }

    async fn delete_message(&self, _chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        self.record(Sent::Delete {
            message_id: message,
        })
    }

    async fn send_media(&self, _chat: ChatId, media: &MediaBlock) -> Result<(), TransportError> {
        self.record(Sent::Media {
            media: media.clone(),
        })
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.record(Sent::CallbackAnswer {
            id: callback_id.to_string(),
        })
    }
}

// ============================================================================
// Mock Hotel Provider
// ============================================================================

/// Provider that returns queued responses; an empty queue answers with
/// no results
pub struct MockProvider {
    cities: Mutex<VecDeque<Result<Vec<CityMatch>, ProviderError>>>,
    hotels: Mutex<VecDeque<Result<Vec<HotelResult>, ProviderError>>>,
    delay: Option<Duration>,
    pub lookups: Mutex<Vec<String>>,
    pub searches: Mutex<Vec<SearchCriteria>>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new() -> Self {
        Self {
            cities: Mutex::new(VecDeque::new()),
            hotels: Mutex::new(VecDeque::new()),
            delay: None,
            lookups: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_cities(&self, cities: Vec<CityMatch>) {
        self.cities.lock().unwrap().push_back(Ok(cities));
    }

    pub fn queue_hotels(&self, hotels: Vec<HotelResult>) {
        self.hotels.lock().unwrap().push_back(Ok(hotels));
    }

    pub fn queue_search_error(&self, error: ProviderError) {
        self.hotels.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_searches(&self) -> Vec<SearchCriteria> {
        self.searches.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HotelProvider for MockProvider {
    async fn lookup_city(&self, query: &str) -> Result<Vec<CityMatch>, ProviderError> {
        self.lookups.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.cities
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn search_hotels(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<HotelResult>, ProviderError> {
        self.searches.lock().unwrap().push(criteria.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.hotels
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }
}

// ============================================================================
// Mock Audit Log
// ============================================================================

/// In-memory audit log
pub struct MockAuditLog {
    pub records: Mutex<Vec<SearchRecord>>,
    failing: bool,
}

#[allow(dead_code)]
impl MockAuditLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Audit log whose every call fails
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn recorded(&self) -> Vec<SearchRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MockAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLog for MockAuditLog {
    async fn append_search(&self, record: &SearchRecord) -> Result<(), DbError> {
        if self.failing {
            return Err(DbError::Poisoned);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn recent_searches(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRecord>, DbError> {
        if self.failing {
            return Err(DbError::Poisoned);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Runtime Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;
    use crate::runtime::{Inbound, RuntimeSettings, SessionManager};
    use crate::state_machine::calendar::{CalendarAction, CalendarInstance, CalendarPayload};
    use crate::state_machine::prompts;
    use crate::state_machine::{CallbackAction, Event, PageAction, SearchCommand, WizardState};
    use chrono::{Days, Local, NaiveDate};
    use std::sync::Arc;

    type TestManager = SessionManager<Arc<MockTransport>, Arc<MockProvider>, Arc<MockAuditLog>>;

    struct Harness {
        manager: TestManager,
        transport: Arc<MockTransport>,
        provider: Arc<MockProvider>,
        audit: Arc<MockAuditLog>,
    }

    impl Harness {
        fn new(provider: MockProvider, audit: MockAuditLog, settings: RuntimeSettings) -> Self {
            let transport = Arc::new(MockTransport::new());
            let provider = Arc::new(provider);
            let audit = Arc::new(audit);
            let manager = SessionManager::new(
                Arc::clone(&transport),
                Arc::clone(&provider),
                Arc::clone(&audit),
                settings,
            );
            Self {
                manager,
                transport,
                provider,
                audit,
            }
        }

        fn default_with(provider: MockProvider) -> Self {
            Self::new(provider, MockAuditLog::new(), RuntimeSettings::default())
        }

        fn say(&self, user: i64, text: &str) {
            self.manager.dispatch(Inbound {
                user_id: UserId(user),
                chat_id: ChatId(user),
                event: Event::from_message(text, MessageId(1)),
                callback_id: None,
            });
        }

        fn press(&self, user: i64, action: CallbackAction) {
            self.manager.dispatch(Inbound {
                user_id: UserId(user),
                chat_id: ChatId(user),
                event: Event::Callback {
                    action,
                    message_id: MessageId(500),
                },
                callback_id: Some(format!("cb-{user}")),
            });
        }

        fn pick(&self, user: i64, instance: CalendarInstance, date: NaiveDate) {
            self.press(
                user,
                CallbackAction::Calendar(CalendarPayload {
                    instance,
                    action: CalendarAction::Pick(date),
                }),
            );
        }

        async fn state(&self, user: i64) -> WizardState {
            let sessions = &self.manager.services().sessions;
            let session = sessions.acquire(UserId(user)).await;
            let state = session.state;
            sessions.release(session);
            state
        }

        /// Walk a low-price search up to the photo count press
        fn low_price_search(&self, user: i64) {
            let check_in = days_from_today(2);
            self.say(user, "/low_price");
            self.say(user, "Paris");
            self.press(
                user,
                CallbackAction::City {
                    id: "504261".to_string(),
                },
            );
            self.pick(user, CalendarInstance::CheckIn, check_in);
            self.pick(user, CalendarInstance::CheckOut, check_in + Days::new(2));
            self.press(user, CallbackAction::ResultCount(5));
            self.press(user, CallbackAction::PhotoCount(3));
        }
    }

    fn days_from_today(days: u64) -> NaiveDate {
        Local::now().date_naive() + Days::new(days)
    }

    fn hotel(id: u32, photos: usize) -> HotelResult {
        HotelResult {
            id: id.to_string(),
            name: format!("Hotel {id}"),
            price_per_night: 90.0 + f64::from(id),
            total_price: 180.0 + f64::from(id),
            distance_km: None,
            rating: 8.2,
            review_count: 40,
            photos: (0..photos).map(|i| format!("https://img/{id}/{i}.jpg")).collect(),
            link: None,
        }
    }

    fn paris() -> Vec<CityMatch> {
        vec![CityMatch::new("504261", "Paris, Ile-de-France, France")]
    }

    async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for: {what}");
    }

    #[tokio::test]
    async fn test_low_price_search_ends_in_paging() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        provider.queue_hotels((1..=6).map(|id| hotel(id, 3)).collect());
        let h = Harness::default_with(provider);

        h.low_price_search(1);
        eventually("first page", || {
            h.transport
                .recorded()
                .iter()
                .any(|s| matches!(s, Sent::Media { .. }))
        })
        .await;

        let searches = h.provider.recorded_searches();
        assert_eq!(searches.len(), 1);
        let criteria = &searches[0];
        assert_eq!(criteria.destination_id, "504261");
        assert_eq!(criteria.check_in, days_from_today(2));
        assert_eq!(criteria.check_out, days_from_today(4));
        assert_eq!(criteria.result_count, 5);
        assert_eq!(criteria.photo_count, 3);
        assert!(criteria.max_distance_km.is_none());

        assert_eq!(h.state(1).await, WizardState::Paging);
        let sessions = &h.manager.services().sessions;
        let session = sessions.acquire(UserId(1)).await;
        assert_eq!(session.results.len(), 5);
        assert_eq!(session.page_index, 0);
        sessions.release(session);

        eventually("audit record", || h.audit.recorded().len() == 1).await;
        assert_eq!(h.audit.recorded()[0].destination, "Paris, Ile-de-France, France");

        // Input hygiene: the typed city was deleted and echoed
        assert!(h
            .transport
            .recorded()
            .contains(&Sent::Delete {
                message_id: MessageId(1)
            }));
        assert!(h.transport.sent_text("🏙 Paris, Ile-de-France, France"));
        assert!(h
            .transport
            .recorded()
            .contains(&Sent::CallbackAnswer {
                id: "cb-1".to_string()
            }));
    }

    #[tokio::test]
    async fn test_page_navigation_through_runtime() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        provider.queue_hotels((1..=2).map(|id| hotel(id, 0)).collect());
        let h = Harness::default_with(provider);

        h.low_price_search(1);
        h.press(1, CallbackAction::Page(PageAction::Next));
        h.press(1, CallbackAction::Page(PageAction::Next));

        eventually("viewed marker", || {
            h.transport.recorded().iter().any(|s| {
                matches!(s, Sent::Edit { text, .. } if text.starts_with("⬆️ Hotel 1"))
            })
        })
        .await;
        eventually("second page", || h.transport.sent_text("<b>Hotel:</b> Hotel 2")).await;

        // The second Next was a clamped no-op: exactly two pages rendered
        tokio::time::sleep(Duration::from_millis(30)).await;
        let pages = h
            .transport
            .recorded()
            .iter()
            .filter(|s| matches!(s, Sent::Media { media: MediaBlock::Placeholder }))
            .count();
        assert_eq!(pages, 2);

        h.press(1, CallbackAction::EndViewing);
        eventually("viewing finished", || h.transport.sent_text(prompts::VIEWING_FINISHED)).await;
        assert_eq!(h.state(1).await, WizardState::Idle);
    }

    #[tokio::test]
    async fn test_no_city_matches_keeps_asking() {
        let h = Harness::default_with(MockProvider::new());
        h.say(1, "/high_price");
        h.say(1, "Atlantis");

        eventually("not found", || h.transport.sent_text(prompts::CITY_NOT_FOUND)).await;
        assert_eq!(h.state(1).await, WizardState::AwaitingCity);
    }

    #[tokio::test]
    async fn test_search_error_is_an_apology() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        provider.queue_search_error(ProviderError::new(ProviderErrorKind::ServerError, "HTTP 503"));
        let h = Harness::default_with(provider);

        h.low_price_search(1);
        eventually("apology", || h.transport.sent_text(prompts::NO_RESULTS)).await;
        assert_eq!(h.state(1).await, WizardState::Idle);
        assert!(h.audit.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_provider_timeout_counts_as_not_found() {
        let provider = MockProvider::new().with_delay(Duration::from_millis(500));
        provider.queue_cities(paris());
        let settings = RuntimeSettings {
            provider_timeout: Duration::from_millis(20),
            ..RuntimeSettings::default()
        };
        let h = Harness::new(provider, MockAuditLog::new(), settings);

        h.say(1, "/best_deal");
        h.say(1, "Paris");
        eventually("not found", || h.transport.sent_text(prompts::CITY_NOT_FOUND)).await;
        assert_eq!(h.state(1).await, WizardState::AwaitingCity);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_block_paging() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        provider.queue_hotels(vec![hotel(1, 1)]);
        let h = Harness::new(provider, MockAuditLog::failing(), RuntimeSettings::default());

        h.low_price_search(1);
        eventually("first page", || h.transport.sent_text("<b>Hotel:</b> Hotel 1")).await;
        assert_eq!(h.state(1).await, WizardState::Paging);
    }

    #[tokio::test]
    async fn test_transport_failures_are_swallowed() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        let h = Harness::default_with(provider);
        h.transport.set_failing(true);

        h.say(1, "/low_price");
        h.say(1, "Paris");
        eventually("city lookup", || h.provider.lookup_count() == 1).await;
        eventually("choice list", || h.transport.sent_text(prompts::CITY_CHOICE_PROMPT)).await;
        assert_eq!(h.state(1).await, WizardState::AwaitingCityChoice);
    }

    #[tokio::test]
    async fn test_history_lists_recorded_searches() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        provider.queue_hotels(vec![hotel(7, 0)]);
        let h = Harness::default_with(provider);

        h.low_price_search(1);
        eventually("audit record", || h.audit.recorded().len() == 1).await;
        h.press(1, CallbackAction::EndViewing);
        h.say(1, "/history");

        eventually("history", || {
            h.transport
                .texts()
                .iter()
                .any(|t| t.contains("/low_price") && t.contains("Hotel 7"))
        })
        .await;
        assert!(h.transport.sent_text(&SearchCommand::LowPrice.to_string()));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let provider = MockProvider::new();
        provider.queue_cities(paris());
        let h = Harness::default_with(provider);

        h.say(1, "/low_price");
        h.say(2, "/best_deal");
        h.say(2, "/start");

        eventually("welcome", || h.transport.sent_text("Hello")).await;
        assert_eq!(h.state(1).await, WizardState::AwaitingCity);
        assert_eq!(h.state(2).await, WizardState::Idle);
    }

    #[tokio::test]
    async fn test_full_queue_drops_events() {
        let provider = MockProvider::new().with_delay(Duration::from_millis(300));
        let settings = RuntimeSettings {
            queue_capacity: 1,
            ..RuntimeSettings::default()
        };
        let h = Harness::new(provider, MockAuditLog::new(), settings);

        h.say(1, "/low_price");
        eventually("city prompt", || h.transport.sent_text(prompts::CITY_PROMPT)).await;
        h.say(1, "Paris");
        eventually("lookup started", || h.provider.lookup_count() == 1).await;

        // Worker is busy in the lookup: one slot queued, the next dropped
        h.say(1, "/help");
        h.say(1, "/start");

        eventually("not found", || h.transport.sent_text(prompts::CITY_NOT_FOUND)).await;
        eventually("help", || h.transport.sent_text("/help - this list")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!h.transport.sent_text("Hello"));
    }

    #[tokio::test]
    async fn test_abandoned_wizards_expire_with_their_workers() {
        let settings = RuntimeSettings {
            idle_timeout: Duration::from_millis(20),
            ..RuntimeSettings::default()
        };
        let h = Harness::new(MockProvider::new(), MockAuditLog::new(), settings);

        for user in 1..=50 {
            h.say(user, "/low_price");
        }
        eventually("city prompts", || {
            h.transport
                .texts()
                .iter()
                .filter(|t| t.as_str() == prompts::CITY_PROMPT)
                .count()
                == 50
        })
        .await;
        eventually("workers retired", || h.manager.active_workers() == 0).await;
        assert_eq!(h.manager.services().sessions.active_sessions(), 0);

        // An expired wizard starts over from the menu
        h.say(7, "Paris");
        eventually("idle guidance", || h.transport.sent_text(&prompts::idle_guidance())).await;
        assert_eq!(h.provider.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_worker_retires_and_restarts() {
        let settings = RuntimeSettings {
            idle_timeout: Duration::from_millis(20),
            ..RuntimeSettings::default()
        };
        let h = Harness::new(MockProvider::new(), MockAuditLog::new(), settings);

        h.say(1, "/help");
        eventually("menu", || h.transport.texts().len() == 1).await;
        eventually("worker retired", || h.manager.active_workers() == 0).await;
        assert_eq!(h.manager.services().sessions.active_sessions(), 0);

        h.say(1, "/low_price");
        eventually("city prompt", || h.transport.sent_text(prompts::CITY_PROMPT)).await;
        assert_eq!(h.state(1).await, WizardState::AwaitingCity);
    }
}
