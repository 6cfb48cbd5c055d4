//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{Database, DbError, SearchRecord};
use crate::provider::{HotelResult, ProviderError, SearchCriteria};
use crate::state_machine::{ChatId, CityMatch, Keyboard, MediaBlock, MessageId, UserId};
use crate::telegram::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound side of the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send an HTML message, optionally with an inline keyboard
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace text and keyboard of an earlier message
    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError>;

    /// Send photos (or the placeholder image)
    async fn send_media(&self, chat: ChatId, media: &MediaBlock) -> Result<(), TransportError>;

    /// Stop the client's progress indicator on a pressed button
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

/// External hotel search service
#[async_trait]
pub trait HotelProvider: Send + Sync {
    /// Resolve free text into candidate cities; empty is a normal outcome
    async fn lookup_city(&self, query: &str) -> Result<Vec<CityMatch>, ProviderError>;

    /// Run a hotel query; empty is a normal outcome
    async fn search_hotels(&self, criteria: &SearchCriteria)
        -> Result<Vec<HotelResult>, ProviderError>;
}

/// Append-only record of completed searches
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append_search(&self, record: &SearchRecord) -> Result<(), DbError>;

    /// Most recent searches of one user, newest first
    async fn recent_searches(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRecord>, DbError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        (**self).send_text(chat, text, keyboard).await
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        (**self).edit_text(chat, message, text, keyboard).await
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        (**self).delete_message(chat, message).await
    }

    async fn send_media(&self, chat: ChatId, media: &MediaBlock) -> Result<(), TransportError> {
        (**self).send_media(chat, media).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id).await
    }
}

#[async_trait]
impl<T: HotelProvider + ?Sized> HotelProvider for Arc<T> {
    async fn lookup_city(&self, query: &str) -> Result<Vec<CityMatch>, ProviderError> {
        (**self).lookup_city(query).await
    }

    async fn search_hotels(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<HotelResult>, ProviderError> {
        (**self).search_hotels(criteria).await
    }
}

#[async_trait]
impl<T: AuditLog + ?Sized> AuditLog for Arc<T> {
    async fn append_search(&self, record: &SearchRecord) -> Result<(), DbError> {
        (**self).append_search(record).await
    }

    async fn recent_searches(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRecord>, DbError> {
        (**self).recent_searches(user_id, limit).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl AuditLog for Database {
    async fn append_search(&self, record: &SearchRecord) -> Result<(), DbError> {
        let id = Database::append_search(self, record)?;
        tracing::debug!(id, user_id = %record.user_id, "Search recorded");
        Ok(())
    }

    async fn recent_searches(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRecord>, DbError> {
        Database::recent_searches(self, user_id, limit)
    }
}
