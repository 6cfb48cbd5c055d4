//! Telegram Bot API transport
//!
//! A thin client over the HTTPS Bot API, the [`ChatTransport`] adapter the
//! runtime talks to, and the long-polling loop that feeds inbound updates
//! into the session manager.

mod types;

pub use types::*;

use crate::runtime::{AuditLog, ChatTransport, HotelProvider, Inbound, SessionManager};
use crate::state_machine::{ChatId, Event, Keyboard, MediaBlock, MessageId, SearchCommand, UserId};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://api.telegram.org";
/// Telegram's limit on photos per media group
const MEDIA_GROUP_MAX: usize = 10;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("Unexpected reply: {0}")]
    InvalidReply(String),
}

// ============================================================================
// Client
// ============================================================================

/// Bot API client bound to one bot token
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// `poll_timeout` is the long-poll wait; the HTTP timeout leaves headroom above it
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{API_BASE}/bot{token}"),
        })
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_reply(method, status.as_u16(), &text)
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, TransportError> {
        self.call(
            "sendMessage",
            &json!({
                "chat_id": chat.0,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
                "reply_markup": markup,
            }),
        )
        .await
    }

    pub async fn edit_message_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        // Replies with the edited message, or `true` for inline messages
        let _: Value = self
            .call(
                "editMessageText",
                &json!({
                    "chat_id": chat.0,
                    "message_id": message.0,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                    "reply_markup": markup,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": chat.0, "message_id": message.0 }),
            )
            .await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat: ChatId, photo: &str) -> Result<(), TransportError> {
        let _: Message = self
            .call("sendPhoto", &json!({ "chat_id": chat.0, "photo": photo }))
            .await?;
        Ok(())
    }

    /// Send 2 to 10 photos as one album
    pub async fn send_media_group(&self, chat: ChatId, photos: &[String]) -> Result<(), TransportError> {
        let media: Vec<InputMediaPhoto> = photos.iter().map(InputMediaPhoto::new).collect();
        let _: Vec<Message> = self
            .call("sendMediaGroup", &json!({ "chat_id": chat.0, "media": media }))
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommandInfo]) -> Result<(), TransportError> {
        let _: bool = self
            .call("setMyCommands", &json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}

fn parse_reply<R: DeserializeOwned>(method: &str, status: u16, body: &str) -> Result<R, TransportError> {
    let reply: ApiResponse<R> = serde_json::from_str(body).map_err(|e| {
        TransportError::InvalidReply(format!("{method} (HTTP {status}): {e}"))
    })?;

    if !reply.ok {
        return Err(TransportError::Api {
            code: reply.error_code.unwrap_or_else(|| i64::from(status)),
            description: reply.description.unwrap_or_default(),
        });
    }
    reply
        .result
        .ok_or_else(|| TransportError::InvalidReply(format!("{method}: ok reply without result")))
}

/// Command menu shown by Telegram clients
pub fn command_menu() -> Vec<BotCommandInfo> {
    let mut commands: Vec<BotCommandInfo> = SearchCommand::ALL
        .iter()
        .map(|c| BotCommandInfo {
            command: c.name().to_string(),
            description: c.description().to_string(),
        })
        .collect();
    for (command, description) in [
        ("history", "your recent searches"),
        ("help", "list of commands"),
    ] {
        commands.push(BotCommandInfo {
            command: command.to_string(),
            description: description.to_string(),
        });
    }
    commands
}

// ============================================================================
// Chat Transport Adapter
// ============================================================================

/// One outbound photo call
#[derive(Debug, Clone, PartialEq)]
enum PhotoRequest {
    Single(String),
    Group(Vec<String>),
}

/// Split a media block into `sendPhoto`/`sendMediaGroup` calls
fn photo_requests(media: &MediaBlock, placeholder: &str) -> Vec<PhotoRequest> {
    let photos = match media {
        MediaBlock::Photos(photos) if !photos.is_empty() => photos,
        _ => return vec![PhotoRequest::Single(placeholder.to_string())],
    };
    photos
        .chunks(MEDIA_GROUP_MAX)
        .map(|chunk| match chunk {
            [single] => PhotoRequest::Single(single.clone()),
            many => PhotoRequest::Group(many.to_vec()),
        })
        .collect()
}

/// [`ChatTransport`] over the Bot API
pub struct TelegramTransport {
    client: Arc<TelegramClient>,
    placeholder_photo: String,
}

impl TelegramTransport {
    pub fn new(client: Arc<TelegramClient>, placeholder_photo: impl Into<String>) -> Self {
        Self {
            client,
            placeholder_photo: placeholder_photo.into(),
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let message = self
            .client
            .send_message(chat, text, keyboard.map(InlineKeyboardMarkup::from))
            .await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.client
            .edit_message_text(chat, message, text, keyboard.map(InlineKeyboardMarkup::from))
            .await
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        self.client.delete_message(chat, message).await
    }

    async fn send_media(&self, chat: ChatId, media: &MediaBlock) -> Result<(), TransportError> {
        for request in photo_requests(media, &self.placeholder_photo) {
            match request {
                PhotoRequest::Single(photo) => self.client.send_photo(chat, &photo).await?,
                PhotoRequest::Group(photos) => self.client.send_media_group(chat, &photos).await?,
            }
        }
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.client.answer_callback_query(callback_id).await
    }
}

// ============================================================================
// Long Polling
// ============================================================================

/// Translate a Bot API update into a wizard event
pub fn inbound_from_update(update: Update) -> Option<Inbound> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        let data = query.data?;
        return Some(Inbound {
            user_id: UserId(query.from.id),
            chat_id: ChatId(message.chat.id),
            event: Event::callback(&data, MessageId(message.message_id)),
            callback_id: Some(query.id),
        });
    }

    let message = update.message?;
    let from = message.from.filter(|user| !user.is_bot)?;
    let text = message.text?;
    Some(Inbound {
        user_id: UserId(from.id),
        chat_id: ChatId(message.chat.id),
        event: Event::from_message(&text, MessageId(message.message_id)),
        callback_id: None,
    })
}

/// Long-polls `getUpdates` and dispatches every update
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    poll_timeout: Duration,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, poll_timeout: Duration) -> Self {
        Self {
            client,
            poll_timeout,
        }
    }

    /// Run until `cancel` fires
    pub async fn run<T, P, A>(&self, manager: &SessionManager<T, P, A>, cancel: CancellationToken)
    where
        T: ChatTransport + 'static,
        P: HotelProvider + 'static,
        A: AuditLog + 'static,
    {
        let mut offset = None;
        let mut backoff = INITIAL_BACKOFF;
        tracing::info!(poll_timeout_secs = self.poll_timeout.as_secs(), "Update poller started");

        loop {
            let polled = tokio::select! {
                () = cancel.cancelled() => break,
                polled = self.client.get_updates(offset, self.poll_timeout) => polled,
            };

            match polled {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let update_id = update.update_id;
                        match inbound_from_update(update) {
                            Some(inbound) => manager.dispatch(inbound),
                            None => tracing::debug!(update_id, "Ignoring update"),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in_ms = %backoff.as_millis(), "getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        tracing::info!("Update poller stopped");
    }
}
