//! Events that drive the wizard

use super::calendar::CalendarPayload;
use super::state::{CityMatch, MessageId, SearchCommand};
use crate::db::SearchRecord;
use crate::provider::HotelResult;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Command(BotCommand),
    Text {
        text: String,
        message_id: MessageId,
    },
    Callback {
        action: CallbackAction,
        /// Message the pressed keyboard is attached to
        message_id: MessageId,
    },

    // Provider events
    CitiesFound {
        matches: Vec<CityMatch>,
    },
    CityLookupFailed {
        reason: String,
    },
    SearchCompleted {
        results: Vec<HotelResult>,
    },
    SearchFailed {
        reason: String,
    },

    // Audit log events
    HistoryLoaded {
        records: Vec<SearchRecord>,
    },
    HistoryFailed {
        reason: String,
    },
}

impl Event {
    /// Classify an incoming chat message as a command or plain text
    pub fn from_message(text: &str, message_id: MessageId) -> Self {
        match BotCommand::parse(text) {
            Some(command) => Event::Command(command),
            None => Event::Text {
                text: text.to_string(),
                message_id,
            },
        }
    }

    pub fn callback(payload: &str, message_id: MessageId) -> Self {
        Event::Callback {
            action: CallbackAction::parse(payload),
            message_id,
        }
    }

    /// Key used by the transition table
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Command(BotCommand::Search(_)) => EventKind::SearchCommand,
            Event::Command(BotCommand::Start) => EventKind::StartCommand,
            Event::Command(BotCommand::Help) => EventKind::HelpCommand,
            Event::Command(BotCommand::History) => EventKind::HistoryCommand,
            Event::Text { .. } => EventKind::Text,
            Event::Callback { action, .. } => match action {
                CallbackAction::MainMenu => EventKind::MainMenu,
                CallbackAction::City { .. } => EventKind::CityChoice,
                CallbackAction::Calendar(_) => EventKind::Calendar,
                CallbackAction::ResultCount(_) => EventKind::ResultCount,
                CallbackAction::PhotoCount(_) => EventKind::PhotoCount,
                CallbackAction::Page(_) => EventKind::PageNav,
                CallbackAction::EndViewing => EventKind::EndViewing,
                CallbackAction::Unknown(_) => EventKind::UnknownCallback,
            },
            Event::CitiesFound { .. } => EventKind::CitiesFound,
            Event::CityLookupFailed { .. } => EventKind::CityLookupFailed,
            Event::SearchCompleted { .. } => EventKind::SearchCompleted,
            Event::SearchFailed { .. } => EventKind::SearchFailed,
            Event::HistoryLoaded { .. } => EventKind::HistoryLoaded,
            Event::HistoryFailed { .. } => EventKind::HistoryFailed,
        }
    }
}

/// Discriminant of an [`Event`], one column of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SearchCommand,
    StartCommand,
    HelpCommand,
    HistoryCommand,
    Text,
    MainMenu,
    CityChoice,
    Calendar,
    ResultCount,
    PhotoCount,
    PageNav,
    EndViewing,
    UnknownCallback,
    CitiesFound,
    CityLookupFailed,
    SearchCompleted,
    SearchFailed,
    HistoryLoaded,
    HistoryFailed,
}

// ============================================================================
// Commands
// ============================================================================

/// Slash commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    History,
    Search(SearchCommand),
}

impl BotCommand {
    /// Parse `/name`, `/name@BotName` and `/name trailing words`
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "history" => Some(BotCommand::History),
            other => SearchCommand::from_name(other).map(BotCommand::Search),
        }
    }
}

// ============================================================================
// Callback Payloads
// ============================================================================

/// Carousel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Next,
    Previous,
}

/// Decoded button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    MainMenu,
    City { id: String },
    Calendar(CalendarPayload),
    ResultCount(u8),
    PhotoCount(u8),
    Page(PageAction),
    EndViewing,
    /// Anything we did not render (or no longer understand)
    Unknown(String),
}

const MAIN_MENU: &str = "main_menu";
const END_VIEWING: &str = "end_viewing";
const CITY_PREFIX: &str = "city:";
const RESULT_COUNT_PREFIX: &str = "hotels:";
const PHOTO_COUNT_PREFIX: &str = "photos:";
const PAGE_NEXT: &str = "page:next";
const PAGE_PREVIOUS: &str = "page:prev";

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::MainMenu => MAIN_MENU.to_string(),
            CallbackAction::City { id } => format!("{CITY_PREFIX}{id}"),
            CallbackAction::Calendar(payload) => payload.encode(),
            CallbackAction::ResultCount(n) => format!("{RESULT_COUNT_PREFIX}{n}"),
            CallbackAction::PhotoCount(n) => format!("{PHOTO_COUNT_PREFIX}{n}"),
            CallbackAction::Page(PageAction::Next) => PAGE_NEXT.to_string(),
            CallbackAction::Page(PageAction::Previous) => PAGE_PREVIOUS.to_string(),
            CallbackAction::EndViewing => END_VIEWING.to_string(),
            CallbackAction::Unknown(raw) => raw.clone(),
        }
    }

    pub fn parse(payload: &str) -> Self {
        let unknown = || CallbackAction::Unknown(payload.to_string());
        match payload {
            MAIN_MENU => return CallbackAction::MainMenu,
            END_VIEWING => return CallbackAction::EndViewing,
            PAGE_NEXT => return CallbackAction::Page(PageAction::Next),
            PAGE_PREVIOUS => return CallbackAction::Page(PageAction::Previous),
            _ => {}
        }

        if let Some(id) = payload.strip_prefix(CITY_PREFIX) {
            if id.is_empty() {
                return unknown();
            }
            return CallbackAction::City { id: id.to_string() };
        }
        if let Some(n) = payload.strip_prefix(RESULT_COUNT_PREFIX) {
            return n.parse().map_or_else(|_| unknown(), CallbackAction::ResultCount);
        }
        if let Some(n) = payload.strip_prefix(PHOTO_COUNT_PREFIX) {
            return n.parse().map_or_else(|_| unknown(), CallbackAction::PhotoCount);
        }
        if let Some(calendar) = CalendarPayload::parse(payload) {
            return CallbackAction::Calendar(calendar);
        }
        unknown()
    }
}
