//! Effects produced by state transitions

use super::event::CallbackAction;
use super::state::MessageId;
use crate::db::SearchRecord;
use crate::provider::SearchCriteria;

/// Effects to be executed after a state transition.
///
/// Message text is HTML; anything user-supplied has been escaped already.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a new message to the user's chat
    SendText {
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Replace the text (and keyboard) of a message we sent earlier
    EditText {
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Remove a message from the chat
    DeleteMessage { message_id: MessageId },

    /// Send a hotel's photos
    SendMedia { media: MediaBlock },

    /// Resolve free text into candidate cities
    LookupCity { query: String },

    /// Run the hotel query
    SearchHotels { criteria: SearchCriteria },

    /// Append a completed search to the audit log (fire-and-forget)
    RecordSearch { record: SearchRecord },

    /// Read the user's recent searches from the audit log
    LoadHistory { limit: usize },
}

impl Effect {
    pub fn send(text: impl Into<String>) -> Self {
        Effect::SendText {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn send_with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::SendText {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn edit(message_id: MessageId, text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Effect::EditText {
            message_id,
            text: text.into(),
            keyboard,
        }
    }

    pub fn delete(message_id: MessageId) -> Self {
        Effect::DeleteMessage { message_id }
    }
}

/// The media half of a rendered carousel page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBlock {
    Photos(Vec<String>),
    /// Stand-in image for hotels without photos
    Placeholder,
}

// ============================================================================
// Keyboards
// ============================================================================

/// What pressing a button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    /// Payload echoed back in a callback event
    Callback(String),
    /// Link opened by the client
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub target: ButtonTarget,
}

impl Button {
    pub fn callback(text: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            text: text.into(),
            target: ButtonTarget::Callback(action.encode()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: ButtonTarget::Url(url.into()),
        }
    }

    /// Payload this button sends back, if it is a callback button
    pub fn payload(&self) -> Option<&str> {
        match &self.target {
            ButtonTarget::Callback(payload) => Some(payload),
            ButtonTarget::Url(_) => None,
        }
    }
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// One button per row
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    /// Append the "return to main menu" row
    #[must_use]
    pub fn with_main_menu(self) -> Self {
        self.row(vec![Button::callback(
            super::prompts::MAIN_MENU_BUTTON,
            &CallbackAction::MainMenu,
        )])
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    /// Whether any button sends the given action
    #[allow(dead_code)] // Used in tests
    pub fn has_action(&self, action: &CallbackAction) -> bool {
        let payload = action.encode();
        self.buttons().any(|b| b.payload() == Some(payload.as_str()))
    }
}
