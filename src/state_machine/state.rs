//! Wizard session types

use crate::provider::{HotelResult, PriceRange, SearchCriteria, SortOrder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identities
// ============================================================================

/// Chat user identity, the key into the session store
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat the user talks to us from (equal to the user id in private chats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned id of a message within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

// ============================================================================
// Search command
// ============================================================================

/// The three search modes a wizard can be started with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCommand {
    LowPrice,
    HighPrice,
    BestDeal,
}

impl SearchCommand {
    pub const ALL: [SearchCommand; 3] = [
        SearchCommand::LowPrice,
        SearchCommand::HighPrice,
        SearchCommand::BestDeal,
    ];

    /// Command name without the leading slash
    pub fn name(self) -> &'static str {
        match self {
            SearchCommand::LowPrice => "low_price",
            SearchCommand::HighPrice => "high_price",
            SearchCommand::BestDeal => "best_deal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            SearchCommand::LowPrice => "cheapest hotels in a city",
            SearchCommand::HighPrice => "most expensive hotels in a city",
            SearchCommand::BestDeal => "best price within a distance from the center",
        }
    }

    pub fn sort_order(self) -> SortOrder {
        match self {
            SearchCommand::LowPrice => SortOrder::PriceAscending,
            SearchCommand::HighPrice => SortOrder::PriceDescending,
            SearchCommand::BestDeal => SortOrder::DistanceFromCenter,
        }
    }
}

impl fmt::Display for SearchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

// ============================================================================
// Wizard State
// ============================================================================

/// Stage of the search wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    /// No search in progress
    #[default]
    Idle,
    AwaitingCity,
    AwaitingCityChoice,
    AwaitingCheckIn,
    AwaitingCheckOut,
    AwaitingResultCount,
    /// Only visited by `best_deal`
    AwaitingMaxDistance,
    AwaitingPriceMin,
    AwaitingPriceMax,
    AwaitingPhotoCount,
    /// Provider query in flight
    Querying,
    /// Results carousel
    Paging,
}

impl WizardState {
    pub const ALL: [WizardState; 12] = [
        WizardState::Idle,
        WizardState::AwaitingCity,
        WizardState::AwaitingCityChoice,
        WizardState::AwaitingCheckIn,
        WizardState::AwaitingCheckOut,
        WizardState::AwaitingResultCount,
        WizardState::AwaitingMaxDistance,
        WizardState::AwaitingPriceMin,
        WizardState::AwaitingPriceMax,
        WizardState::AwaitingPhotoCount,
        WizardState::Querying,
        WizardState::Paging,
    ];

    pub fn is_idle(self) -> bool {
        matches!(self, WizardState::Idle)
    }

    /// States whose only valid input is a button press
    pub fn expects_buttons(self) -> bool {
        matches!(
            self,
            WizardState::AwaitingCityChoice
                | WizardState::AwaitingCheckIn
                | WizardState::AwaitingCheckOut
                | WizardState::AwaitingResultCount
                | WizardState::AwaitingPhotoCount
        )
    }
}

// ============================================================================
// Session Context
// ============================================================================

/// One entry of a rendered city choice list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityMatch {
    pub id: String,
    pub name: String,
}

impl CityMatch {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Everything one user's wizard has collected so far
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionContext {
    pub user_id: UserId,
    pub state: WizardState,
    pub command: Option<SearchCommand>,
    pub destination_query: Option<String>,
    pub destination_id: Option<String>,
    pub destination_name: Option<String>,
    /// Choice list most recently shown to the user
    pub city_choices: Vec<CityMatch>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub result_count: Option<u8>,
    pub max_distance_km: Option<f64>,
    pub price_min: Option<u32>,
    pub price_max: Option<u32>,
    pub photo_count: Option<u8>,
    pub results: Vec<HotelResult>,
    pub page_index: usize,
}

impl SessionContext {
    /// A fresh, idle context
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// A fresh context that starts a search wizard
    pub fn start(user_id: UserId, command: SearchCommand) -> Self {
        Self {
            user_id,
            state: WizardState::AwaitingCity,
            command: Some(command),
            ..Self::default()
        }
    }

    /// Same user, everything else discarded
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self::new(self.user_id)
    }

    #[must_use]
    pub fn with_state(mut self, state: WizardState) -> Self {
        self.state = state;
        self
    }

    /// Assemble the provider query from the collected fields.
    ///
    /// Returns `None` if any field the query needs is missing.
    pub fn search_criteria(&self) -> Option<SearchCriteria> {
        let command = self.command?;
        let price_range = match (self.price_min, self.price_max) {
            (Some(min), Some(max)) => Some(PriceRange { min, max }),
            _ => None,
        };
        Some(SearchCriteria {
            destination_id: self.destination_id.clone()?,
            check_in: self.check_in?,
            check_out: self.check_out?,
            result_count: self.result_count?,
            photo_count: self.photo_count?,
            sort: command.sort_order(),
            price_range,
            max_distance_km: self.max_distance_km,
        })
    }

    /// The result currently shown by the carousel, if the cursor is valid
    pub fn current_result(&self) -> Option<&HotelResult> {
        if self.state == WizardState::Paging {
            self.results.get(self.page_index)
        } else {
            None
        }
    }
}

// ============================================================================
// Wizard Environment
// ============================================================================

/// Result counts offered when no configuration overrides them
pub const DEFAULT_RESULT_COUNTS: [u8; 5] = [1, 3, 5, 10, 15];

/// Photo counts offered when no configuration overrides them
pub const DEFAULT_PHOTO_COUNTS: [u8; 5] = [1, 2, 3, 5, 10];

/// Immutable inputs for a single transition
#[derive(Debug, Clone)]
pub struct WizardEnv {
    /// Earliest selectable check-in date
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
    pub result_counts: Vec<u8>,
    pub photo_counts: Vec<u8>,
    pub history_limit: usize,
}

impl WizardEnv {
    pub fn new(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            today,
            now,
            result_counts: DEFAULT_RESULT_COUNTS.to_vec(),
            photo_counts: DEFAULT_PHOTO_COUNTS.to_vec(),
            history_limit: 5,
        }
    }

    #[must_use]
    pub fn with_counts(mut self, result_counts: Vec<u8>, photo_counts: Vec<u8>) -> Self {
        self.result_counts = result_counts;
        self.photo_counts = photo_counts;
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
