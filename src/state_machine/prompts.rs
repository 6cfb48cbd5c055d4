//! User-facing message texts
//!
//! All texts are Telegram HTML. Anything that came from the user or the
//! provider must pass through [`escape_html`] before it is interpolated.

use super::state::SearchCommand;
use crate::db::SearchRecord;
use std::fmt::Write as _;

pub const MAIN_MENU_BUTTON: &str = "🏠 Main menu";
pub const END_VIEWING_BUTTON: &str = "⛔️ End viewing ⛔️";

pub const CITY_PROMPT: &str = "🏙 Enter the name of the city.";
pub const CITY_EMPTY_HINT: &str = "⚠️ The city name cannot be empty. Enter the name of the city.";
pub const CITY_CHOICE_PROMPT: &str = "Choose the city from the list:";
pub const CITY_CHOICE_HINT: &str = "☝️ Choose the city from the list above.";
pub const CITY_NOT_FOUND: &str =
    "‼️ The city you entered was not found ‼️\nPlease enter a different name.";

pub const RESULT_COUNT_PROMPT: &str = "How many hotels should I look for?";
pub const PHOTO_COUNT_PROMPT: &str = "How many photos of each hotel do you need?";
pub const BUTTONS_ONLY_HINT: &str = "☝️ Please use the buttons above.";

pub const DISTANCE_PROMPT: &str =
    "Enter the maximum distance from the city center to the hotel, km (for example, 1.5)";
pub const DISTANCE_HINT: &str =
    "⚠️ The distance must be a positive number, for example 1.5 or 1,5.\nTry again.";
pub const PRICE_MIN_PROMPT: &str = "Enter the minimum price per night in $ (for example, 10)";
pub const PRICE_MAX_PROMPT: &str = "Enter the maximum price per night in $ (for example, 500)";
pub const PRICE_HINT: &str = "⚠️ The price must be a positive whole number.\nTry again.";

pub const SEARCHING: &str = "🔎 Searching for hotels…";
pub const NO_RESULTS: &str =
    "‼️ Sorry, no hotels were found for these parameters ‼️\nTry a different search.";
pub const INCOMPLETE_SEARCH: &str =
    "‼️ Sorry, something went wrong while collecting the search parameters ‼️";
pub const STALE_SESSION: &str =
    "‼️ First press ⛔️ End viewing ⛔️, then choose an action from the menu.";
pub const VIEWING_FINISHED: &str = "Viewing finished. Choose your next action.";

pub const HISTORY_BUSY: &str =
    "A search is in progress. Finish it or return to the main menu to see your history.";
pub const HISTORY_EMPTY: &str = "You have not searched for anything yet.";
pub const HISTORY_FAILED: &str = "‼️ Sorry, your search history is unavailable right now ‼️";

/// Command overview shown whenever the wizard returns to the menu
pub fn menu_text() -> String {
    let mut text = String::from("Choose an action:\n");
    for command in SearchCommand::ALL {
        let _ = writeln!(text, "{command} - {}", command.description());
    }
    text.push_str("/history - your recent searches\n/help - this list");
    text
}

pub fn welcome_text() -> String {
    format!(
        "👋 Hello! I find hotels on hotels.com by price or by distance from the city center.\n\n{}",
        menu_text()
    )
}

pub fn idle_guidance() -> String {
    format!("I did not understand that.\n{}", menu_text())
}

pub fn viewing_finished() -> String {
    format!("{VIEWING_FINISHED}\n{}", menu_text())
}

// Echo lines replacing deleted inputs and keyboards

pub fn city_echo(name: &str) -> String {
    format!("🏙 {}", escape_html(name))
}

pub fn date_echo(label: &str, date: chrono::NaiveDate) -> String {
    format!("📅 {label}: {}", date.format("%d.%m.%Y"))
}

pub fn result_count_echo(count: u8) -> String {
    format!("Hotels to find: {count}")
}

pub fn distance_echo(km: f64) -> String {
    format!("Max distance from the center: {km} km")
}

pub fn price_min_echo(price: u32) -> String {
    format!("Min price per night: ${price}")
}

pub fn price_max_echo(price: u32) -> String {
    format!("Max price per night: ${price}")
}

pub fn photo_count_echo(count: u8) -> String {
    format!("Photos per hotel: {count}")
}

/// Telegram rejects longer messages
const MESSAGE_MAX_CHARS: usize = 4096;
const HISTORY_HOTELS_SHOWN: usize = 5;
const HISTORY_NAME_MAX_CHARS: usize = 80;
const HISTORY_CUT: &str = "\n…older searches omitted: ";

/// Recent searches, newest first
pub fn history_text(records: &[SearchRecord]) -> String {
    if records.is_empty() {
        return HISTORY_EMPTY.to_string();
    }

    let mut text = String::from("<b>Your recent searches</b>\n");
    let mut length = text.chars().count();
    for (shown, record) in records.iter().enumerate() {
        let block = history_entry(record);
        let block_length = block.chars().count();
        // Leave room for the omission note and its count
        if length + block_length + HISTORY_CUT.chars().count() + 20 > MESSAGE_MAX_CHARS {
            let _ = write!(text, "{HISTORY_CUT}{}", records.len() - shown);
            break;
        }
        length += block_length;
        text.push_str(&block);
    }
    text
}

fn history_entry(record: &SearchRecord) -> String {
    let mut block = String::new();
    let _ = write!(
        block,
        "\n🕓 {} {} <b>{}</b>",
        record.created_at.format("%d.%m.%Y %H:%M"),
        record.command,
        escape_html(&clip(&record.destination)),
    );
    if record.results.is_empty() {
        block.push_str("\n    nothing found");
    }
    for hotel in record.results.iter().take(HISTORY_HOTELS_SHOWN) {
        let _ = write!(block, "\n    • {}", escape_html(&clip(&hotel.name)));
    }
    let hidden = record.results.len().saturating_sub(HISTORY_HOTELS_SHOWN);
    if hidden > 0 {
        let _ = write!(block, "\n    and {hidden} more");
    }
    block.push('\n');
    block
}

fn clip(raw: &str) -> String {
    if raw.chars().count() <= HISTORY_NAME_MAX_CHARS {
        return raw.to_string();
    }
    let mut clipped: String = raw.chars().take(HISTORY_NAME_MAX_CHARS - 1).collect();
    clipped.push('…');
    clipped
}

/// Escape the three characters Telegram HTML treats specially
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
