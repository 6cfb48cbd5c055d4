//! Results carousel
//!
//! One page per hotel: a media block followed by a detail message that
//! carries the navigation keyboard. Moving on edits the previous detail
//! message into a one-line marker, because sent photos cannot be retracted.

use super::effect::{Button, Keyboard, MediaBlock};
use super::event::{CallbackAction, PageAction};
use super::prompts::{escape_html, END_VIEWING_BUTTON};
use crate::provider::HotelResult;
use std::fmt::Write as _;

/// Both halves of a rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub media: MediaBlock,
    pub text: String,
    pub keyboard: Keyboard,
}

/// Render the page at `index`, or `None` if the index is out of range
pub fn render_page(results: &[HotelResult], index: usize) -> Option<RenderedPage> {
    let hotel = results.get(index)?;
    let media = if hotel.photos.is_empty() {
        MediaBlock::Placeholder
    } else {
        MediaBlock::Photos(hotel.photos.clone())
    };

    Some(RenderedPage {
        media,
        text: detail_text(hotel),
        keyboard: navigation(hotel, index, results.len()),
    })
}

/// New cursor after a navigation press; clamped to the result list
pub fn step(index: usize, len: usize, action: PageAction) -> usize {
    let last = len.saturating_sub(1);
    match action {
        PageAction::Next => index.saturating_add(1).min(last),
        PageAction::Previous => index.saturating_sub(1).min(last),
    }
}

pub fn detail_text(hotel: &HotelResult) -> String {
    let mut text = format!(
        "<b>Hotel:</b> {}\n<b>Price per night:</b> {}\n<b>Total price:</b> {}",
        escape_html(&hotel.name),
        format_usd(hotel.price_per_night),
        format_usd(hotel.total_price),
    );
    if let Some(km) = hotel.distance_km {
        let _ = write!(text, "\n<b>Distance from the center:</b> {km:.1} km");
    }
    let _ = write!(
        text,
        "\n<b>Rating:</b> {:.1}/10\n<b>Reviews:</b> {}",
        hotel.rating, hotel.review_count
    );
    text
}

/// Compact stand-in for a page the user has moved past
pub fn viewed_marker(hotel: &HotelResult) -> String {
    format!(
        "⬆️ {} ({} per night) ⬆️",
        escape_html(&hotel.name),
        format_usd(hotel.price_per_night)
    )
}

pub fn hotel_link(hotel: &HotelResult) -> String {
    hotel
        .link
        .clone()
        .unwrap_or_else(|| format!("https://www.hotels.com/h{}.Hotel-Information", hotel.id))
}

fn navigation(hotel: &HotelResult, index: usize, len: usize) -> Keyboard {
    let mut row = Vec::with_capacity(3);
    if index > 0 {
        row.push(Button::callback(
            "⬅️",
            &CallbackAction::Page(PageAction::Previous),
        ));
    }
    row.push(Button::url(
        format!("Hotel {} of {len}", index + 1),
        hotel_link(hotel),
    ));
    if index + 1 < len {
        row.push(Button::callback("➡️", &CallbackAction::Page(PageAction::Next)));
    }

    Keyboard::new().row(row).row(vec![Button::callback(
        END_VIEWING_BUTTON,
        &CallbackAction::EndViewing,
    )])
}

fn format_usd(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("${amount:.0}")
    } else {
        format!("${amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel(id: &str, photos: usize) -> HotelResult {
        HotelResult {
            id: id.to_string(),
            name: format!("Hotel {id}"),
            price_per_night: 99.5,
            total_price: 199.0,
            distance_km: Some(1.25),
            rating: 8.4,
            review_count: 120,
            photos: (0..photos).map(|i| format!("https://img/{id}/{i}.jpg")).collect(),
            link: None,
        }
    }

    #[test]
    fn test_first_page_has_no_previous() {
        let results = vec![hotel("1", 2), hotel("2", 0)];
        let page = render_page(&results, 0).unwrap();
        assert!(!page.keyboard.has_action(&CallbackAction::Page(PageAction::Previous)));
        assert!(page.keyboard.has_action(&CallbackAction::Page(PageAction::Next)));
        assert!(page.keyboard.has_action(&CallbackAction::EndViewing));
        assert_eq!(page.media, MediaBlock::Photos(results[0].photos.clone()));
    }

    #[test]
    fn test_last_page_has_no_next_and_placeholder_media() {
        let results = vec![hotel("1", 2), hotel("2", 0)];
        let page = render_page(&results, 1).unwrap();
        assert!(page.keyboard.has_action(&CallbackAction::Page(PageAction::Previous)));
        assert!(!page.keyboard.has_action(&CallbackAction::Page(PageAction::Next)));
        assert_eq!(page.media, MediaBlock::Placeholder);

        let label = page
            .keyboard
            .buttons()
            .find(|b| b.payload().is_none())
            .unwrap();
        assert_eq!(label.text, "Hotel 2 of 2");
        assert_eq!(
            label.target,
            super::super::effect::ButtonTarget::Url(
                "https://www.hotels.com/h2.Hotel-Information".to_string()
            )
        );
    }

    #[test]
    fn test_out_of_range_page_is_none() {
        assert!(render_page(&[hotel("1", 0)], 1).is_none());
        assert!(render_page(&[], 0).is_none());
    }

    #[test]
    fn test_step_clamps() {
        assert_eq!(step(0, 4, PageAction::Previous), 0);
        assert_eq!(step(3, 4, PageAction::Next), 3);
        assert_eq!(step(1, 4, PageAction::Next), 2);
        assert_eq!(step(2, 4, PageAction::Previous), 1);
    }

    #[test]
    fn test_detail_text() {
        let mut h = hotel("7", 0);
        let text = detail_text(&h);
        assert!(text.contains("<b>Price per night:</b> $99.50"));
        assert!(text.contains("<b>Total price:</b> $199"));
        assert!(text.contains("1.2 km") || text.contains("1.3 km"));
        assert!(text.contains("8.4/10"));

        h.distance_km = None;
        assert!(!detail_text(&h).contains("Distance"));
        assert_eq!(viewed_marker(&h), "⬆️ Hotel 7 ($99.50 per night) ⬆️");
    }
}
