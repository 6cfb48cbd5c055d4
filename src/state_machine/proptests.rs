//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::calendar::{CalendarAction, CalendarInstance, CalendarPayload};
use super::transition::{parse_distance, parse_price};
use super::*;
use crate::provider::HotelResult;
use chrono::{Days, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_env() -> WizardEnv {
    WizardEnv::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
    )
}

fn hotel(i: usize) -> HotelResult {
    HotelResult {
        id: i.to_string(),
        name: format!("Hotel {i}"),
        price_per_night: 50.0,
        total_price: 100.0,
        distance_km: Some(1.0),
        rating: 7.5,
        review_count: 3,
        photos: vec![format!("https://img/{i}.jpg")],
        link: None,
    }
}

fn paging_context(len: usize, index: usize) -> SessionContext {
    let mut ctx = SessionContext::start(UserId(9), SearchCommand::LowPrice);
    ctx.state = WizardState::Paging;
    ctx.results = (0..len).map(hotel).collect();
    ctx.page_index = index;
    ctx
}

fn nav(action: PageAction) -> Event {
    Event::Callback {
        action: CallbackAction::Page(action),
        message_id: MessageId(1),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_page_action() -> impl Strategy<Value = PageAction> {
    prop_oneof![Just(PageAction::Next), Just(PageAction::Previous)]
}

fn arb_state() -> impl Strategy<Value = WizardState> {
    proptest::sample::select(WizardState::ALL.to_vec())
}

fn arb_command() -> impl Strategy<Value = SearchCommand> {
    proptest::sample::select(SearchCommand::ALL.to_vec())
}

/// Session in an arbitrary state with some fields filled in
fn arb_context() -> impl Strategy<Value = SessionContext> {
    (
        arb_state(),
        arb_command(),
        proptest::option::of("[A-Za-z ]{1,12}"),
        proptest::option::of(1u8..=15),
        0usize..6,
    )
        .prop_map(|(state, command, query, count, results)| {
            let mut ctx = SessionContext::start(UserId(3), command);
            ctx.state = state;
            ctx.destination_query = query;
            ctx.result_count = count;
            ctx.results = (0..results).map(hotel).collect();
            ctx
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// The carousel cursor never leaves the result list
    #[test]
    fn page_index_stays_in_bounds(
        len in 1usize..20,
        start in 0usize..20,
        actions in proptest::collection::vec(arb_page_action(), 0..40),
    ) {
        let env = test_env();
        let mut ctx = paging_context(len, start % len);
        for action in actions {
            let result = transition(&ctx, &env, nav(action)).unwrap();
            ctx = result.new_context;
            prop_assert_eq!(ctx.state, WizardState::Paging);
            prop_assert!(ctx.page_index < ctx.results.len());
        }
    }

    /// Previous then Next (or the reverse) from an interior page returns to
    /// the same page and renders the same item
    #[test]
    fn opposite_moves_cancel(
        len in 3usize..20,
        offset in 0usize..18,
        first in arb_page_action(),
    ) {
        let env = test_env();
        let index = 1 + offset % (len - 2);
        let ctx = paging_context(len, index);
        let second = match first {
            PageAction::Next => PageAction::Previous,
            PageAction::Previous => PageAction::Next,
        };

        let there = transition(&ctx, &env, nav(first)).unwrap();
        let back = transition(&there.new_context, &env, nav(second)).unwrap();
        prop_assert_eq!(back.new_context.page_index, index);

        let rendered = pagination::render_page(&ctx.results, index).unwrap();
        prop_assert!(back.effects.contains(&Effect::send_with_keyboard(
            rendered.text,
            rendered.keyboard,
        )));
    }

    /// Main menu always tears the session down to a cleared idle context
    #[test]
    fn main_menu_resets_from_any_state(ctx in arb_context()) {
        let event = Event::Callback {
            action: CallbackAction::MainMenu,
            message_id: MessageId(5),
        };
        let result = transition(&ctx, &test_env(), event).unwrap();
        prop_assert_eq!(result.new_context, SessionContext::new(ctx.user_id));
    }

    /// Presses we never rendered are reported back, never applied
    #[test]
    fn unknown_payloads_are_unhandled(ctx in arb_context(), payload in "zz[a-z0-9:]{0,12}") {
        let event = Event::callback(&payload, MessageId(7));
        let err = transition(&ctx, &test_env(), event).unwrap_err();
        prop_assert_eq!(
            err,
            TransitionError::Unhandled { state: ctx.state, kind: EventKind::UnknownCallback }
        );
    }

    /// Check-out is only ever accepted strictly after check-in
    #[test]
    fn check_out_follows_check_in(in_offset in 0u64..400, out_offset in 0u64..400) {
        let env = test_env();
        let check_in = env.today.checked_add_days(Days::new(in_offset)).unwrap();
        let check_out = env.today.checked_add_days(Days::new(out_offset)).unwrap();

        let mut ctx = SessionContext::start(UserId(1), SearchCommand::HighPrice);
        ctx.state = WizardState::AwaitingCheckOut;
        ctx.check_in = Some(check_in);

        let event = Event::Callback {
            action: CallbackAction::Calendar(CalendarPayload {
                instance: CalendarInstance::CheckOut,
                action: CalendarAction::Pick(check_out),
            }),
            message_id: MessageId(2),
        };
        let next = transition(&ctx, &env, event).unwrap().new_context;
        if check_out > check_in {
            prop_assert_eq!(next.state, WizardState::AwaitingResultCount);
            prop_assert_eq!(next.check_out, Some(check_out));
        } else {
            prop_assert_eq!(next, ctx);
        }
    }

    /// Any accepted distance is positive and finite
    #[test]
    fn distance_parser_accepts_only_positive(text in "\\PC{0,12}") {
        if let Some(km) = parse_distance(&text) {
            prop_assert!(km.is_finite() && km > 0.0);
        }
    }

    #[test]
    fn distance_accepts_decimal_comma(whole in 0u32..500, frac in 1u32..10) {
        let dotted = parse_distance(&format!("{whole}.{frac}"));
        let comma = parse_distance(&format!("{whole},{frac}"));
        prop_assert!(dotted.is_some());
        prop_assert_eq!(dotted, comma);
    }

    /// Prices are positive whole numbers written with digits only
    #[test]
    fn price_parser_round_trips(price in 1u32..1_000_000) {
        prop_assert_eq!(parse_price(&price.to_string()), Some(price));
        prop_assert_eq!(parse_price(&format!("-{price}")), None);
        prop_assert_eq!(parse_price(&format!("{price}.5")), None);
    }

    /// Bad numeric input keeps the wizard where it was
    #[test]
    fn invalid_price_keeps_context(text in "[a-z .,-]{0,8}") {
        let mut ctx = SessionContext::start(UserId(1), SearchCommand::BestDeal);
        ctx.state = WizardState::AwaitingPriceMin;
        let event = Event::Text { text, message_id: MessageId(4) };
        let result = transition(&ctx, &test_env(), event).unwrap();
        prop_assert_eq!(result.new_context, ctx);
    }
}
