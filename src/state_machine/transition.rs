//! Pure state transition function
//!
//! Dispatch is an explicit table keyed by (state matcher, event kind). The
//! first matching row wins; an event with no row is reported back as
//! [`TransitionError::Unhandled`] and leaves the session untouched.

use super::calendar::{CalendarOutcome, CalendarPayload, CalendarPicker, CalendarView};
use super::effect::{Button, Effect, Keyboard};
use super::event::{BotCommand, CallbackAction, Event, EventKind};
use super::pagination;
use super::prompts;
use super::state::{CityMatch, MessageId, SearchCommand, SessionContext, WizardEnv, WizardState};
use crate::db::SearchRecord;
use crate::provider::HotelResult;
use thiserror::Error;

use WizardState as S;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_context: SessionContext,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(context: SessionContext) -> Self {
        Self {
            new_context: context,
            effects: vec![],
        }
    }

    /// Keep the current context as is
    pub fn stay(context: &SessionContext) -> Self {
        Self::new(context.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("{kind:?} is not handled in state {state:?}")]
    Unhandled { state: WizardState, kind: EventKind },
    #[error("Rejected in state {state:?}: {reason}")]
    Rejected { state: WizardState, reason: String },
}

impl TransitionError {
    fn rejected(state: WizardState, reason: impl Into<String>) -> Self {
        TransitionError::Rejected {
            state,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Transition Table
// ============================================================================

/// Which session states a table row applies to
#[derive(Debug, Clone, Copy)]
enum On {
    Any,
    /// Every state except `Idle`
    Active,
    /// States that only accept a button press
    Buttons,
    Only(WizardState),
}

impl On {
    fn matches(self, state: WizardState) -> bool {
        match self {
            On::Any => true,
            On::Active => !state.is_idle(),
            On::Buttons => state.expects_buttons(),
            On::Only(s) => s == state,
        }
    }
}

type Handler = fn(&SessionContext, &WizardEnv, Event) -> Result<TransitionResult, TransitionError>;

#[rustfmt::skip]
const TRANSITIONS: &[(On, EventKind, Handler)] = &[
    // The carousel has to be closed explicitly before anything else
    (On::Only(S::Paging), EventKind::SearchCommand, stale_session),
    (On::Only(S::Paging), EventKind::StartCommand, stale_session),
    (On::Only(S::Paging), EventKind::HelpCommand, stale_session),
    (On::Only(S::Paging), EventKind::HistoryCommand, stale_session),
    (On::Only(S::Paging), EventKind::Text, stale_session),

    // Global
    (On::Any, EventKind::EndViewing, end_viewing),
    (On::Any, EventKind::MainMenu, main_menu),
    (On::Any, EventKind::SearchCommand, start_search),
    (On::Any, EventKind::StartCommand, welcome),
    (On::Any, EventKind::HelpCommand, help),
    (On::Only(S::Idle), EventKind::HistoryCommand, load_history),
    (On::Active, EventKind::HistoryCommand, history_busy),
    (On::Any, EventKind::HistoryLoaded, history_loaded),
    (On::Any, EventKind::HistoryFailed, history_failed),
    (On::Only(S::Idle), EventKind::Text, idle_text),

    // Wizard
    (On::Only(S::AwaitingCity), EventKind::Text, city_text),
    (On::Only(S::AwaitingCity), EventKind::CitiesFound, cities_found),
    (On::Only(S::AwaitingCity), EventKind::CityLookupFailed, cities_found),
    (On::Only(S::AwaitingCityChoice), EventKind::CityChoice, city_chosen),
    (On::Only(S::AwaitingCheckIn), EventKind::Calendar, check_in_calendar),
    (On::Only(S::AwaitingCheckOut), EventKind::Calendar, check_out_calendar),
    (On::Only(S::AwaitingResultCount), EventKind::ResultCount, result_count_chosen),
    (On::Only(S::AwaitingMaxDistance), EventKind::Text, max_distance_text),
    (On::Only(S::AwaitingPriceMin), EventKind::Text, price_min_text),
    (On::Only(S::AwaitingPriceMax), EventKind::Text, price_max_text),
    (On::Only(S::AwaitingPhotoCount), EventKind::PhotoCount, photo_count_chosen),
    (On::Buttons, EventKind::Text, buttons_only),

    // Query and carousel
    (On::Only(S::Querying), EventKind::SearchCompleted, search_completed),
    (On::Only(S::Querying), EventKind::SearchFailed, search_completed),
    (On::Only(S::Paging), EventKind::PageNav, page_nav),
    (On::Only(S::Idle), EventKind::PageNav, stale_session),
];

/// Pure transition function
///
/// Given the same context, environment and event it always produces the
/// same result. Time and configuration come from `env`.
pub fn transition(
    context: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let kind = event.kind();
    let state = context.state;
    let (_, _, handler) = TRANSITIONS
        .iter()
        .find(|(on, row_kind, _)| *row_kind == kind && on.matches(state))
        .ok_or(TransitionError::Unhandled { state, kind })?;
    handler(context, env, event)
}

// ============================================================================
// Global Handlers
// ============================================================================

fn stale_session(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(stale(ctx))
}

fn end_viewing(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::new(ctx.cleared()).with_effect(Effect::send(prompts::viewing_finished())))
}

fn main_menu(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::new(ctx.cleared()).with_effect(Effect::send(prompts::menu_text())))
}

fn start_search(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Command(BotCommand::Search(command)) = event else {
        return Err(unexpected(ctx, &event));
    };
    Ok(
        TransitionResult::new(SessionContext::start(ctx.user_id, command)).with_effect(
            Effect::send_with_keyboard(prompts::CITY_PROMPT, Keyboard::new().with_main_menu()),
        ),
    )
}

fn welcome(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::new(ctx.cleared()).with_effect(Effect::send(prompts::welcome_text())))
}

fn help(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::menu_text())))
}

fn load_history(
    ctx: &SessionContext,
    env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::stay(ctx).with_effect(Effect::LoadHistory {
        limit: env.history_limit,
    }))
}

fn history_busy(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::HISTORY_BUSY)))
}

fn history_loaded(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::HistoryLoaded { records } = event else {
        return Err(unexpected(ctx, &event));
    };
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::history_text(&records))))
}

fn history_failed(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::HISTORY_FAILED)))
}

fn idle_text(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::idle_guidance())))
}

fn buttons_only(
    ctx: &SessionContext,
    _env: &WizardEnv,
    _event: Event,
) -> Result<TransitionResult, TransitionError> {
    let hint = if ctx.state == WizardState::AwaitingCityChoice {
        prompts::CITY_CHOICE_HINT
    } else {
        prompts::BUTTONS_ONLY_HINT
    };
    Ok(TransitionResult::stay(ctx).with_effect(Effect::send(hint)))
}

// ============================================================================
// Destination
// ============================================================================

fn city_text(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Text { text, message_id } = event else {
        return Err(unexpected(ctx, &event));
    };
    let query = text.trim();
    if query.is_empty() {
        return Ok(TransitionResult::stay(ctx).with_effect(Effect::send_with_keyboard(
            prompts::CITY_EMPTY_HINT,
            Keyboard::new().with_main_menu(),
        )));
    }

    let mut next = ctx.clone();
    next.destination_query = Some(query.to_string());
    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::LookupCity {
            query: query.to_string(),
        },
    ]))
}

/// Handles both a lookup result and a failed lookup (as zero matches)
fn cities_found(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let matches = match event {
        Event::CitiesFound { matches } => matches,
        Event::CityLookupFailed { .. } => vec![],
        other => return Err(unexpected(ctx, &other)),
    };

    if matches.is_empty() {
        return Ok(TransitionResult::stay(ctx).with_effect(Effect::send_with_keyboard(
            prompts::CITY_NOT_FOUND,
            Keyboard::new().with_main_menu(),
        )));
    }

    // The typed query is echoed only once it resolved to something
    let echo = ctx
        .destination_query
        .as_deref()
        .map(|query| Effect::send(prompts::city_echo(query)));
    let keyboard = city_keyboard(&matches);
    let mut next = ctx.clone().with_state(WizardState::AwaitingCityChoice);
    next.city_choices = matches;
    Ok(TransitionResult::new(next)
        .with_effects(echo)
        .with_effect(Effect::send_with_keyboard(
            prompts::CITY_CHOICE_PROMPT,
            keyboard,
        )))
}

fn city_chosen(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Callback {
        action: CallbackAction::City { id },
        message_id,
    } = event
    else {
        return Err(unexpected(ctx, &event));
    };
    let Some(city) = ctx.city_choices.iter().find(|c| c.id == id) else {
        return Ok(TransitionResult::stay(ctx).with_effect(Effect::send(prompts::CITY_CHOICE_HINT)));
    };

    let calendar = CalendarPicker::check_in(env.today).start();
    let mut next = ctx.clone().with_state(WizardState::AwaitingCheckIn);
    next.destination_id = Some(city.id.clone());
    next.destination_name = Some(city.name.clone());
    next.check_in = None;
    next.check_out = None;

    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::city_echo(&city.name)),
        calendar_message(calendar),
    ]))
}

fn city_keyboard(matches: &[CityMatch]) -> Keyboard {
    Keyboard::column(matches.iter().map(|city| {
        Button::callback(
            city.name.clone(),
            &CallbackAction::City {
                id: city.id.clone(),
            },
        )
    }))
    .with_main_menu()
}

// ============================================================================
// Dates
// ============================================================================

fn check_in_calendar(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let (payload, message_id) = calendar_press(ctx, event)?;
    let picker = CalendarPicker::check_in(env.today);

    let date = match picker.process(&payload) {
        CalendarOutcome::Resolved(date) => date,
        other => return Ok(redraw_calendar(ctx, other, message_id)),
    };
    let Some(check_out) = CalendarPicker::check_out(date) else {
        return Err(TransitionError::rejected(
            ctx.state,
            format!("no check-out date possible after {date}"),
        ));
    };

    let mut next = ctx.clone().with_state(WizardState::AwaitingCheckOut);
    next.check_in = Some(date);
    next.check_out = None;
    Ok(TransitionResult::new(next).with_effects([
        Effect::edit(message_id, prompts::date_echo("Check-in date", date), None),
        calendar_message(check_out.start()),
    ]))
}

fn check_out_calendar(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let (payload, message_id) = calendar_press(ctx, event)?;
    let Some(picker) = ctx.check_in.and_then(CalendarPicker::check_out) else {
        return Ok(abandon(ctx, prompts::INCOMPLETE_SEARCH));
    };

    let date = match picker.process(&payload) {
        CalendarOutcome::Resolved(date) => date,
        other => return Ok(redraw_calendar(ctx, other, message_id)),
    };

    let mut next = ctx.clone().with_state(WizardState::AwaitingResultCount);
    next.check_out = Some(date);
    Ok(TransitionResult::new(next).with_effects([
        Effect::edit(message_id, prompts::date_echo("Check-out date", date), None),
        Effect::send_with_keyboard(
            prompts::RESULT_COUNT_PROMPT,
            count_keyboard(&env.result_counts, CallbackAction::ResultCount),
        ),
    ]))
}

fn calendar_press(
    ctx: &SessionContext,
    event: Event,
) -> Result<(CalendarPayload, MessageId), TransitionError> {
    match event {
        Event::Callback {
            action: CallbackAction::Calendar(payload),
            message_id,
        } => Ok((payload, message_id)),
        other => Err(unexpected(ctx, &other)),
    }
}

/// Navigation and rejections edit the calendar message in place
fn redraw_calendar(
    ctx: &SessionContext,
    outcome: CalendarOutcome,
    message_id: MessageId,
) -> TransitionResult {
    match outcome {
        CalendarOutcome::Navigate(view) | CalendarOutcome::Rejected(view) => {
            TransitionResult::stay(ctx).with_effect(Effect::edit(
                message_id,
                view.prompt,
                Some(view.keyboard),
            ))
        }
        CalendarOutcome::Resolved(_) | CalendarOutcome::Ignored => TransitionResult::stay(ctx),
    }
}

fn calendar_message(view: CalendarView) -> Effect {
    Effect::send_with_keyboard(view.prompt, view.keyboard)
}

// ============================================================================
// Counts, Distance, Prices
// ============================================================================

fn result_count_chosen(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Callback {
        action: CallbackAction::ResultCount(count),
        message_id,
    } = event
    else {
        return Err(unexpected(ctx, &event));
    };
    if !env.result_counts.contains(&count) {
        return Err(TransitionError::rejected(
            ctx.state,
            format!("result count {count} was not offered"),
        ));
    }

    let mut next = ctx.clone();
    next.result_count = Some(count);
    let prompt = if ctx.command == Some(SearchCommand::BestDeal) {
        next.state = WizardState::AwaitingMaxDistance;
        Effect::send_with_keyboard(prompts::DISTANCE_PROMPT, Keyboard::new().with_main_menu())
    } else {
        next.state = WizardState::AwaitingPhotoCount;
        photo_count_prompt(env)
    };

    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::result_count_echo(count)),
        prompt,
    ]))
}

fn max_distance_text(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Text { text, message_id } = event else {
        return Err(unexpected(ctx, &event));
    };
    let Some(km) = parse_distance(&text) else {
        return Ok(TransitionResult::stay(ctx).with_effect(Effect::send_with_keyboard(
            prompts::DISTANCE_HINT,
            Keyboard::new().with_main_menu(),
        )));
    };

    let mut next = ctx.clone().with_state(WizardState::AwaitingPriceMin);
    next.max_distance_km = Some(km);
    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::distance_echo(km)),
        Effect::send_with_keyboard(prompts::PRICE_MIN_PROMPT, Keyboard::new().with_main_menu()),
    ]))
}

fn price_min_text(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Text { text, message_id } = event else {
        return Err(unexpected(ctx, &event));
    };
    let Some(price) = parse_price(&text) else {
        return Ok(price_hint(ctx));
    };

    let mut next = ctx.clone().with_state(WizardState::AwaitingPriceMax);
    next.price_min = Some(price);
    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::price_min_echo(price)),
        Effect::send_with_keyboard(prompts::PRICE_MAX_PROMPT, Keyboard::new().with_main_menu()),
    ]))
}

/// No ordering check against the minimum; both values go to the provider as entered
fn price_max_text(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Text { text, message_id } = event else {
        return Err(unexpected(ctx, &event));
    };
    let Some(price) = parse_price(&text) else {
        return Ok(price_hint(ctx));
    };

    let mut next = ctx.clone().with_state(WizardState::AwaitingPhotoCount);
    next.price_max = Some(price);
    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::price_max_echo(price)),
        photo_count_prompt(env),
    ]))
}

fn price_hint(ctx: &SessionContext) -> TransitionResult {
    TransitionResult::stay(ctx).with_effect(Effect::send_with_keyboard(
        prompts::PRICE_HINT,
        Keyboard::new().with_main_menu(),
    ))
}

fn photo_count_prompt(env: &WizardEnv) -> Effect {
    Effect::send_with_keyboard(
        prompts::PHOTO_COUNT_PROMPT,
        count_keyboard(&env.photo_counts, CallbackAction::PhotoCount),
    )
}

fn count_keyboard(counts: &[u8], action: fn(u8) -> CallbackAction) -> Keyboard {
    Keyboard::new()
        .row(
            counts
                .iter()
                .map(|n| Button::callback(n.to_string(), &action(*n)))
                .collect(),
        )
        .with_main_menu()
}

/// Positive, finite kilometres; a decimal comma is accepted
pub fn parse_distance(text: &str) -> Option<f64> {
    let km: f64 = text.trim().replace(',', ".").parse().ok()?;
    (km.is_finite() && km > 0.0).then_some(km)
}

/// Positive whole dollars, digits only
pub fn parse_price(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|price| *price > 0)
}

// ============================================================================
// Query
// ============================================================================

fn photo_count_chosen(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Callback {
        action: CallbackAction::PhotoCount(count),
        message_id,
    } = event
    else {
        return Err(unexpected(ctx, &event));
    };
    if !env.photo_counts.contains(&count) {
        return Err(TransitionError::rejected(
            ctx.state,
            format!("photo count {count} was not offered"),
        ));
    }

    let mut next = ctx.clone().with_state(WizardState::Querying);
    next.photo_count = Some(count);
    let Some(criteria) = next.search_criteria() else {
        return Ok(abandon(ctx, prompts::INCOMPLETE_SEARCH));
    };

    Ok(TransitionResult::new(next).with_effects([
        Effect::delete(message_id),
        Effect::send(prompts::photo_count_echo(count)),
        Effect::send(prompts::SEARCHING),
        Effect::SearchHotels { criteria },
    ]))
}

/// A failed search is reported to the user exactly like an empty one
fn search_completed(
    ctx: &SessionContext,
    env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut results = match event {
        Event::SearchCompleted { results } => results,
        Event::SearchFailed { .. } => vec![],
        other => return Err(unexpected(ctx, &other)),
    };
    if let Some(limit) = ctx.result_count {
        results.truncate(usize::from(limit));
    }
    let Some(page) = pagination::render_page(&results, 0) else {
        return Ok(abandon(ctx, prompts::NO_RESULTS));
    };

    let mut next = ctx.clone().with_state(WizardState::Paging);
    next.page_index = 0;
    let record = search_record(ctx, env, &results);
    next.results = results;

    Ok(TransitionResult::new(next)
        .with_effects(record.map(|record| Effect::RecordSearch { record }))
        .with_effects([
            Effect::SendMedia { media: page.media },
            Effect::send_with_keyboard(page.text, page.keyboard),
        ]))
}

fn search_record(
    ctx: &SessionContext,
    env: &WizardEnv,
    results: &[HotelResult],
) -> Option<SearchRecord> {
    let destination = ctx
        .destination_name
        .clone()
        .or_else(|| ctx.destination_query.clone())?;
    Some(SearchRecord {
        user_id: ctx.user_id,
        created_at: env.now,
        command: ctx.command?,
        destination,
        results: results.to_vec(),
    })
}

// ============================================================================
// Carousel
// ============================================================================

fn page_nav(
    ctx: &SessionContext,
    _env: &WizardEnv,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Event::Callback {
        action: CallbackAction::Page(action),
        message_id,
    } = event
    else {
        return Err(unexpected(ctx, &event));
    };
    let Some(current) = ctx.current_result() else {
        return Ok(stale(ctx));
    };

    let index = pagination::step(ctx.page_index, ctx.results.len(), action);
    if index == ctx.page_index {
        return Ok(TransitionResult::stay(ctx));
    }
    let Some(page) = pagination::render_page(&ctx.results, index) else {
        return Ok(stale(ctx));
    };

    let mut next = ctx.clone();
    next.page_index = index;
    Ok(TransitionResult::new(next).with_effects([
        Effect::SendMedia { media: page.media },
        Effect::send_with_keyboard(page.text, page.keyboard),
        Effect::edit(message_id, pagination::viewed_marker(current), None),
    ]))
}

// ============================================================================
// Helpers
// ============================================================================

/// Session no longer matches what the user is pressing
fn stale(ctx: &SessionContext) -> TransitionResult {
    TransitionResult::new(ctx.cleared()).with_effect(Effect::send(prompts::STALE_SESSION))
}

/// Give up on the wizard: apologise, show the menu and go idle
fn abandon(ctx: &SessionContext, apology: &str) -> TransitionResult {
    TransitionResult::new(ctx.cleared()).with_effects([
        Effect::send(apology),
        Effect::send(prompts::menu_text()),
    ])
}

fn unexpected(ctx: &SessionContext, event: &Event) -> TransitionError {
    TransitionError::Unhandled {
        state: ctx.state,
        kind: event.kind(),
    }
}
