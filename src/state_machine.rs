//! Search wizard state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition(context, env, event)` returns the next context plus the
//! effects the runtime has to execute.

pub mod calendar;
mod effect;
pub mod event;
pub mod pagination;
pub mod prompts;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Button, ButtonTarget, Effect, Keyboard, MediaBlock};
pub use event::{BotCommand, CallbackAction, Event, EventKind, PageAction};
pub use state::{
    ChatId, CityMatch, MessageId, SearchCommand, SessionContext, UserId, WizardEnv, WizardState,
    DEFAULT_PHOTO_COUNTS, DEFAULT_RESULT_COUNTS,
};
pub use transition::{transition, TransitionError, TransitionResult};
