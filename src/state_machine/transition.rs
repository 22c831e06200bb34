//! Pure state transition function
//!
//! `transition` consumes the current snapshot and one action and returns the
//! next snapshot plus the effects the runtime must execute. The only side
//! channel is the media engine in [`CallContext`], whose calls are
//! non-blocking requests.

use super::processors;
use super::recipient::RecipientDirectory;
use super::{Action, Effect, ServiceState};
use crate::engine::MediaEngine;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ServiceState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ServiceState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
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

/// Errors that can occur during transition.
///
/// Invalid transitions and bad protocol input are not errors: they are logged
/// and the state comes back unchanged. What remains is a caller breaking a
/// documented precondition, which the runtime treats as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Precondition violated: {0}")]
    PreconditionViolated(String),
}

/// Collaborators available while an action is applied
pub struct CallContext<'a> {
    pub engine: &'a mut dyn MediaEngine,
    pub directory: &'a dyn RecipientDirectory,
    /// Wall clock at the time the action is applied
    pub now: DateTime<Utc>,
}

impl<'a> CallContext<'a> {
    pub fn new(
        engine: &'a mut dyn MediaEngine,
        directory: &'a dyn RecipientDirectory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            engine,
            directory,
            now,
        }
    }
}

/// Apply one action to the snapshot
pub fn transition(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    action: Action,
) -> Result<TransitionResult, TransitionError> {
    let from = state.mode;
    let name = action.name();

    let result = processors::dispatch(state, ctx, action)?;

    if result.new_state.mode != from {
        tracing::info!(
            action = name,
            from = from.name(),
            to = result.new_state.mode.name(),
            "mode change"
        );
    }

    Ok(result)
}
