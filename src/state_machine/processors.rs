//! Mode processors
//!
//! One handler per [`Mode`]. Each handles only the actions meaningful in its
//! mode and hands everything else to [`default::ignore`].

mod connected;
mod default;
mod group_connected;
mod group_joining;
mod group_pre_join;
mod idle;
mod incoming;
mod outgoing;
mod pre_join;

use super::transition::{CallContext, TransitionError, TransitionResult};
use super::{Action, Mode, ServiceState};

pub(crate) type Outcome = Result<TransitionResult, TransitionError>;

/// Route an action to the processor for the current mode
pub(crate) fn dispatch(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    tracing::debug!(
        mode = state.mode.name(),
        action = action.name(),
        "dispatching action"
    );

    match state.mode {
        Mode::Idle => idle::handle(state, ctx, action),
        Mode::PreJoin => pre_join::handle(state, ctx, action),
        Mode::GroupPreJoin => group_pre_join::handle(state, ctx, action),
        Mode::Outgoing => outgoing::handle(state, ctx, action),
        Mode::Incoming => incoming::handle(state, ctx, action),
        Mode::Connected => connected::handle(state, ctx, action),
        Mode::GroupJoining => group_joining::handle(state, ctx, action),
        Mode::GroupConnected => group_connected::handle(state, ctx, action),
    }
}
