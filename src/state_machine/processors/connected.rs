use super::{default, Outcome};
use crate::state_machine::transition::CallContext;
use crate::state_machine::{Action, ServiceState};

/// Connected 1:1 call. Everything here is shared with the ringing modes
/// except that setup actions no longer apply.
pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        action @ (Action::CallConnected { .. }
        | Action::TurnServerUpdate { .. }
        | Action::AcceptCall { .. }
        | Action::DenyCall) => default::ignore(state, &action),
        other => default::in_call(state, ctx, other),
    }
}
