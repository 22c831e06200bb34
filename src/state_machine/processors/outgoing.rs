//! Outgoing 1:1 call: dialing until the engine reports the call connected

use super::{default, Outcome};
use crate::signaling::{self, Destination, Opaque, SignalingMessage};
use crate::state_machine::delegates::{active_call, call_setup, failure, is_active_call};
use crate::state_machine::ids::{CallId, DeviceId};
use crate::state_machine::state::CallState;
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Action, ServiceState};

pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::SendOffer {
            call_id,
            remote_device,
            broadcast,
            offer_type,
            payload,
        } => Ok(active_call::send(
            state,
            SignalingMessage::Offer {
                call_id,
                offer_type,
                payload,
            },
            Destination::for_device(remote_device, broadcast),
        )),
        Action::ReceivedAnswer {
            call_id,
            remote_device,
            payload,
        } => Ok(received_answer(state, ctx, call_id, remote_device, &payload)),
        Action::ReceivedBusy {
            call_id,
            remote_device,
        } => Ok(received_busy(state, ctx, call_id, remote_device)),
        Action::RemoteRinging { call_id } => Ok(remote_ringing(state, call_id)),
        Action::TurnServerUpdate { ice_servers } => {
            call_setup::turn_server_update(state, ctx, ice_servers)
        }
        other => default::in_call(state, ctx, other),
    }
}

fn received_answer(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
    payload: &Opaque,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "received_answer") {
        return TransitionResult::new(state);
    }
    if let Err(e) = signaling::validate_payload("answer", call_id, payload) {
        tracing::warn!(error = %e, "dropping answer");
        return TransitionResult::new(state);
    }

    tracing::info!(%call_id, device = %remote_device, "answer received");
    match ctx.engine.received_answer(call_id, remote_device, payload) {
        Ok(()) => TransitionResult::new(state),
        Err(e) => failure::call_failure(state, ctx, "received_answer", &e),
    }
}

fn received_busy(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "received_busy") {
        return TransitionResult::new(state);
    }

    tracing::info!(%call_id, device = %remote_device, "remote is busy");
    match ctx.engine.received_busy(call_id, remote_device) {
        Ok(()) => TransitionResult::new(state),
        Err(e) => failure::call_failure(state, ctx, "received_busy", &e),
    }
}

fn remote_ringing(state: ServiceState, call_id: CallId) -> TransitionResult {
    if !is_active_call(&state, call_id, "remote_ringing") {
        return TransitionResult::new(state);
    }
    let Some(mut peer) = state.call_info.active_peer.clone() else {
        return TransitionResult::new(state);
    };
    if !peer.remote_ringing() {
        return TransitionResult::new(state);
    }

    tracing::info!(%call_id, "remote ringing");
    TransitionResult::new(
        state
            .builder()
            .change_call_info_state()
            .call_state(CallState::Ringing)
            .active_peer(peer)
            .build(),
    )
}
