//! Incoming 1:1 call: ringing until the user answers or declines

use super::{default, Outcome};
use crate::signaling::{Destination, SignalingMessage};
use crate::state_machine::delegates::{active_call, call_setup, failure, is_active_call};
use crate::state_machine::effect::{AudioCommand, PhoneState};
use crate::state_machine::ids::CallId;
use crate::state_machine::peer::PeerState;
use crate::state_machine::state::CallState;
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Action, Effect, ServiceState};

pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::LocalRinging { call_id } => Ok(local_ringing(state, call_id)),
        Action::AcceptCall { with_video } => accept_call(state, ctx, with_video),
        Action::DenyCall => deny_call(state, ctx),
        Action::SendAnswer {
            call_id,
            remote_device,
            broadcast,
            payload,
        } => Ok(active_call::send(
            state,
            SignalingMessage::Answer { call_id, payload },
            Destination::for_device(remote_device, broadcast),
        )),
        Action::TurnServerUpdate { ice_servers } => {
            call_setup::turn_server_update(state, ctx, ice_servers)
        }
        other => default::in_call(state, ctx, other),
    }
}

fn local_ringing(state: ServiceState, call_id: CallId) -> TransitionResult {
    if !is_active_call(&state, call_id, "local_ringing") {
        return TransitionResult::new(state);
    }
    let Some(mut peer) = state.call_info.active_peer.clone() else {
        return TransitionResult::new(state);
    };
    if !peer.local_ringing() {
        return TransitionResult::new(state);
    }

    tracing::info!(%call_id, from = %peer.id(), "ringing");
    let next = state
        .builder()
        .change_call_info_state()
        .call_state(CallState::Incoming)
        .active_peer(peer)
        .build();

    TransitionResult::new(next).with_effects([
        Effect::phone(PhoneState::Interactive),
        Effect::audio(AudioCommand::InitializeForCall),
        Effect::audio(AudioCommand::Ringing),
    ])
}

/// Record the answered call and ask the engine to accept. The mode changes
/// only when the engine reports the call connected.
fn accept_call(state: ServiceState, ctx: &mut CallContext<'_>, with_video: bool) -> Outcome {
    let peer = state.call_info.require_active_peer()?;
    if peer.state() != PeerState::LocalRinging {
        tracing::warn!(state = ?peer.state(), "can only accept a ringing call");
        return Ok(TransitionResult::new(state));
    }
    let call_id = peer.require_call_id()?;
    let record = Effect::record_received(peer.id(), state.call_setup.is_remote_video_offer);

    tracing::info!(%call_id, with_video, "accepting call");
    let state = state
        .builder()
        .change_call_setup_state()
        .accept_with_video(with_video)
        .build();

    if let Err(e) = ctx.engine.accept_call(call_id) {
        return Ok(failure::call_failure(state, ctx, "accept_call", &e).with_effect(record));
    }
    Ok(TransitionResult::new(state).with_effect(record))
}

fn deny_call(state: ServiceState, ctx: &mut CallContext<'_>) -> Outcome {
    let peer = state.call_info.require_active_peer()?;
    if peer.state() != PeerState::LocalRinging {
        tracing::warn!(state = ?peer.state(), "can only deny a ringing call");
        return Ok(TransitionResult::new(state));
    }
    let missed = Effect::record_missed(peer.id(), ctx.now, state.call_setup.is_remote_video_offer);

    tracing::info!(call_id = ?peer.call_id(), "denying call");
    if let Err(e) = ctx.engine.hangup() {
        return Ok(failure::call_failure(state, ctx, "hangup", &e));
    }
    Ok(failure::terminate(state, ctx, CallState::Disconnected).with_effect(missed))
}
