//! Teardown back to Idle

use crate::engine::EngineError;
use crate::state_machine::effect::{AudioCommand, PhoneState};
use crate::state_machine::peer::RemotePeer;
use crate::state_machine::state::{
    CallInfoState, CallSetupState, CallState, Mode, ServiceState, VideoState,
};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::Effect;

/// Canonical engine-failure transition: log, best-effort release of engine
/// resources, then Idle with the failure reason as the view state.
pub(crate) fn call_failure(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    operation: &'static str,
    error: &EngineError,
) -> TransitionResult {
    tracing::error!(
        mode = state.mode.name(),
        operation,
        kind = ?error.kind,
        error = %error,
        "engine call failed"
    );

    if state.mode.is_one_to_one_call() {
        if let Err(e) = ctx.engine.hangup() {
            tracing::warn!(error = %e, "hangup after failure also failed");
        }
    }

    terminate(state, ctx, error.failure_state())
}

/// Release whatever the current mode owns and return to Idle.
///
/// Keeps the local device configuration, the relay preference and the last
/// call recipient so the view can still name who the call was with.
pub(crate) fn terminate(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_state: CallState,
) -> TransitionResult {
    let ServiceState {
        mode,
        call_info,
        call_setup,
        local_device,
        ..
    } = state;
    let CallInfoState {
        active_peer,
        call_recipient,
        group_call,
        ..
    } = call_info;

    if let Some(peer) = active_peer {
        retire_peer(peer);
    }

    if let Some(call) = group_call {
        let raw = call.raw();
        if let Err(e) = ctx.engine.disconnect(call) {
            tracing::warn!(handle = raw, error = %e, "failed to release group call");
        }
    }

    tracing::info!(from = mode.name(), ?call_state, "call terminated");

    let next = ServiceState {
        mode: Mode::Idle,
        call_info: CallInfoState {
            call_state,
            call_recipient,
            ..CallInfoState::default()
        },
        call_setup: CallSetupState::new(call_setup.always_turn),
        local_device,
        video: VideoState::default(),
    };

    let result = TransitionResult::new(next);
    if routes_audio(mode) {
        result
            .with_effect(Effect::audio(AudioCommand::Release))
            .with_effect(Effect::phone(PhoneState::Idle))
    } else {
        result
    }
}

/// Modes that have taken over audio routing and telephony state
fn routes_audio(mode: Mode) -> bool {
    matches!(
        mode,
        Mode::Outgoing
            | Mode::Incoming
            | Mode::Connected
            | Mode::GroupJoining
            | Mode::GroupConnected
    )
}

/// Last lifecycle step of a peer before the snapshot lets go of it
fn retire_peer(mut peer: RemotePeer) -> RemotePeer {
    let last = peer.state();
    peer.ended();
    tracing::info!(peer = %peer.id(), ?last, "peer ended");
    peer
}
