use super::Outcome;
use crate::signaling::{Destination, SignalingMessage};
use crate::state_machine::delegates::{active_call, call_setup, devices};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Action, ServiceState};

/// Fallback for any action the current mode does not handle: log and keep
/// the state as it is
pub(super) fn ignore(state: ServiceState, action: &Action) -> Outcome {
    tracing::warn!(
        mode = state.mode.name(),
        action = action.name(),
        call_id = ?action.call_id(),
        "action not valid in this mode"
    );
    Ok(TransitionResult::new(state))
}

/// Shared fallback for modes that already have a call in progress: a new
/// offer gets a busy reply, anything else is ignored
pub(super) fn while_busy(state: ServiceState, ctx: &CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::ReceivedOffer {
            call_id,
            remote_device,
            sender,
            offer_type,
            ..
        } => Ok(active_call::received_offer_while_active(
            state,
            ctx,
            call_id,
            remote_device,
            sender,
            offer_type,
        )),
        other => ignore(state, &other),
    }
}

/// Actions handled the same way in every mode with a live 1:1 peer
pub(super) fn in_call(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::SendIceCandidates {
            call_id,
            remote_device,
            broadcast,
            candidates,
        } => Ok(active_call::send(
            state,
            SignalingMessage::IceCandidates {
                call_id,
                candidates,
            },
            Destination::for_device(remote_device, broadcast),
        )),
        Action::ReceivedIceCandidates {
            call_id,
            remote_device,
            candidates,
        } => Ok(active_call::received_ice_candidates(
            state,
            ctx,
            call_id,
            remote_device,
            &candidates,
        )),
        Action::SendHangup {
            call_id,
            remote_device,
            broadcast,
        } => Ok(active_call::send(
            state,
            SignalingMessage::Hangup {
                call_id,
                destination_device_id: (!broadcast).then_some(remote_device),
            },
            Destination::for_device(remote_device, broadcast),
        )),
        Action::ReceivedHangup {
            call_id,
            remote_device,
        } => Ok(active_call::received_hangup(
            state,
            ctx,
            call_id,
            remote_device,
        )),
        Action::CallConnected { call_id } => Ok(call_setup::call_connected(state, ctx, call_id)),
        Action::RemoteVideoEnable { call_id, enabled } => {
            Ok(active_call::remote_video_enable(state, call_id, enabled))
        }
        Action::EndedRemote { call_id, reason } => {
            Ok(active_call::ended_remote(state, ctx, call_id, reason))
        }
        Action::Ended { call_id, reason } => Ok(active_call::ended(state, ctx, call_id, reason)),
        Action::LocalHangup => Ok(active_call::local_hangup(state, ctx)),
        Action::MessageSendFailed { call_id, failure } => Ok(active_call::message_send_failed(
            state, ctx, call_id, failure,
        )),
        Action::SetMuteAudio { muted } => Ok(active_call::set_mute_audio(state, ctx, muted)),
        Action::SetEnableVideo { enabled } => Ok(call_setup::set_enable_video(state, ctx, enabled)),
        Action::BluetoothChange { available } => Ok(devices::bluetooth_change(state, available)),
        other => while_busy(state, ctx, other),
    }
}
