//! Handling common to every mode with a live 1:1 peer
//!
//! ICE exchange, outbound signaling, remote and local endings and media
//! toggles behave the same whether the call is still ringing or connected.

use super::{failure, is_active_call};
use crate::signaling::{self, Destination, IceCandidate, OfferType, SignalingMessage};
use crate::state_machine::action::{LocalEndReason, RemoteEndReason, SendFailure};
use crate::state_machine::ids::{CallId, DeviceId};
use crate::state_machine::participant::CallParticipant;
use crate::state_machine::recipient::Recipient;
use crate::state_machine::state::{CallState, Mode};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Effect, ServiceState};

/// Feed inbound candidates to the engine in the order they were received
pub(crate) fn received_ice_candidates(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
    candidates: &[IceCandidate],
) -> TransitionResult {
    if !is_active_call(&state, call_id, "received_ice_candidates") {
        return TransitionResult::new(state);
    }
    if let Err(e) = signaling::validate_candidates(call_id, candidates) {
        tracing::warn!(error = %e, "dropping ice candidates");
        return TransitionResult::new(state);
    }

    tracing::debug!(%call_id, device = %remote_device, count = candidates.len(), "applying ice candidates");
    match ctx
        .engine
        .received_ice_candidates(call_id, remote_device, candidates)
    {
        Ok(()) => TransitionResult::new(state),
        Err(e) => failure::call_failure(state, ctx, "received_ice_candidates", &e),
    }
}

/// Wrap a message the engine produced and address it to the active peer
pub(crate) fn send(
    state: ServiceState,
    message: SignalingMessage,
    destination: Destination,
) -> TransitionResult {
    let call_id = message.call_id();
    if !is_active_call(&state, call_id, message.kind()) {
        return TransitionResult::new(state);
    }
    let Some(recipient) = state
        .call_info
        .active_peer
        .as_ref()
        .map(|peer| peer.recipient().clone())
    else {
        return TransitionResult::new(state);
    };

    tracing::debug!(%call_id, kind = message.kind(), ?destination, "queueing signaling message");
    TransitionResult::new(state).with_effect(Effect::send(recipient, message, destination))
}

pub(crate) fn received_hangup(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "received_hangup") {
        return TransitionResult::new(state);
    }
    match ctx.engine.received_hangup(call_id, remote_device) {
        Ok(()) => TransitionResult::new(state),
        Err(e) => failure::call_failure(state, ctx, "received_hangup", &e),
    }
}

pub(crate) fn local_hangup(state: ServiceState, ctx: &mut CallContext<'_>) -> TransitionResult {
    tracing::info!(
        mode = state.mode.name(),
        call_id = ?state.call_info.active_peer.as_ref().and_then(|p| p.call_id()),
        "local hangup"
    );
    if let Err(e) = ctx.engine.hangup() {
        return failure::call_failure(state, ctx, "hangup", &e);
    }
    failure::terminate(state, ctx, CallState::Disconnected)
}

pub(crate) fn ended_remote(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    reason: RemoteEndReason,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "ended_remote") {
        return TransitionResult::new(state);
    }

    let view = match reason {
        RemoteEndReason::Hangup => CallState::Disconnected,
        RemoteEndReason::HangupAccepted => CallState::AcceptedElsewhere,
        RemoteEndReason::HangupDeclined => CallState::DeclinedElsewhere,
        RemoteEndReason::HangupBusy => CallState::OngoingElsewhere,
        RemoteEndReason::Busy => CallState::Busy,
        RemoteEndReason::NeedPermission => CallState::NeedsPermission,
    };
    tracing::info!(%call_id, ?reason, "call ended by remote");

    let missed = if matches!(
        reason,
        RemoteEndReason::Hangup | RemoteEndReason::NeedPermission
    ) {
        missed_call(&state, ctx)
    } else {
        None
    };

    failure::terminate(state, ctx, view).with_effects(missed)
}

pub(crate) fn ended(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    reason: LocalEndReason,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "ended") {
        return TransitionResult::new(state);
    }

    let view = match reason {
        LocalEndReason::Timeout => CallState::RecipientUnavailable,
        LocalEndReason::SignalingFailure
        | LocalEndReason::ConnectionFailure
        | LocalEndReason::InternalFailure => CallState::NetworkFailure,
    };
    tracing::warn!(%call_id, ?reason, "call ended by engine");

    let missed = if reason == LocalEndReason::Timeout {
        missed_call(&state, ctx)
    } else {
        None
    };

    failure::terminate(state, ctx, view).with_effects(missed)
}

/// Rebuild the remote participant with the new video flag
pub(crate) fn remote_video_enable(
    state: ServiceState,
    call_id: CallId,
    enabled: bool,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "remote_video_enable") {
        return TransitionResult::new(state);
    }
    let Some(recipient) = state
        .call_info
        .active_peer
        .as_ref()
        .map(|peer| peer.recipient().clone())
    else {
        return TransitionResult::new(state);
    };

    tracing::info!(%call_id, enabled, "remote video changed");
    TransitionResult::new(
        state
            .builder()
            .change_call_info_state()
            .put_participant(CallParticipant::create_remote(recipient, enabled))
            .build(),
    )
}

/// A second caller while this one is in progress: tell them we are busy and
/// log the missed call. The current call is untouched.
pub(crate) fn received_offer_while_active(
    state: ServiceState,
    ctx: &CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
    sender: Recipient,
    offer_type: OfferType,
) -> TransitionResult {
    if state
        .call_info
        .active_peer
        .as_ref()
        .is_some_and(|peer| peer.matches(call_id))
    {
        tracing::warn!(%call_id, "ignoring duplicate offer for the active call");
        return TransitionResult::new(state);
    }

    tracing::info!(
        mode = state.mode.name(),
        %call_id,
        from = %sender.id,
        "offer received while busy"
    );
    let peer = sender.id;
    TransitionResult::new(state)
        .with_effect(Effect::send(
            sender,
            SignalingMessage::Busy { call_id },
            Destination::Device(remote_device),
        ))
        .with_effect(Effect::record_missed(peer, ctx.now, offer_type.is_video()))
}

pub(crate) fn message_send_failed(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    reason: SendFailure,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "message_send_failed") {
        return TransitionResult::new(state);
    }

    let view = match reason {
        SendFailure::UntrustedIdentity => CallState::UntrustedIdentity,
        SendFailure::Unregistered => CallState::NoSuchUser,
        SendFailure::Network => CallState::NetworkFailure,
    };
    tracing::warn!(%call_id, ?reason, "signaling send failed; ending call");

    if let Err(e) = ctx.engine.hangup() {
        tracing::warn!(error = %e, "hangup after send failure also failed");
    }
    failure::terminate(state, ctx, view)
}

/// Mute toggle: applied to the engine once connected, remembered before
pub(crate) fn set_mute_audio(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    muted: bool,
) -> TransitionResult {
    if state.mode != Mode::Connected {
        return super::devices::remember_mute_audio(state, muted);
    }

    if let Err(e) = ctx.engine.set_audio_enabled(!muted) {
        return failure::call_failure(state, ctx, "set_audio_enabled", &e);
    }
    TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .microphone_enabled(!muted)
            .build(),
    )
}

/// History record for an incoming call that ends before it was answered
fn missed_call(state: &ServiceState, ctx: &CallContext<'_>) -> Option<Effect> {
    if state.mode != Mode::Incoming {
        return None;
    }
    let peer = state.call_info.active_peer.as_ref()?;
    Some(Effect::record_missed(
        peer.id(),
        ctx.now,
        state.call_setup.is_remote_video_offer,
    ))
}
