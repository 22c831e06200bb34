//! 1:1 call setup: dialing, relay negotiation and the move to Connected

use super::{devices, failure, is_active_call};
use crate::engine::ProceedParams;
use crate::signaling::{IceServer, OfferType};
use crate::state_machine::effect::{AudioCommand, PhoneState};
use crate::state_machine::ids::CallId;
use crate::state_machine::participant::{CallParticipant, CameraState};
use crate::state_machine::peer::RemotePeer;
use crate::state_machine::processors::Outcome;
use crate::state_machine::recipient::Recipient;
use crate::state_machine::state::{CallState, Mode};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Effect, ServiceState};

/// Ask the engine to dial a person and move to Outgoing
pub(crate) fn start_outgoing_call(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    recipient: Recipient,
    offer_type: OfferType,
) -> TransitionResult {
    if recipient.is_group() {
        tracing::warn!(
            mode = state.mode.name(),
            recipient = %recipient.id,
            "group recipients are joined from the group lobby, not dialed"
        );
        return TransitionResult::new(state);
    }

    let call_id = match ctx.engine.start_outgoing_call(&recipient, offer_type) {
        Ok(call_id) => call_id,
        Err(e) => return failure::call_failure(state, ctx, "start_outgoing_call", &e),
    };
    tracing::info!(%call_id, recipient = %recipient.id, ?offer_type, "dialing");

    let mut peer = RemotePeer::new(recipient.clone());
    peer.dialing(call_id);
    let with_video = offer_type.is_video() || state.call_setup.enable_video_on_create;

    let next = state
        .builder()
        .mode(Mode::Outgoing)
        .change_call_info_state()
        .call_state(CallState::Outgoing)
        .call_recipient(recipient.clone())
        .active_peer(peer)
        .clear_participants()
        .put_participant(CallParticipant::create_remote(recipient, false))
        .commit()
        .change_call_setup_state()
        .enable_video_on_create(with_video)
        .commit()
        .change_video_state()
        .initialize()
        .build();

    TransitionResult::new(next)
        .with_effect(Effect::phone(PhoneState::Processing))
        .with_effect(Effect::audio(AudioCommand::InitializeForCall))
}

/// Relay servers are known: let the engine start connectivity checks.
///
/// The caller's address is hidden unless the peer is a known contact and
/// relaying is not forced.
pub(crate) fn turn_server_update(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    ice_servers: Vec<IceServer>,
) -> Outcome {
    let peer = state.call_info.require_active_peer()?;
    let call_id = peer.require_call_id()?;
    let hide_ip = !peer.recipient().is_system_contact() || state.call_setup.always_turn;
    let remote_sink = state
        .call_info
        .require_remote_participant(peer.id())?
        .video_sink;
    let local_sink = state.video.require_local_sink()?;
    let enable_video = state.mode == Mode::Outgoing && state.call_setup.enable_video_on_create;

    tracing::info!(%call_id, servers = ice_servers.len(), hide_ip, "proceeding with call");
    let params = ProceedParams {
        call_id,
        ice_servers: &ice_servers,
        hide_ip,
        local_sink,
        remote_sink,
        enable_video,
    };
    if let Err(e) = ctx.engine.proceed(params) {
        return Ok(failure::call_failure(state, ctx, "proceed", &e));
    }

    Ok(TransitionResult::new(
        state
            .builder()
            .change_call_setup_state()
            .ice_servers(ice_servers)
            .build(),
    )
    .with_effect(Effect::phone(PhoneState::Processing)))
}

/// Engine confirmed media is flowing
pub(crate) fn call_connected(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
) -> TransitionResult {
    if !is_active_call(&state, call_id, "call_connected") {
        return TransitionResult::new(state);
    }
    let Some(mut peer) = state.call_info.active_peer.clone() else {
        return TransitionResult::new(state);
    };
    if !peer.connected() {
        return TransitionResult::new(state);
    }

    let microphone = state.local_device.microphone_enabled;
    let video = state.local_device.camera.enabled || state.call_setup.accept_with_video;

    if let Err(e) = ctx.engine.set_audio_enabled(microphone) {
        return failure::call_failure(state, ctx, "set_audio_enabled", &e);
    }
    if let Err(e) = ctx.engine.set_video_enabled(call_id, video) {
        return failure::call_failure(state, ctx, "set_video_enabled", &e);
    }

    let remote_video = state
        .call_info
        .remote_participant(peer.id())
        .is_some_and(|p| p.video_enabled);
    let participant = CallParticipant::create_remote(peer.recipient().clone(), remote_video);
    let camera = CameraState {
        enabled: video,
        ..state.local_device.camera
    };
    tracing::info!(%call_id, video, "call connected");

    let next = state
        .builder()
        .mode(Mode::Connected)
        .change_call_info_state()
        .call_state(CallState::Connected)
        .call_connected_time(ctx.now)
        .active_peer(peer)
        .put_participant(participant)
        .commit()
        .change_local_device_state()
        .camera_state(camera)
        .build();

    TransitionResult::new(next)
        .with_effect(Effect::audio(AudioCommand::InCall))
        .with_effect(Effect::phone(PhoneState::InCall))
}

/// Camera toggle: applied to the engine once connected, remembered before
pub(crate) fn set_enable_video(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    enabled: bool,
) -> TransitionResult {
    let connected_call = match (&state.call_info.active_peer, state.mode) {
        (Some(peer), Mode::Connected) => peer.call_id(),
        _ => None,
    };
    let Some(call_id) = connected_call else {
        return devices::remember_enable_video(state, enabled);
    };

    if let Err(e) = ctx.engine.set_video_enabled(call_id, enabled) {
        return failure::call_failure(state, ctx, "set_video_enabled", &e);
    }
    let camera = CameraState {
        enabled,
        ..state.local_device.camera
    };
    TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .camera_state(camera)
            .build(),
    )
}
