//! Group call session handling shared by the lobby, joining and joined modes

use super::failure;
use crate::engine::{BandwidthMode, EngineError, GroupCallHandle, MediaEngine};
use crate::state_machine::effect::{AudioCommand, PhoneState};
use crate::state_machine::participant::{CallParticipant, CameraState};
use crate::state_machine::processors::Outcome;
use crate::state_machine::recipient::Recipient;
use crate::state_machine::state::{
    CallState, GroupCallState, GroupConnectionState, GroupJoinState, Mode,
};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Effect, ServiceState};
use uuid::Uuid;

/// Open a lobby for a group call.
///
/// Creates the session, mutes outgoing media and starts connecting to the
/// call's rendezvous point. A failure at any step releases the session.
pub(crate) fn pre_join(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    recipient: Recipient,
) -> Outcome {
    let group_id = recipient.require_group_id()?.clone();

    let call = match ctx.engine.create_group_call(&group_id) {
        Ok(call) => call,
        Err(e) => return Ok(failure::call_failure(state, ctx, "create_group_call", &e)),
    };
    tracing::info!(%group_id, handle = call.raw(), "created group call");

    let state = state
        .builder()
        .mode(Mode::GroupPreJoin)
        .change_call_info_state()
        .call_state(CallState::PreJoin)
        .call_recipient(recipient)
        .clear_participants()
        .group_call(call)
        .group_call_state(GroupCallState::Disconnected)
        .commit()
        .change_video_state()
        .initialize()
        .build();

    let connected = match state.call_info.group_call.as_ref() {
        Some(call) => mute_and_connect(ctx.engine, call),
        None => Ok(()),
    };
    match connected {
        Ok(()) => Ok(TransitionResult::new(state)),
        Err((operation, e)) => Ok(failure::call_failure(state, ctx, operation, &e)),
    }
}

/// User pressed join in the lobby
pub(crate) fn join(state: ServiceState, ctx: &mut CallContext<'_>) -> Outcome {
    let video_muted = !state.local_device.camera.enabled;
    let audio_muted = !state.local_device.microphone_enabled;
    let joined = configure_and_join(
        ctx.engine,
        state.call_info.require_group_call()?,
        audio_muted,
        video_muted,
    );
    if let Err((operation, e)) = joined {
        return Ok(failure::call_failure(state, ctx, operation, &e));
    }
    tracing::info!(audio_muted, video_muted, "joining group call");

    let next = state
        .builder()
        .mode(Mode::GroupJoining)
        .change_call_info_state()
        .call_state(CallState::Outgoing)
        .group_call_state(GroupCallState::ConnectedAndJoining)
        .build();

    Ok(TransitionResult::new(next).with_effects([
        Effect::audio(AudioCommand::Speakerphone(false)),
        Effect::phone(PhoneState::InCall),
        Effect::audio(AudioCommand::InitializeForCall),
        Effect::audio(AudioCommand::BluetoothWanted(true)),
    ]))
}

/// Engine reported a new connection/join state for this device
pub(crate) fn local_device_state_changed(
    state: ServiceState,
    ctx: &CallContext<'_>,
    connection: GroupConnectionState,
    join: GroupJoinState,
) -> Outcome {
    state.call_info.require_group_call()?;
    tracing::info!(mode = state.mode.name(), ?connection, ?join, "group local device changed");

    // The lobby only tracks connectivity; a join can only start from OutgoingCall
    let join = if state.mode == Mode::GroupPreJoin {
        GroupJoinState::NotJoined
    } else {
        join
    };
    let group_call_state = GroupCallState::for_device(connection, join);

    let now_joined = state.mode == Mode::GroupJoining
        && group_call_state == GroupCallState::ConnectedAndJoined;
    if !now_joined {
        return Ok(TransitionResult::new(
            state
                .builder()
                .change_call_info_state()
                .group_call_state(group_call_state)
                .build(),
        ));
    }

    let next = state
        .builder()
        .mode(Mode::GroupConnected)
        .change_call_info_state()
        .call_state(CallState::Connected)
        .group_call_state(group_call_state)
        .call_connected_time(ctx.now)
        .build();
    Ok(TransitionResult::new(next).with_effect(Effect::audio(AudioCommand::InCall)))
}

/// Upsert a participant for every reported member. Members missing from the
/// notification are kept.
pub(crate) fn joined_membership_changed(
    state: ServiceState,
    ctx: &CallContext<'_>,
    members: &[Uuid],
) -> Outcome {
    state.call_info.require_group_call()?;
    tracing::info!(mode = state.mode.name(), count = members.len(), "group membership changed");

    let participants: Vec<CallParticipant> = members
        .iter()
        .map(|member| {
            let recipient = ctx.directory.resolve(*member);
            let video_enabled = state
                .call_info
                .remote_participant(recipient.id)
                .is_some_and(|p| p.video_enabled);
            CallParticipant::create_remote(recipient, video_enabled)
        })
        .collect();

    let next = participants
        .into_iter()
        .fold(
            state.builder().change_call_info_state(),
            |info, participant| info.put_participant(participant),
        )
        .build();
    Ok(TransitionResult::new(next))
}

/// Disconnect from the session and return to Idle
pub(crate) fn leave(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_state: CallState,
) -> TransitionResult {
    let mut info = state.builder().change_call_info_state();
    let call = info.take_group_call();
    let state = info.build();

    if let Some(call) = call {
        let raw = call.raw();
        if let Err(e) = ctx.engine.disconnect(call) {
            tracing::warn!(handle = raw, "group call disconnect failed");
            return failure::call_failure(state, ctx, "disconnect", &e);
        }
        tracing::info!(handle = raw, "left group call");
    }

    failure::terminate(state, ctx, call_state)
}

pub(crate) fn set_mute_audio(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    muted: bool,
) -> Outcome {
    let muting = ctx
        .engine
        .set_outgoing_audio_muted(state.call_info.require_group_call()?, muted);
    if let Err(e) = muting {
        return Ok(failure::call_failure(state, ctx, "set_outgoing_audio_muted", &e));
    }
    Ok(TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .microphone_enabled(!muted)
            .build(),
    ))
}

pub(crate) fn set_enable_video(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    enabled: bool,
) -> Outcome {
    let muting = ctx
        .engine
        .set_outgoing_video_muted(state.call_info.require_group_call()?, !enabled);
    if let Err(e) = muting {
        return Ok(failure::call_failure(state, ctx, "set_outgoing_video_muted", &e));
    }
    let camera = CameraState {
        enabled,
        ..state.local_device.camera
    };
    Ok(TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .camera_state(camera)
            .build(),
    ))
}

type StepError = (&'static str, EngineError);

fn mute_and_connect(engine: &mut dyn MediaEngine, call: &GroupCallHandle) -> Result<(), StepError> {
    engine
        .set_outgoing_audio_muted(call, true)
        .map_err(|e| ("set_outgoing_audio_muted", e))?;
    engine
        .set_outgoing_video_muted(call, true)
        .map_err(|e| ("set_outgoing_video_muted", e))?;
    engine.connect(call).map_err(|e| ("connect", e))
}

fn configure_and_join(
    engine: &mut dyn MediaEngine,
    call: &GroupCallHandle,
    audio_muted: bool,
    video_muted: bool,
) -> Result<(), StepError> {
    engine
        .set_outgoing_video_muted(call, video_muted)
        .map_err(|e| ("set_outgoing_video_muted", e))?;
    engine
        .set_outgoing_audio_muted(call, audio_muted)
        .map_err(|e| ("set_outgoing_audio_muted", e))?;
    engine
        .set_bandwidth_mode(call, BandwidthMode::Normal)
        .map_err(|e| ("set_bandwidth_mode", e))?;
    engine.join(call).map_err(|e| ("join", e))
}
