//! Local hardware toggles that only touch local state

use crate::state_machine::participant::CameraState;
use crate::state_machine::transition::TransitionResult;
use crate::state_machine::ServiceState;

pub(crate) fn bluetooth_change(state: ServiceState, available: bool) -> TransitionResult {
    tracing::info!(mode = state.mode.name(), available, "bluetooth availability changed");
    TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .bluetooth_available(available)
            .build(),
    )
}

/// Mute before a call exists; applied to the engine when the call starts
pub(crate) fn remember_mute_audio(state: ServiceState, muted: bool) -> TransitionResult {
    tracing::info!(mode = state.mode.name(), muted, "remembering microphone state");
    TransitionResult::new(
        state
            .builder()
            .change_local_device_state()
            .microphone_enabled(!muted)
            .build(),
    )
}

/// Camera toggle before a call exists; also decides whether the call is
/// created with video
pub(crate) fn remember_enable_video(state: ServiceState, enabled: bool) -> TransitionResult {
    tracing::info!(mode = state.mode.name(), enabled, "remembering camera state");
    let camera = CameraState {
        enabled,
        ..state.local_device.camera
    };
    TransitionResult::new(
        state
            .builder()
            .change_call_setup_state()
            .enable_video_on_create(enabled)
            .commit()
            .change_local_device_state()
            .camera_state(camera)
            .build(),
    )
}
