use super::{default, Outcome};
use crate::state_machine::delegates::{devices, group};
use crate::state_machine::state::CallState;
use crate::state_machine::transition::CallContext;
use crate::state_machine::{Action, ServiceState};

/// Join requested; waiting for the engine to report the device as joined
pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::GroupLocalDeviceStateChanged { connection, join } => {
            group::local_device_state_changed(state, ctx, connection, join)
        }
        Action::GroupJoinedMembershipChanged { members } => {
            group::joined_membership_changed(state, ctx, &members)
        }
        Action::LocalHangup | Action::GroupCallEnded => {
            Ok(group::leave(state, ctx, CallState::Disconnected))
        }
        Action::SetMuteAudio { muted } => group::set_mute_audio(state, ctx, muted),
        Action::SetEnableVideo { enabled } => group::set_enable_video(state, ctx, enabled),
        Action::BluetoothChange { available } => Ok(devices::bluetooth_change(state, available)),
        other => default::while_busy(state, ctx, other),
    }
}
