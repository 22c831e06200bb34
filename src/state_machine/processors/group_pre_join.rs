//! Group call lobby: session created and connecting, not joined

use super::{default, Outcome};
use crate::state_machine::delegates::{devices, group};
use crate::state_machine::state::CallState;
use crate::state_machine::transition::CallContext;
use crate::state_machine::{Action, ServiceState};

pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::CancelPreJoinCall => {
            // Only a group lobby can be here; anything else is a caller bug
            state.call_info.require_call_recipient()?.require_group_id()?;
            tracing::info!("leaving group call lobby");
            Ok(group::leave(state, ctx, CallState::Idle))
        }
        Action::OutgoingCall { .. } => group::join(state, ctx),
        Action::GroupLocalDeviceStateChanged { connection, join } => {
            group::local_device_state_changed(state, ctx, connection, join)
        }
        Action::GroupJoinedMembershipChanged { members } => {
            group::joined_membership_changed(state, ctx, &members)
        }
        Action::GroupCallEnded => Ok(group::leave(state, ctx, CallState::Disconnected)),
        Action::SetMuteAudio { muted } => Ok(devices::remember_mute_audio(state, muted)),
        Action::SetEnableVideo { enabled } => Ok(devices::remember_enable_video(state, enabled)),
        Action::BluetoothChange { available } => Ok(devices::bluetooth_change(state, available)),
        other => default::while_busy(state, ctx, other),
    }
}
