//! 1:1 call lobby

use super::{default, Outcome};
use crate::state_machine::delegates::{call_setup, devices, failure};
use crate::state_machine::state::CallState;
use crate::state_machine::transition::CallContext;
use crate::state_machine::{Action, ServiceState};

pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::CancelPreJoinCall => {
            tracing::info!("leaving call lobby");
            Ok(failure::terminate(state, ctx, CallState::Idle))
        }
        Action::OutgoingCall {
            recipient,
            offer_type,
        } => Ok(call_setup::start_outgoing_call(
            state, ctx, recipient, offer_type,
        )),
        Action::SetMuteAudio { muted } => Ok(devices::remember_mute_audio(state, muted)),
        Action::SetEnableVideo { enabled } => Ok(devices::remember_enable_video(state, enabled)),
        Action::BluetoothChange { available } => Ok(devices::bluetooth_change(state, available)),
        other => default::while_busy(state, ctx, other),
    }
}
