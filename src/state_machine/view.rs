//! Presentation snapshot published after every action

use super::ids::CallId;
use super::participant::{CallParticipant, CameraState};
use super::peer::PeerState;
use super::recipient::Recipient;
use super::state::{CallState, GroupCallState, Mode, ServiceState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything the presentation layer needs to render the call screen.
/// Derived from a [`ServiceState`]; holds no engine resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSnapshot {
    pub mode: Mode,
    pub call_state: CallState,
    pub group_call_state: GroupCallState,
    pub recipient: Option<Recipient>,
    pub call_id: Option<CallId>,
    pub peer_state: Option<PeerState>,
    pub local_participant: CallParticipant,
    /// Sorted by recipient id
    pub remote_participants: Vec<CallParticipant>,
    pub camera: CameraState,
    pub is_remote_video_offer: bool,
    pub bluetooth_available: bool,
    pub call_connected_time: Option<DateTime<Utc>>,
}

impl CallSnapshot {
    pub fn of(state: &ServiceState) -> Self {
        let info = &state.call_info;

        let mut remote_participants: Vec<CallParticipant> =
            info.remote_participants.values().cloned().collect();
        remote_participants.sort_by_key(|p| p.recipient().map(|r| r.id));

        Self {
            mode: state.mode,
            call_state: info.call_state,
            group_call_state: info.group_call_state,
            recipient: info.call_recipient.clone(),
            call_id: info.active_peer.as_ref().and_then(|p| p.call_id()),
            peer_state: info.active_peer.as_ref().map(|p| p.state()),
            local_participant: CallParticipant::create_local(
                state.local_device.camera,
                state.local_device.microphone_enabled,
            ),
            remote_participants,
            camera: state.local_device.camera,
            is_remote_video_offer: state.call_setup.is_remote_video_offer,
            bluetooth_available: state.local_device.bluetooth_available,
            call_connected_time: info.call_connected_time,
        }
    }

    /// Whether the call screen should be laid out for video
    pub fn is_remote_video_enabled(&self) -> bool {
        self.remote_participants.iter().any(|p| p.video_enabled)
            || (self.mode.is_group() && self.remote_participants.len() > 1)
    }
}
