//! Actions that drive the call state machine
//!
//! User intents, inbound signaling, engine callbacks and collaborator
//! results all arrive as actions on the same serialized queue.

use super::ids::{CallId, DeviceId};
use super::recipient::Recipient;
use super::state::{GroupConnectionState, GroupJoinState};
use crate::signaling::{IceCandidate, IceServer, OfferType, Opaque};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why the remote side ended a 1:1 call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEndReason {
    Hangup,
    /// Another of our devices answered
    HangupAccepted,
    /// Another of our devices declined
    HangupDeclined,
    /// Another of our devices was busy
    HangupBusy,
    Busy,
    NeedPermission,
}

/// Why the engine ended a 1:1 call on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalEndReason {
    Timeout,
    SignalingFailure,
    ConnectionFailure,
    InternalFailure,
}

/// Why a signaling message could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailure {
    UntrustedIdentity,
    Unregistered,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    // User actions
    PreJoinCall {
        recipient: Recipient,
    },
    CancelPreJoinCall,
    /// Dial a person, or join the group call being previewed
    OutgoingCall {
        recipient: Recipient,
        #[serde(default)]
        offer_type: OfferType,
    },
    AcceptCall {
        #[serde(default)]
        with_video: bool,
    },
    DenyCall,
    LocalHangup,
    SetMuteAudio {
        muted: bool,
    },
    SetEnableVideo {
        enabled: bool,
    },

    // Inbound signaling
    ReceivedOffer {
        call_id: CallId,
        remote_device: DeviceId,
        sender: Recipient,
        #[serde(default)]
        offer_type: OfferType,
        payload: Opaque,
    },
    ReceivedAnswer {
        call_id: CallId,
        remote_device: DeviceId,
        payload: Opaque,
    },
    ReceivedIceCandidates {
        call_id: CallId,
        remote_device: DeviceId,
        candidates: Vec<IceCandidate>,
    },
    ReceivedHangup {
        call_id: CallId,
        remote_device: DeviceId,
    },
    ReceivedBusy {
        call_id: CallId,
        remote_device: DeviceId,
    },

    // Engine requests to send signaling
    SendOffer {
        call_id: CallId,
        remote_device: DeviceId,
        #[serde(default)]
        broadcast: bool,
        #[serde(default)]
        offer_type: OfferType,
        payload: Opaque,
    },
    SendAnswer {
        call_id: CallId,
        remote_device: DeviceId,
        #[serde(default)]
        broadcast: bool,
        payload: Opaque,
    },
    SendIceCandidates {
        call_id: CallId,
        remote_device: DeviceId,
        #[serde(default)]
        broadcast: bool,
        candidates: Vec<IceCandidate>,
    },
    SendHangup {
        call_id: CallId,
        remote_device: DeviceId,
        #[serde(default)]
        broadcast: bool,
    },

    // Engine callbacks (1:1)
    TurnServerUpdate {
        ice_servers: Vec<IceServer>,
    },
    LocalRinging {
        call_id: CallId,
    },
    RemoteRinging {
        call_id: CallId,
    },
    CallConnected {
        call_id: CallId,
    },
    RemoteVideoEnable {
        call_id: CallId,
        enabled: bool,
    },
    EndedRemote {
        call_id: CallId,
        reason: RemoteEndReason,
    },
    Ended {
        call_id: CallId,
        reason: LocalEndReason,
    },

    // Engine callbacks (group)
    GroupLocalDeviceStateChanged {
        connection: GroupConnectionState,
        join: GroupJoinState,
    },
    GroupJoinedMembershipChanged {
        members: Vec<Uuid>,
    },
    GroupCallEnded,

    // Collaborator results and device events
    MessageSendFailed {
        call_id: CallId,
        failure: SendFailure,
    },
    BluetoothChange {
        available: bool,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::PreJoinCall { .. } => "pre_join_call",
            Action::CancelPreJoinCall => "cancel_pre_join_call",
            Action::OutgoingCall { .. } => "outgoing_call",
            Action::AcceptCall { .. } => "accept_call",
            Action::DenyCall => "deny_call",
            Action::LocalHangup => "local_hangup",
            Action::SetMuteAudio { .. } => "set_mute_audio",
            Action::SetEnableVideo { .. } => "set_enable_video",
            Action::ReceivedOffer { .. } => "received_offer",
            Action::ReceivedAnswer { .. } => "received_answer",
            Action::ReceivedIceCandidates { .. } => "received_ice_candidates",
            Action::ReceivedHangup { .. } => "received_hangup",
            Action::ReceivedBusy { .. } => "received_busy",
            Action::SendOffer { .. } => "send_offer",
            Action::SendAnswer { .. } => "send_answer",
            Action::SendIceCandidates { .. } => "send_ice_candidates",
            Action::SendHangup { .. } => "send_hangup",
            Action::TurnServerUpdate { .. } => "turn_server_update",
            Action::LocalRinging { .. } => "local_ringing",
            Action::RemoteRinging { .. } => "remote_ringing",
            Action::CallConnected { .. } => "call_connected",
            Action::RemoteVideoEnable { .. } => "remote_video_enable",
            Action::EndedRemote { .. } => "ended_remote",
            Action::Ended { .. } => "ended",
            Action::GroupLocalDeviceStateChanged { .. } => "group_local_device_state_changed",
            Action::GroupJoinedMembershipChanged { .. } => "group_joined_membership_changed",
            Action::GroupCallEnded => "group_call_ended",
            Action::MessageSendFailed { .. } => "message_send_failed",
            Action::BluetoothChange { .. } => "bluetooth_change",
        }
    }

    /// Call the action refers to, for actions scoped to one 1:1 call
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Action::ReceivedOffer { call_id, .. }
            | Action::ReceivedAnswer { call_id, .. }
            | Action::ReceivedIceCandidates { call_id, .. }
            | Action::ReceivedHangup { call_id, .. }
            | Action::ReceivedBusy { call_id, .. }
            | Action::SendOffer { call_id, .. }
            | Action::SendAnswer { call_id, .. }
            | Action::SendIceCandidates { call_id, .. }
            | Action::SendHangup { call_id, .. }
            | Action::LocalRinging { call_id }
            | Action::RemoteRinging { call_id }
            | Action::CallConnected { call_id }
            | Action::RemoteVideoEnable { call_id, .. }
            | Action::EndedRemote { call_id, .. }
            | Action::Ended { call_id, .. }
            | Action::MessageSendFailed { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }
}
