//! Call service state types

use super::builder::ServiceStateBuilder;
use super::ids::RecipientId;
use super::participant::{CallParticipant, CameraState, VideoSink};
use super::peer::RemotePeer;
use super::recipient::Recipient;
use super::transition::TransitionError;
use crate::engine::GroupCallHandle;
use crate::signaling::IceServer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Modes
// ============================================================================

/// The active processor. Exactly one mode handles each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    /// 1:1 call lobby
    PreJoin,
    /// Group call lobby: session created and connected, not joined
    GroupPreJoin,
    Outgoing,
    Incoming,
    Connected,
    GroupJoining,
    GroupConnected,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Idle,
        Mode::PreJoin,
        Mode::GroupPreJoin,
        Mode::Outgoing,
        Mode::Incoming,
        Mode::Connected,
        Mode::GroupJoining,
        Mode::GroupConnected,
    ];

    /// Modes that own a native group-call session
    pub fn is_group(self) -> bool {
        matches!(
            self,
            Mode::GroupPreJoin | Mode::GroupJoining | Mode::GroupConnected
        )
    }

    /// Modes with a live 1:1 peer
    pub fn is_one_to_one_call(self) -> bool {
        matches!(self, Mode::Outgoing | Mode::Incoming | Mode::Connected)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::PreJoin => "pre_join",
            Mode::GroupPreJoin => "group_pre_join",
            Mode::Outgoing => "outgoing",
            Mode::Incoming => "incoming",
            Mode::Connected => "connected",
            Mode::GroupJoining => "group_joining",
            Mode::GroupConnected => "group_connected",
        }
    }
}

// ============================================================================
// Presentation states
// ============================================================================

/// Call state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,

    PreJoin,
    Incoming,
    Outgoing,
    Connected,
    Ringing,
    Busy,
    Disconnected,
    NeedsPermission,

    NetworkFailure,
    RecipientUnavailable,
    NoSuchUser,
    UntrustedIdentity,

    AcceptedElsewhere,
    DeclinedElsewhere,
    OngoingElsewhere,
}

/// Group call progress shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCallState {
    #[default]
    Idle,
    Disconnected,
    Connecting,
    Reconnecting,
    Connected,
    ConnectedAndJoining,
    ConnectedAndJoined,
}

impl GroupCallState {
    pub fn is_not_idle(self) -> bool {
        self != GroupCallState::Idle
    }

    pub fn is_connected(self) -> bool {
        matches!(
            self,
            GroupCallState::Connected
                | GroupCallState::ConnectedAndJoining
                | GroupCallState::ConnectedAndJoined
        )
    }

    /// Combine the engine's connection and join states
    pub fn for_device(connection: GroupConnectionState, join: GroupJoinState) -> Self {
        match connection {
            GroupConnectionState::NotConnected => GroupCallState::Disconnected,
            GroupConnectionState::Connecting => GroupCallState::Connecting,
            GroupConnectionState::Reconnecting => GroupCallState::Reconnecting,
            GroupConnectionState::Connected => match join {
                GroupJoinState::NotJoined => GroupCallState::Connected,
                GroupJoinState::Joining => GroupCallState::ConnectedAndJoining,
                GroupJoinState::Joined => GroupCallState::ConnectedAndJoined,
            },
        }
    }
}

/// Engine-reported connection state of the local device in a group call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupConnectionState {
    NotConnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Engine-reported join state of the local device in a group call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupJoinState {
    NotJoined,
    Joining,
    Joined,
}

// ============================================================================
// Sub-states
// ============================================================================

/// Who is in the call and how far along it is
#[derive(Debug, Default, PartialEq)]
pub struct CallInfoState {
    pub call_state: CallState,
    pub call_recipient: Option<Recipient>,
    pub active_peer: Option<RemotePeer>,
    pub remote_participants: HashMap<RecipientId, CallParticipant>,
    pub group_call: Option<GroupCallHandle>,
    pub group_call_state: GroupCallState,
    pub call_connected_time: Option<DateTime<Utc>>,
}

impl CallInfoState {
    pub fn require_active_peer(&self) -> Result<&RemotePeer, TransitionError> {
        self.active_peer.as_ref().ok_or_else(|| {
            TransitionError::PreconditionViolated("no active peer".to_string())
        })
    }

    pub fn require_group_call(&self) -> Result<&GroupCallHandle, TransitionError> {
        self.group_call.as_ref().ok_or_else(|| {
            TransitionError::PreconditionViolated("no group call session".to_string())
        })
    }

    pub fn require_call_recipient(&self) -> Result<&Recipient, TransitionError> {
        self.call_recipient.as_ref().ok_or_else(|| {
            TransitionError::PreconditionViolated("no call recipient".to_string())
        })
    }

    pub fn remote_participant(&self, recipient: RecipientId) -> Option<&CallParticipant> {
        self.remote_participants.get(&recipient)
    }

    pub fn require_remote_participant(
        &self,
        recipient: RecipientId,
    ) -> Result<&CallParticipant, TransitionError> {
        self.remote_participant(recipient).ok_or_else(|| {
            TransitionError::PreconditionViolated(format!("no participant for {recipient}"))
        })
    }
}

/// Negotiation parameters gathered while setting up a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSetupState {
    pub enable_video_on_create: bool,
    pub is_remote_video_offer: bool,
    pub accept_with_video: bool,
    /// Always relay media through TURN, even for known contacts
    pub always_turn: bool,
    pub ice_servers: Vec<IceServer>,
}

impl CallSetupState {
    pub fn new(always_turn: bool) -> Self {
        Self {
            always_turn,
            ..Self::default()
        }
    }
}

/// Local hardware as the user has configured it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDeviceState {
    pub camera: CameraState,
    pub microphone_enabled: bool,
    pub bluetooth_available: bool,
}

impl Default for LocalDeviceState {
    fn default() -> Self {
        Self {
            camera: CameraState::default(),
            microphone_enabled: true,
            bluetooth_available: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoState {
    pub local_sink: Option<VideoSink>,
}

impl VideoState {
    pub fn initialized() -> Self {
        Self {
            local_sink: Some(VideoSink::Local),
        }
    }

    pub fn require_local_sink(&self) -> Result<VideoSink, TransitionError> {
        self.local_sink.ok_or_else(|| {
            TransitionError::PreconditionViolated("video is not initialized".to_string())
        })
    }
}

// ============================================================================
// Top-level snapshot
// ============================================================================

/// Complete call state. Each processed action consumes one value and yields
/// the next; a value is never modified after it is produced.
#[derive(Debug, Default, PartialEq)]
pub struct ServiceState {
    pub mode: Mode,
    pub call_info: CallInfoState,
    pub call_setup: CallSetupState,
    pub local_device: LocalDeviceState,
    pub video: VideoState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("mode {mode:?} requires a group call session")]
    MissingGroupCall { mode: Mode },
    #[error("mode {mode:?} must not hold a group call session")]
    StrayGroupCall { mode: Mode },
    #[error("participant stored under {key} belongs to another recipient")]
    ParticipantKeyMismatch { key: RecipientId },
}

impl ServiceState {
    /// Startup state
    pub fn new(always_turn: bool) -> Self {
        Self {
            call_setup: CallSetupState::new(always_turn),
            ..Self::default()
        }
    }

    pub fn builder(self) -> ServiceStateBuilder {
        ServiceStateBuilder::new(self)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        match (self.mode.is_group(), self.call_info.group_call.is_some()) {
            (true, false) => {
                return Err(InvariantViolation::MissingGroupCall { mode: self.mode })
            }
            (false, true) => return Err(InvariantViolation::StrayGroupCall { mode: self.mode }),
            _ => {}
        }

        for (key, participant) in &self.call_info.remote_participants {
            if participant.recipient().map(|r| r.id) != Some(*key) {
                return Err(InvariantViolation::ParticipantKeyMismatch { key: *key });
            }
        }

        Ok(())
    }
}
