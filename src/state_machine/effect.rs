//! Effects produced by state transitions

use super::ids::RecipientId;
use super::recipient::Recipient;
use crate::signaling::{Destination, SignalingMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telephony state advertised to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneState {
    Idle,
    /// Call being set up; keep the device awake
    Processing,
    /// Ringing; the screen should be on
    Interactive,
    InCall,
}

/// Audio routing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "enabled", rename_all = "snake_case")]
pub enum AudioCommand {
    /// Prepare routing before media starts
    InitializeForCall,
    Ringing,
    InCall,
    Speakerphone(bool),
    /// Prefer a bluetooth headset when one is connected
    BluetoothWanted(bool),
    Release,
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a signaling message (queued FIFO behind earlier sends)
    SendCallMessage {
        recipient: Recipient,
        message: SignalingMessage,
        destination: Destination,
    },

    /// Best-effort history write for an answered incoming call
    RecordReceivedCall { peer: RecipientId, had_video: bool },

    /// Best-effort history write for an incoming call that was never answered
    RecordMissedCall {
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    },

    UpdatePhoneState(PhoneState),

    ConfigureAudio(AudioCommand),
}

impl Effect {
    pub fn send(recipient: Recipient, message: SignalingMessage, destination: Destination) -> Self {
        Effect::SendCallMessage {
            recipient,
            message,
            destination,
        }
    }

    pub fn record_received(peer: RecipientId, had_video: bool) -> Self {
        Effect::RecordReceivedCall { peer, had_video }
    }

    pub fn record_missed(peer: RecipientId, at: DateTime<Utc>, had_video: bool) -> Self {
        Effect::RecordMissedCall {
            peer,
            at,
            had_video,
        }
    }

    pub fn phone(state: PhoneState) -> Self {
        Effect::UpdatePhoneState(state)
    }

    pub fn audio(command: AudioCommand) -> Self {
        Effect::ConfigureAudio(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Effect::SendCallMessage { .. } => "send_call_message",
            Effect::RecordReceivedCall { .. } => "record_received_call",
            Effect::RecordMissedCall { .. } => "record_missed_call",
            Effect::UpdatePhoneState(_) => "update_phone_state",
            Effect::ConfigureAudio(_) => "configure_audio",
        }
    }
}
