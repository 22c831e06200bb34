//! Signaling messages exchanged with the remote side
//!
//! Messages travel as JSON; opaque engine payloads are base64 encoded.

use crate::state_machine::{Action, CallId, DeviceId, Recipient};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Opaque bytes produced and consumed only by the media engine
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Opaque(pub Vec<u8>);

impl Opaque {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({} bytes)", self.0.len())
    }
}

impl Serialize for Opaque {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Opaque {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Opaque)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    #[default]
    Audio,
    Video,
}

impl OfferType {
    pub fn is_video(self) -> bool {
        self == OfferType::Video
    }
}

/// One network path descriptor gathered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub opaque: Opaque,
}

/// A STUN/TURN server the engine may use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Where an outbound message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "device", rename_all = "snake_case")]
pub enum Destination {
    Device(DeviceId),
    /// Every linked device of the target account
    AllDevices,
}

impl Destination {
    pub fn for_device(device: DeviceId, broadcast: bool) -> Self {
        if broadcast {
            Destination::AllDevices
        } else {
            Destination::Device(device)
        }
    }
}

/// Call signaling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    Offer {
        call_id: CallId,
        #[serde(default)]
        offer_type: OfferType,
        payload: Opaque,
    },
    Answer {
        call_id: CallId,
        payload: Opaque,
    },
    IceCandidates {
        call_id: CallId,
        candidates: Vec<IceCandidate>,
    },
    Hangup {
        call_id: CallId,
        /// Absent means every linked device of the target account
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination_device_id: Option<DeviceId>,
    },
    Busy {
        call_id: CallId,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed signaling message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{kind} for call {call_id} has an empty payload")]
    EmptyPayload { kind: &'static str, call_id: CallId },
    #[error("ice candidate batch for call {0} is empty")]
    EmptyCandidates(CallId),
}

impl SignalingMessage {
    pub fn call_id(&self) -> CallId {
        match self {
            SignalingMessage::Offer { call_id, .. }
            | SignalingMessage::Answer { call_id, .. }
            | SignalingMessage::IceCandidates { call_id, .. }
            | SignalingMessage::Hangup { call_id, .. }
            | SignalingMessage::Busy { call_id } => *call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidates { .. } => "ice_candidates",
            SignalingMessage::Hangup { .. } => "hangup",
            SignalingMessage::Busy { .. } => "busy",
        }
    }

    /// Reject messages the engine could not act on
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            SignalingMessage::Offer {
                call_id, payload, ..
            }
            | SignalingMessage::Answer { call_id, payload } => {
                validate_payload(self.kind(), *call_id, payload)
            }
            SignalingMessage::IceCandidates {
                call_id,
                candidates,
            } => validate_candidates(*call_id, candidates),
            SignalingMessage::Hangup { .. } | SignalingMessage::Busy { .. } => Ok(()),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let message: SignalingMessage = serde_json::from_slice(bytes)?;
        message.validate()?;
        Ok(message)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Turn an inbound message into the action the state machine consumes
    pub fn into_action(self, sender: Recipient, source_device: DeviceId) -> Action {
        match self {
            SignalingMessage::Offer {
                call_id,
                offer_type,
                payload,
            } => Action::ReceivedOffer {
                call_id,
                remote_device: source_device,
                sender,
                offer_type,
                payload,
            },
            SignalingMessage::Answer { call_id, payload } => Action::ReceivedAnswer {
                call_id,
                remote_device: source_device,
                payload,
            },
            SignalingMessage::IceCandidates {
                call_id,
                candidates,
            } => Action::ReceivedIceCandidates {
                call_id,
                remote_device: source_device,
                candidates,
            },
            SignalingMessage::Hangup { call_id, .. } => Action::ReceivedHangup {
                call_id,
                remote_device: source_device,
            },
            SignalingMessage::Busy { call_id } => Action::ReceivedBusy {
                call_id,
                remote_device: source_device,
            },
        }
    }
}

pub(crate) fn validate_payload(
    kind: &'static str,
    call_id: CallId,
    payload: &Opaque,
) -> Result<(), ProtocolError> {
    if payload.is_empty() {
        Err(ProtocolError::EmptyPayload { kind, call_id })
    } else {
        Ok(())
    }
}

pub(crate) fn validate_candidates(
    call_id: CallId,
    candidates: &[IceCandidate],
) -> Result<(), ProtocolError> {
    if candidates.is_empty() {
        Err(ProtocolError::EmptyCandidates(call_id))
    } else {
        Ok(())
    }
}
