//! Presentation-level description of call members

use super::ids::RecipientId;
use super::recipient::Recipient;
use serde::{Deserialize, Serialize};

/// Render target the engine draws a participant's video into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "recipient", rename_all = "snake_case")]
pub enum VideoSink {
    Local,
    Remote(RecipientId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraDirection {
    #[default]
    Front,
    Back,
}

/// Local camera as the presentation layer sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CameraState {
    pub enabled: bool,
    pub direction: CameraDirection,
}

/// Which side of the call a participant is on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "side", content = "recipient", rename_all = "snake_case")]
pub enum ParticipantSide {
    Local,
    Remote(Recipient),
}

/// One call member. Always rebuilt from peer/engine state, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallParticipant {
    pub side: ParticipantSide,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub video_sink: VideoSink,
}

impl CallParticipant {
    pub fn create_local(camera: CameraState, microphone_enabled: bool) -> Self {
        Self {
            side: ParticipantSide::Local,
            audio_enabled: microphone_enabled,
            video_enabled: camera.enabled,
            video_sink: VideoSink::Local,
        }
    }

    pub fn create_remote(recipient: Recipient, video_enabled: bool) -> Self {
        let video_sink = VideoSink::Remote(recipient.id);
        Self {
            side: ParticipantSide::Remote(recipient),
            audio_enabled: true,
            video_enabled,
            video_sink,
        }
    }

    pub fn recipient(&self) -> Option<&Recipient> {
        match &self.side {
            ParticipantSide::Remote(recipient) => Some(recipient),
            ParticipantSide::Local => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.side, ParticipantSide::Local)
    }
}
