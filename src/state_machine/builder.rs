//! Builder producing the next `ServiceState` from the current one
//!
//! The builder owns the state while overrides are applied, so no observer can
//! see a half-updated value. Each region has its own sub-builder; `commit`
//! folds the region back into the parent and `build` finishes the snapshot.

use super::participant::{CallParticipant, CameraState};
use super::peer::RemotePeer;
use super::recipient::Recipient;
use super::state::{
    CallInfoState, CallSetupState, CallState, GroupCallState, LocalDeviceState, Mode,
    ServiceState, VideoState,
};
use crate::engine::GroupCallHandle;
use crate::signaling::IceServer;
use chrono::{DateTime, Utc};

pub struct ServiceStateBuilder {
    state: ServiceState,
}

impl ServiceStateBuilder {
    pub(super) fn new(state: ServiceState) -> Self {
        Self { state }
    }

    /// Switch the active processor
    pub fn mode(mut self, mode: Mode) -> Self {
        self.state.mode = mode;
        self
    }

    pub fn change_call_info_state(mut self) -> CallInfoStateBuilder {
        let call_info = std::mem::take(&mut self.state.call_info);
        CallInfoStateBuilder {
            parent: self,
            call_info,
        }
    }

    pub fn change_call_setup_state(mut self) -> CallSetupStateBuilder {
        let call_setup = std::mem::take(&mut self.state.call_setup);
        CallSetupStateBuilder {
            parent: self,
            call_setup,
        }
    }

    pub fn change_local_device_state(self) -> LocalDeviceStateBuilder {
        let local_device = self.state.local_device;
        LocalDeviceStateBuilder {
            parent: self,
            local_device,
        }
    }

    pub fn change_video_state(self) -> VideoStateBuilder {
        let video = self.state.video;
        VideoStateBuilder {
            parent: self,
            video,
        }
    }

    pub fn build(self) -> ServiceState {
        self.state
    }
}

pub struct CallInfoStateBuilder {
    parent: ServiceStateBuilder,
    call_info: CallInfoState,
}

impl CallInfoStateBuilder {
    pub fn call_state(mut self, call_state: CallState) -> Self {
        self.call_info.call_state = call_state;
        self
    }

    pub fn call_recipient(mut self, recipient: Recipient) -> Self {
        self.call_info.call_recipient = Some(recipient);
        self
    }

    pub fn active_peer(mut self, peer: RemotePeer) -> Self {
        self.call_info.active_peer = Some(peer);
        self
    }

    pub fn clear_active_peer(mut self) -> Self {
        self.call_info.active_peer = None;
        self
    }

    /// Insert or replace the entry for the participant's recipient.
    /// Local participants are not stored in the map.
    pub fn put_participant(mut self, participant: CallParticipant) -> Self {
        if let Some(id) = participant.recipient().map(|r| r.id) {
            self.call_info.remote_participants.insert(id, participant);
        }
        self
    }

    pub fn clear_participants(mut self) -> Self {
        self.call_info.remote_participants.clear();
        self
    }

    /// Hand the session to this snapshot
    pub fn group_call(mut self, call: GroupCallHandle) -> Self {
        self.call_info.group_call = Some(call);
        self
    }

    /// Move the session out so it can be released
    pub fn take_group_call(&mut self) -> Option<GroupCallHandle> {
        self.call_info.group_call.take()
    }

    pub fn group_call_state(mut self, state: GroupCallState) -> Self {
        self.call_info.group_call_state = state;
        self
    }

    pub fn call_connected_time(mut self, at: DateTime<Utc>) -> Self {
        self.call_info.call_connected_time = Some(at);
        self
    }

    pub fn commit(mut self) -> ServiceStateBuilder {
        self.parent.state.call_info = self.call_info;
        self.parent
    }

    pub fn build(self) -> ServiceState {
        self.commit().build()
    }
}

pub struct CallSetupStateBuilder {
    parent: ServiceStateBuilder,
    call_setup: CallSetupState,
}

impl CallSetupStateBuilder {
    pub fn enable_video_on_create(mut self, enable: bool) -> Self {
        self.call_setup.enable_video_on_create = enable;
        self
    }

    pub fn remote_video_offer(mut self, is_video: bool) -> Self {
        self.call_setup.is_remote_video_offer = is_video;
        self
    }

    pub fn accept_with_video(mut self, with_video: bool) -> Self {
        self.call_setup.accept_with_video = with_video;
        self
    }

    pub fn ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.call_setup.ice_servers = servers;
        self
    }

    pub fn commit(mut self) -> ServiceStateBuilder {
        self.parent.state.call_setup = self.call_setup;
        self.parent
    }

    pub fn build(self) -> ServiceState {
        self.commit().build()
    }
}

pub struct LocalDeviceStateBuilder {
    parent: ServiceStateBuilder,
    local_device: LocalDeviceState,
}

impl LocalDeviceStateBuilder {
    pub fn camera_state(mut self, camera: CameraState) -> Self {
        self.local_device.camera = camera;
        self
    }

    pub fn microphone_enabled(mut self, enabled: bool) -> Self {
        self.local_device.microphone_enabled = enabled;
        self
    }

    pub fn bluetooth_available(mut self, available: bool) -> Self {
        self.local_device.bluetooth_available = available;
        self
    }

    pub fn commit(mut self) -> ServiceStateBuilder {
        self.parent.state.local_device = self.local_device;
        self.parent
    }

    pub fn build(self) -> ServiceState {
        self.commit().build()
    }
}

pub struct VideoStateBuilder {
    parent: ServiceStateBuilder,
    video: VideoState,
}

impl VideoStateBuilder {
    pub fn initialize(mut self) -> Self {
        self.video = VideoState::initialized();
        self
    }

    pub fn deinitialize(mut self) -> Self {
        self.video = VideoState::default();
        self
    }

    pub fn commit(mut self) -> ServiceStateBuilder {
        self.parent.state.video = self.video;
        self.parent
    }

    pub fn build(self) -> ServiceState {
        self.commit().build()
    }
}
