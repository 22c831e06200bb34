//! Native media engine contract
//!
//! The engine owns media transport, codecs and network traversal. The call
//! core only drives its lifecycle. Every method is fallible and must return
//! promptly: implementations queue the work on the engine's own thread and
//! report progress later as [`Action`](crate::state_machine::Action)s on the
//! runtime's input queue.

use crate::signaling::{IceCandidate, IceServer, OfferType, Opaque};
use crate::state_machine::{CallId, CallState, DeviceId, GroupId, Recipient, VideoSink};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Ownership token for one native group-call session.
///
/// Not `Clone`: exactly one snapshot owns the session at a time, and
/// [`MediaEngine::disconnect`] consumes the token so a session can never be
/// released twice.
#[derive(Debug, PartialEq, Eq)]
pub struct GroupCallHandle {
    raw: u64,
    group_id: GroupId,
}

impl GroupCallHandle {
    pub fn new(raw: u64, group_id: GroupId) -> Self {
        Self { raw, group_id }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthMode {
    Normal,
}

/// Error classification for failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Connectivity to the relay or rendezvous point failed
    Network,
    /// The remote side or server refused the operation
    Rejected,
    /// The engine was not in a state that allows the call
    InvalidState,
    Internal,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Network, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Rejected, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Internal, message)
    }

    /// User-facing reason shown after the call is torn down
    pub fn failure_state(&self) -> CallState {
        match self.kind {
            EngineErrorKind::Rejected => CallState::RecipientUnavailable,
            EngineErrorKind::Network
            | EngineErrorKind::InvalidState
            | EngineErrorKind::Internal => CallState::NetworkFailure,
        }
    }
}

/// Arguments for letting a 1:1 call proceed once relay servers are known
#[derive(Debug)]
pub struct ProceedParams<'a> {
    pub call_id: CallId,
    pub ice_servers: &'a [IceServer],
    /// Force relayed media so the peer never learns our address
    pub hide_ip: bool,
    pub local_sink: VideoSink,
    pub remote_sink: VideoSink,
    pub enable_video: bool,
}

pub trait MediaEngine: Send {
    // 1:1 calls

    /// Start dialing; the engine assigns the call id
    fn start_outgoing_call(
        &mut self,
        recipient: &Recipient,
        offer_type: OfferType,
    ) -> Result<CallId, EngineError>;

    fn received_offer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        offer_type: OfferType,
        payload: &Opaque,
    ) -> Result<(), EngineError>;

    fn received_answer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        payload: &Opaque,
    ) -> Result<(), EngineError>;

    /// Candidates must be applied in slice order
    fn received_ice_candidates(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        candidates: &[IceCandidate],
    ) -> Result<(), EngineError>;

    fn received_hangup(&mut self, call_id: CallId, remote_device: DeviceId)
        -> Result<(), EngineError>;

    fn received_busy(&mut self, call_id: CallId, remote_device: DeviceId)
        -> Result<(), EngineError>;

    fn proceed(&mut self, params: ProceedParams<'_>) -> Result<(), EngineError>;

    fn accept_call(&mut self, call_id: CallId) -> Result<(), EngineError>;

    /// Hang up whatever 1:1 call the engine currently has
    fn hangup(&mut self) -> Result<(), EngineError>;

    fn set_audio_enabled(&mut self, enabled: bool) -> Result<(), EngineError>;

    fn set_video_enabled(&mut self, call_id: CallId, enabled: bool) -> Result<(), EngineError>;

    // Group calls

    fn create_group_call(&mut self, group_id: &GroupId) -> Result<GroupCallHandle, EngineError>;

    fn connect(&mut self, call: &GroupCallHandle) -> Result<(), EngineError>;

    fn join(&mut self, call: &GroupCallHandle) -> Result<(), EngineError>;

    /// Leave and release the session
    fn disconnect(&mut self, call: GroupCallHandle) -> Result<(), EngineError>;

    fn set_outgoing_audio_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError>;

    fn set_outgoing_video_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError>;

    fn set_bandwidth_mode(
        &mut self,
        call: &GroupCallHandle,
        mode: BandwidthMode,
    ) -> Result<(), EngineError>;
}

/// Engine that performs no media work and only logs what it was asked.
///
/// Used by the trace replay binary, where engine callbacks are part of the
/// recorded trace rather than produced live.
#[derive(Debug, Default)]
pub struct DryRunEngine {
    next_group_call: u64,
    /// Group calls that have been connected and not yet released
    connected: HashSet<u64>,
}

impl DryRunEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaEngine for DryRunEngine {
    fn start_outgoing_call(
        &mut self,
        recipient: &Recipient,
        offer_type: OfferType,
    ) -> Result<CallId, EngineError> {
        let call_id = CallId(rand::thread_rng().gen());
        tracing::info!(recipient = %recipient.id, ?offer_type, %call_id, "engine: start outgoing call");
        Ok(call_id)
    }

    fn received_offer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        offer_type: OfferType,
        payload: &Opaque,
    ) -> Result<(), EngineError> {
        tracing::info!(%call_id, device = %remote_device, ?offer_type, ?payload, "engine: received offer");
        Ok(())
    }

    fn received_answer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        payload: &Opaque,
    ) -> Result<(), EngineError> {
        tracing::info!(%call_id, device = %remote_device, ?payload, "engine: received answer");
        Ok(())
    }

    fn received_ice_candidates(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        candidates: &[IceCandidate],
    ) -> Result<(), EngineError> {
        tracing::info!(%call_id, device = %remote_device, count = candidates.len(), "engine: received ice candidates");
        Ok(())
    }

    fn received_hangup(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
    ) -> Result<(), EngineError> {
        tracing::info!(%call_id, device = %remote_device, "engine: received hangup");
        Ok(())
    }

    fn received_busy(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
    ) -> Result<(), EngineError> {
        tracing::info!(%call_id, device = %remote_device, "engine: received busy");
        Ok(())
    }

    fn proceed(&mut self, params: ProceedParams<'_>) -> Result<(), EngineError> {
        tracing::info!(
            call_id = %params.call_id,
            servers = params.ice_servers.len(),
            hide_ip = params.hide_ip,
            enable_video = params.enable_video,
            "engine: proceed"
        );
        Ok(())
    }

    fn accept_call(&mut self, call_id: CallId) -> Result<(), EngineError> {
        tracing::info!(%call_id, "engine: accept");
        Ok(())
    }

    fn hangup(&mut self) -> Result<(), EngineError> {
        tracing::info!("engine: hangup");
        Ok(())
    }

    fn set_audio_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        tracing::info!(enabled, "engine: audio enabled");
        Ok(())
    }

    fn set_video_enabled(&mut self, call_id: CallId, enabled: bool) -> Result<(), EngineError> {
        tracing::info!(%call_id, enabled, "engine: video enabled");
        Ok(())
    }

    fn create_group_call(&mut self, group_id: &GroupId) -> Result<GroupCallHandle, EngineError> {
        self.next_group_call += 1;
        tracing::info!(%group_id, handle = self.next_group_call, "engine: create group call");
        Ok(GroupCallHandle::new(self.next_group_call, group_id.clone()))
    }

    fn connect(&mut self, call: &GroupCallHandle) -> Result<(), EngineError> {
        tracing::info!(handle = call.raw(), "engine: connect");
        self.connected.insert(call.raw());
        Ok(())
    }

    fn join(&mut self, call: &GroupCallHandle) -> Result<(), EngineError> {
        if !self.connected.contains(&call.raw()) {
            return Err(EngineError::invalid_state(format!(
                "group call {} joined before connect",
                call.raw()
            )));
        }
        tracing::info!(handle = call.raw(), "engine: join");
        Ok(())
    }

    fn disconnect(&mut self, call: GroupCallHandle) -> Result<(), EngineError> {
        tracing::info!(handle = call.raw(), "engine: disconnect");
        self.connected.remove(&call.raw());
        Ok(())
    }

    fn set_outgoing_audio_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError> {
        tracing::info!(handle = call.raw(), muted, "engine: outgoing audio muted");
        Ok(())
    }

    fn set_outgoing_video_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError> {
        tracing::info!(handle = call.raw(), muted, "engine: outgoing video muted");
        Ok(())
    }

    fn set_bandwidth_mode(
        &mut self,
        call: &GroupCallHandle,
        mode: BandwidthMode,
    ) -> Result<(), EngineError> {
        tracing::info!(handle = call.raw(), ?mode, "engine: bandwidth mode");
        Ok(())
    }
}
