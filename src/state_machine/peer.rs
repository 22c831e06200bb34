//! One-to-one call counterpart and its lifecycle

use super::ids::{CallId, DeviceId, RecipientId};
use super::recipient::Recipient;
use super::transition::TransitionError;
use serde::Serialize;

/// Lifecycle of a remote peer.
///
/// `Idle -> {Dialing | LocalRinging | RemoteRinging} -> Connected -> Ended`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    Idle,
    Dialing,
    /// Remote side is ringing (outgoing call)
    RemoteRinging,
    /// This device is ringing (incoming call)
    LocalRinging,
    Connected,
    Ended,
}

impl PeerState {
    pub fn can_advance_to(self, next: PeerState) -> bool {
        use PeerState::{Connected, Dialing, Ended, Idle, LocalRinging, RemoteRinging};
        match (self, next) {
            (Ended, _) => false,
            (_, Ended) => true,
            steps => matches!(
                steps,
                (Idle, Dialing | LocalRinging)
                    | (Dialing, RemoteRinging)
                    | (Dialing | RemoteRinging | LocalRinging, Connected)
            ),
        }
    }

    pub fn is_ringing(self) -> bool {
        matches!(self, PeerState::LocalRinging | PeerState::RemoteRinging)
    }
}

/// The other side of a 1:1 call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotePeer {
    recipient: Recipient,
    state: PeerState,
    call_id: Option<CallId>,
    remote_device: Option<DeviceId>,
}

impl RemotePeer {
    pub fn new(recipient: Recipient) -> Self {
        Self {
            recipient,
            state: PeerState::Idle,
            call_id: None,
            remote_device: None,
        }
    }

    /// Peer for an inbound offer: the call id and device are known up front
    pub fn answering(recipient: Recipient, call_id: CallId, remote_device: DeviceId) -> Self {
        Self {
            recipient,
            state: PeerState::Idle,
            call_id: Some(call_id),
            remote_device: Some(remote_device),
        }
    }

    pub fn id(&self) -> RecipientId {
        self.recipient.id
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call_id
    }

    pub fn remote_device(&self) -> Option<DeviceId> {
        self.remote_device
    }

    pub fn require_call_id(&self) -> Result<CallId, TransitionError> {
        self.call_id.ok_or_else(|| {
            TransitionError::PreconditionViolated(format!(
                "peer {} has no call id",
                self.recipient.id
            ))
        })
    }

    /// Whether an engine callback for `call_id` belongs to this peer
    pub fn matches(&self, call_id: CallId) -> bool {
        self.call_id == Some(call_id)
    }

    pub fn dialing(&mut self, call_id: CallId) -> bool {
        if self.advance(PeerState::Dialing) {
            self.call_id = Some(call_id);
            true
        } else {
            false
        }
    }

    pub fn local_ringing(&mut self) -> bool {
        self.advance(PeerState::LocalRinging)
    }

    pub fn remote_ringing(&mut self) -> bool {
        self.advance(PeerState::RemoteRinging)
    }

    pub fn connected(&mut self) -> bool {
        self.advance(PeerState::Connected)
    }

    pub fn ended(&mut self) -> bool {
        self.advance(PeerState::Ended)
    }

    /// Apply a lifecycle step; rejected steps leave the peer untouched
    fn advance(&mut self, next: PeerState) -> bool {
        if self.state.can_advance_to(next) {
            tracing::debug!(
                peer = %self.recipient.id,
                from = ?self.state,
                to = ?next,
                "peer state change"
            );
            self.state = next;
            true
        } else {
            tracing::warn!(
                peer = %self.recipient.id,
                from = ?self.state,
                to = ?next,
                "rejected peer state change"
            );
            false
        }
    }
}
