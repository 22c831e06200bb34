//! Call session state machine
//!
//! Every action is applied by a pure transition over an owned snapshot;
//! the runtime executes the resulting effects.

pub mod action;
mod builder;
mod delegates;
mod effect;
pub mod ids;
pub mod participant;
pub mod peer;
mod processors;
pub mod recipient;
pub mod state;
pub(crate) mod transition;
pub mod view;


pub use action::{Action, LocalEndReason, RemoteEndReason, SendFailure};
pub use builder::ServiceStateBuilder;
pub use effect::{AudioCommand, Effect, PhoneState};
pub use ids::{CallId, DeviceId, GroupId, RecipientId};
pub use participant::{CallParticipant, CameraState, VideoSink};
pub use peer::{PeerState, RemotePeer};
pub use recipient::{Recipient, RecipientDirectory, UuidDirectory};
pub use state::{
    CallState, GroupCallState, GroupConnectionState, GroupJoinState, InvariantViolation, Mode,
    ServiceState,
};
pub use transition::{transition, CallContext, TransitionError, TransitionResult};
pub use view::CallSnapshot;
