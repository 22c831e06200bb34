//! Call runtime
//!
//! Owns the current [`ServiceState`](crate::state_machine::ServiceState) and
//! applies actions one at a time from a single queue. User actions, engine
//! callbacks and collaborator results all arrive on that queue, so no two
//! transitions ever interleave. Effects are handed to FIFO workers and never
//! awaited on the action path.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::CallRuntime;
pub use traits::*;

use crate::signaling::{ProtocolError, SignalingMessage};
use crate::state_machine::{
    Action, CallSnapshot, DeviceId, InvariantViolation, RecipientDirectory, TransitionError,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Runtime wired to the production adapters
pub type ProductionRuntime = CallRuntime<LoggingTransport, SqliteCallLog, LoggingDeviceControls>;

/// Events published to subscribers
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// State after an action was applied (and once at startup)
    Snapshot(Arc<CallSnapshot>),
    /// The runtime hit an unrecoverable error and stopped
    Fatal { message: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("call runtime is not running")]
    Stopped,
    #[error("{action} failed: {source}")]
    Transition {
        action: &'static str,
        #[source]
        source: TransitionError,
    },
    #[error("{action} left the state inconsistent: {source}")]
    Invariant {
        action: &'static str,
        #[source]
        source: InvariantViolation,
    },
}

pub(crate) enum Command {
    Apply(Action),
    /// Reply once every effect queued so far has been executed
    Barrier(oneshot::Sender<()>),
}

/// Handle to interact with a running call runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RuntimeEvent>,
    directory: Arc<dyn RecipientDirectory>,
    cancel: CancellationToken,
}

impl RuntimeHandle {
    /// Queue an action behind everything already submitted
    pub async fn send(&self, action: Action) -> Result<(), RuntimeError> {
        self.command_tx
            .send(Command::Apply(action))
            .await
            .map_err(|_| RuntimeError::Stopped)
    }

    /// Decode an inbound signaling message and queue the matching action.
    ///
    /// Malformed input is logged and dropped; it never reaches the state.
    pub async fn deliver_signaling(
        &self,
        sender: Uuid,
        source_device: DeviceId,
        bytes: &[u8],
    ) -> Result<(), RuntimeError> {
        let message = match SignalingMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                log_protocol_error(&e, sender, source_device);
                return Ok(());
            }
        };
        let sender = self.directory.resolve(sender);
        self.send(message.into_action(sender, source_device)).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events_tx.subscribe()
    }

    /// Wait until every action queued before this call has been applied and
    /// its effects executed
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Barrier(reply_tx))
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        reply_rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Stop the runtime loop. Actions still queued are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn log_protocol_error(error: &ProtocolError, sender: Uuid, device: DeviceId) {
    tracing::warn!(%sender, %device, error = %error, "dropping signaling message");
}
