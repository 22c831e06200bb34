//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::db::{CallKind, Database};
use crate::signaling::{Destination, SignalingMessage};
use crate::state_machine::{AudioCommand, PhoneState, Recipient, RecipientId, SendFailure};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Delivery of signaling messages to remote devices
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message. Completes once the message is handed off; the
    /// runtime never has two sends in flight.
    async fn send(
        &self,
        recipient: &Recipient,
        message: &SignalingMessage,
        destination: Destination,
    ) -> Result<(), SendFailure>;
}

/// Best-effort call history
#[async_trait]
pub trait CallLog: Send + Sync {
    async fn insert_received_call(&self, peer: RecipientId, had_video: bool)
        -> Result<(), String>;

    async fn insert_missed_call(
        &self,
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    ) -> Result<(), String>;
}

/// Platform telephony and audio routing
#[async_trait]
pub trait DeviceControls: Send + Sync {
    async fn update_phone_state(&self, state: PhoneState);

    async fn configure_audio(&self, command: AudioCommand);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        recipient: &Recipient,
        message: &SignalingMessage,
        destination: Destination,
    ) -> Result<(), SendFailure> {
        (**self).send(recipient, message, destination).await
    }
}

#[async_trait]
impl<T: CallLog + ?Sized> CallLog for Arc<T> {
    async fn insert_received_call(
        &self,
        peer: RecipientId,
        had_video: bool,
    ) -> Result<(), String> {
        (**self).insert_received_call(peer, had_video).await
    }

    async fn insert_missed_call(
        &self,
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    ) -> Result<(), String> {
        (**self).insert_missed_call(peer, at, had_video).await
    }
}

#[async_trait]
impl<T: DeviceControls + ?Sized> DeviceControls for Arc<T> {
    async fn update_phone_state(&self, state: PhoneState) {
        (**self).update_phone_state(state).await;
    }

    async fn configure_audio(&self, command: AudioCommand) {
        (**self).configure_audio(command).await;
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as `CallLog`
#[derive(Clone)]
pub struct SqliteCallLog {
    db: Database,
}

impl SqliteCallLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CallLog for SqliteCallLog {
    async fn insert_received_call(
        &self,
        peer: RecipientId,
        had_video: bool,
    ) -> Result<(), String> {
        self.db
            .insert_call(peer, CallKind::Received, had_video, Utc::now())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn insert_missed_call(
        &self,
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    ) -> Result<(), String> {
        self.db
            .insert_call(peer, CallKind::Missed, had_video, at)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Transport that encodes every outbound message and writes it to the log.
///
/// Stands in for the messaging layer when replaying traces.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(
        &self,
        recipient: &Recipient,
        message: &SignalingMessage,
        destination: Destination,
    ) -> Result<(), SendFailure> {
        let bytes = message.encode().map_err(|e| {
            tracing::error!(kind = message.kind(), error = %e, "transport: encode failed");
            SendFailure::Network
        })?;
        tracing::info!(
            recipient = %recipient.id,
            kind = message.kind(),
            call_id = %message.call_id(),
            ?destination,
            bytes = bytes.len(),
            "transport: send"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDeviceControls;

#[async_trait]
impl DeviceControls for LoggingDeviceControls {
    async fn update_phone_state(&self, state: PhoneState) {
        tracing::info!(?state, "device: phone state");
    }

    async fn configure_audio(&self, command: AudioCommand) {
        tracing::info!(?command, "device: audio");
    }
}
