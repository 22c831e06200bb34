//! Call runtime executor

use super::traits::{CallLog, DeviceControls, Transport};
use super::{Command, RuntimeError, RuntimeEvent, RuntimeHandle};

use crate::config::CallConfig;
use crate::engine::MediaEngine;
use crate::signaling::{Destination, SignalingMessage};
use crate::state_machine::{
    transition, Action, AudioCommand, CallContext, CallSnapshot, Effect, PhoneState, Recipient,
    RecipientDirectory, RecipientId, ServiceState,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Item on one of the effect worker queues
enum Work<T> {
    Run(T),
    /// Acknowledge once everything queued before this has run
    Flush(oneshot::Sender<()>),
}

struct OutboundMessage {
    recipient: Recipient,
    message: SignalingMessage,
    destination: Destination,
}

enum DeviceCommand {
    Phone(PhoneState),
    Audio(AudioCommand),
}

enum HistoryEntry {
    Received {
        peer: RecipientId,
        had_video: bool,
    },
    Missed {
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    },
}

/// Queues feeding the effect workers. Each worker drains its queue in order,
/// so effects of one kind execute in the order they were produced.
struct Workers {
    outbox: mpsc::UnboundedSender<Work<OutboundMessage>>,
    devices: mpsc::UnboundedSender<Work<DeviceCommand>>,
    history: mpsc::UnboundedSender<Work<HistoryEntry>>,
}

/// Generic call runtime that can work with any transport, call log, and
/// device implementations
pub struct CallRuntime<T, L, D>
where
    T: Transport + 'static,
    L: CallLog + 'static,
    D: DeviceControls + 'static,
{
    state: ServiceState,
    engine: Box<dyn MediaEngine>,
    directory: Arc<dyn RecipientDirectory>,
    transport: Arc<T>,
    call_log: Arc<L>,
    devices: Arc<D>,
    command_rx: mpsc::Receiver<Command>,
    /// Lets the outbox report send failures without keeping the queue open
    command_weak: mpsc::WeakSender<Command>,
    events_tx: broadcast::Sender<RuntimeEvent>,
    cancel: CancellationToken,
}

impl<T, L, D> CallRuntime<T, L, D>
where
    T: Transport + 'static,
    L: CallLog + 'static,
    D: DeviceControls + 'static,
{
    pub fn new(
        config: &CallConfig,
        engine: Box<dyn MediaEngine>,
        directory: Arc<dyn RecipientDirectory>,
        transport: T,
        call_log: L,
        devices: D,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.queue_depth);
        let (events_tx, _) = broadcast::channel(config.snapshot_buffer);
        let cancel = CancellationToken::new();

        let handle = RuntimeHandle {
            command_tx: command_tx.clone(),
            events_tx: events_tx.clone(),
            directory: Arc::clone(&directory),
            cancel: cancel.clone(),
        };

        let runtime = Self {
            state: ServiceState::new(config.always_relay),
            engine,
            directory,
            transport: Arc::new(transport),
            call_log: Arc::new(call_log),
            devices: Arc::new(devices),
            command_rx,
            command_weak: command_tx.downgrade(),
            events_tx,
            cancel,
        };

        (runtime, handle)
    }

    /// Start from an existing state instead of the startup state
    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = state;
        self
    }

    /// Process commands until every handle is dropped, shutdown is
    /// requested, or a fatal error occurs
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        tracing::info!(
            always_turn = self.state.call_setup.always_turn,
            "Starting call runtime"
        );

        let workers = self.spawn_workers();
        self.publish();

        let outcome = loop {
            let command = tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    tracing::info!("Call runtime shutdown requested");
                    break Ok(());
                }

                command = self.command_rx.recv() => command,
            };

            match command {
                Some(Command::Apply(action)) => {
                    if let Err(e) = self.apply(action, &workers) {
                        tracing::error!(error = %e, "Fatal call runtime error");
                        let _ = self.events_tx.send(RuntimeEvent::Fatal {
                            message: e.to_string(),
                        });
                        break Err(e);
                    }
                }
                Some(Command::Barrier(reply)) => Self::barrier(&workers, reply),
                None => break Ok(()),
            }
        };

        tracing::info!("Call runtime stopped");
        outcome
    }

    /// Apply one action: pure transition, invariant check, then hand the
    /// effects to the workers and publish the new snapshot
    fn apply(&mut self, action: Action, workers: &Workers) -> Result<(), RuntimeError> {
        let name = action.name();
        tracing::debug!(action = name, call_id = ?action.call_id(), mode = self.state.mode.name(), "Applying action");

        let state = std::mem::take(&mut self.state);
        let mut ctx = CallContext::new(self.engine.as_mut(), self.directory.as_ref(), Utc::now());
        let result = transition(state, &mut ctx, action)
            .map_err(|source| RuntimeError::Transition { action: name, source })?;

        result
            .new_state
            .check_invariants()
            .map_err(|source| RuntimeError::Invariant { action: name, source })?;

        self.state = result.new_state;

        for effect in result.effects {
            Self::dispatch_effect(workers, effect);
        }

        self.publish();
        Ok(())
    }

    fn dispatch_effect(workers: &Workers, effect: Effect) {
        let name = effect.name();
        let queued = match effect {
            Effect::SendCallMessage {
                recipient,
                message,
                destination,
            } => workers
                .outbox
                .send(Work::Run(OutboundMessage {
                    recipient,
                    message,
                    destination,
                }))
                .is_ok(),
            Effect::RecordReceivedCall { peer, had_video } => workers
                .history
                .send(Work::Run(HistoryEntry::Received { peer, had_video }))
                .is_ok(),
            Effect::RecordMissedCall {
                peer,
                at,
                had_video,
            } => workers
                .history
                .send(Work::Run(HistoryEntry::Missed {
                    peer,
                    at,
                    had_video,
                }))
                .is_ok(),
            Effect::UpdatePhoneState(state) => workers
                .devices
                .send(Work::Run(DeviceCommand::Phone(state)))
                .is_ok(),
            Effect::ConfigureAudio(command) => workers
                .devices
                .send(Work::Run(DeviceCommand::Audio(command)))
                .is_ok(),
        };

        if !queued {
            tracing::warn!(effect = name, "Effect worker has stopped, dropping effect");
        }
    }

    /// Flush every worker, then reply. Runs off the action path so later
    /// actions are not held up.
    fn barrier(workers: &Workers, reply: oneshot::Sender<()>) {
        let (outbox_tx, outbox_rx) = oneshot::channel();
        let (devices_tx, devices_rx) = oneshot::channel();
        let (history_tx, history_rx) = oneshot::channel();

        let _ = workers.outbox.send(Work::Flush(outbox_tx));
        let _ = workers.devices.send(Work::Flush(devices_tx));
        let _ = workers.history.send(Work::Flush(history_tx));

        tokio::spawn(async move {
            let _ = tokio::join!(outbox_rx, devices_rx, history_rx);
            let _ = reply.send(());
        });
    }

    fn publish(&self) {
        let snapshot = Arc::new(CallSnapshot::of(&self.state));
        // No subscribers is fine
        let _ = self.events_tx.send(RuntimeEvent::Snapshot(snapshot));
    }

    fn spawn_workers(&self) -> Workers {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (devices, devices_rx) = mpsc::unbounded_channel();
        let (history, history_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_outbox(
            Arc::clone(&self.transport),
            self.command_weak.clone(),
            outbox_rx,
        ));
        tokio::spawn(run_devices(Arc::clone(&self.devices), devices_rx));
        tokio::spawn(run_history(Arc::clone(&self.call_log), history_rx));

        Workers {
            outbox,
            devices,
            history,
        }
    }
}

/// Sends signaling messages strictly one at a time. A failed send re-enters
/// the runtime as [`Action::MessageSendFailed`].
async fn run_outbox<T: Transport>(
    transport: Arc<T>,
    commands: mpsc::WeakSender<Command>,
    mut rx: mpsc::UnboundedReceiver<Work<OutboundMessage>>,
) {
    while let Some(work) = rx.recv().await {
        let outbound = match work {
            Work::Run(outbound) => outbound,
            Work::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        let call_id = outbound.message.call_id();
        let kind = outbound.message.kind();
        let Err(failure) = transport
            .send(&outbound.recipient, &outbound.message, outbound.destination)
            .await
        else {
            tracing::debug!(%call_id, kind, destination = ?outbound.destination, "Sent signaling message");
            continue;
        };

        tracing::warn!(%call_id, kind, ?failure, "Signaling send failed");
        let Some(commands) = commands.upgrade() else {
            continue;
        };
        if commands
            .send(Command::Apply(Action::MessageSendFailed { call_id, failure }))
            .await
            .is_err()
        {
            tracing::debug!(%call_id, "Runtime stopped before send failure was reported");
        }
    }
}

async fn run_devices<D: DeviceControls>(
    devices: Arc<D>,
    mut rx: mpsc::UnboundedReceiver<Work<DeviceCommand>>,
) {
    while let Some(work) = rx.recv().await {
        match work {
            Work::Run(DeviceCommand::Phone(state)) => devices.update_phone_state(state).await,
            Work::Run(DeviceCommand::Audio(command)) => devices.configure_audio(command).await,
            Work::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// History writes are best-effort: failures are logged and never reach the
/// state machine
async fn run_history<L: CallLog>(
    call_log: Arc<L>,
    mut rx: mpsc::UnboundedReceiver<Work<HistoryEntry>>,
) {
    while let Some(work) = rx.recv().await {
        let (peer, result) = match work {
            Work::Run(HistoryEntry::Received { peer, had_video }) => {
                (peer, call_log.insert_received_call(peer, had_video).await)
            }
            Work::Run(HistoryEntry::Missed {
                peer,
                at,
                had_video,
            }) => (peer, call_log.insert_missed_call(peer, at, had_video).await),
            Work::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        if let Err(e) = result {
            tracing::warn!(%peer, error = %e, "Failed to record call history");
        }
    }
}
