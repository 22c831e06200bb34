//! Mock implementations for testing
//!
//! These mocks enable integration testing without a media engine or real I/O.

use super::traits::*;
use super::{CallRuntime, RuntimeError, RuntimeEvent, RuntimeHandle};
use crate::config::CallConfig;
use crate::db::CallKind;
use crate::engine::{BandwidthMode, EngineError, GroupCallHandle, MediaEngine, ProceedParams};
use crate::signaling::{Destination, IceCandidate, IceServer, OfferType, Opaque, SignalingMessage};
use crate::state_machine::{
    Action, AudioCommand, CallId, CallSnapshot, DeviceId, GroupId, Mode, PhoneState, Recipient,
    RecipientDirectory, RecipientId, SendFailure, ServiceState, UuidDirectory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Person recipient whose service id is derived from `id`
pub fn person(id: u64) -> Recipient {
    Recipient::person(RecipientId(id), Uuid::from_u64_pair(id, 1), true)
}

pub fn group(id: u64, group_id: &[u8]) -> Recipient {
    Recipient::group(RecipientId(id), GroupId::new(group_id.to_vec()))
}

// ============================================================================
// Mock Media Engine
// ============================================================================

/// One call made against [`MockEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    StartOutgoingCall {
        recipient: RecipientId,
        offer_type: OfferType,
    },
    ReceivedOffer {
        call_id: CallId,
        device: DeviceId,
        offer_type: OfferType,
    },
    ReceivedAnswer {
        call_id: CallId,
        device: DeviceId,
    },
    ReceivedIceCandidates {
        call_id: CallId,
        device: DeviceId,
        candidates: Vec<IceCandidate>,
    },
    ReceivedHangup {
        call_id: CallId,
        device: DeviceId,
    },
    ReceivedBusy {
        call_id: CallId,
        device: DeviceId,
    },
    Proceed {
        call_id: CallId,
        hide_ip: bool,
        enable_video: bool,
        servers: Vec<IceServer>,
    },
    AcceptCall(CallId),
    Hangup,
    SetAudioEnabled(bool),
    SetVideoEnabled {
        call_id: CallId,
        enabled: bool,
    },
    CreateGroupCall(GroupId),
    Connect(u64),
    Join(u64),
    Disconnect(u64),
    SetOutgoingAudioMuted {
        handle: u64,
        muted: bool,
    },
    SetOutgoingVideoMuted {
        handle: u64,
        muted: bool,
    },
    SetBandwidthMode {
        handle: u64,
        mode: BandwidthMode,
    },
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::StartOutgoingCall { .. } => "start_outgoing_call",
            EngineCall::ReceivedOffer { .. } => "received_offer",
            EngineCall::ReceivedAnswer { .. } => "received_answer",
            EngineCall::ReceivedIceCandidates { .. } => "received_ice_candidates",
            EngineCall::ReceivedHangup { .. } => "received_hangup",
            EngineCall::ReceivedBusy { .. } => "received_busy",
            EngineCall::Proceed { .. } => "proceed",
            EngineCall::AcceptCall(_) => "accept_call",
            EngineCall::Hangup => "hangup",
            EngineCall::SetAudioEnabled(_) => "set_audio_enabled",
            EngineCall::SetVideoEnabled { .. } => "set_video_enabled",
            EngineCall::CreateGroupCall(_) => "create_group_call",
            EngineCall::Connect(_) => "connect",
            EngineCall::Join(_) => "join",
            EngineCall::Disconnect(_) => "disconnect",
            EngineCall::SetOutgoingAudioMuted { .. } => "set_outgoing_audio_muted",
            EngineCall::SetOutgoingVideoMuted { .. } => "set_outgoing_video_muted",
            EngineCall::SetBandwidthMode { .. } => "set_bandwidth_mode",
        }
    }
}

#[derive(Default)]
struct EngineLog {
    calls: Vec<EngineCall>,
    failures: HashMap<&'static str, EngineError>,
    next_id: u64,
}

/// Media engine that records every call. Clones share the same record, so a
/// test can keep one while the runtime owns another.
#[derive(Clone, Default)]
pub struct MockEngine {
    log: Arc<Mutex<EngineLog>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` fail with `error`
    pub fn fail_on(self, operation: &'static str, error: EngineError) -> Self {
        self.log.lock().unwrap().failures.insert(operation, error);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    /// Candidates applied for one device, flattened in engine order
    pub fn candidates_for(&self, device: DeviceId) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::ReceivedIceCandidates {
                    device: d,
                    candidates,
                    ..
                } if d == device => Some(candidates),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        let mut log = self.log.lock().unwrap();
        let failure = log.failures.get(call.name()).cloned();
        log.calls.push(call);
        failure.map_or(Ok(()), Err)
    }

    fn next_id(&self) -> u64 {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        log.next_id
    }
}

impl MediaEngine for MockEngine {
    fn start_outgoing_call(
        &mut self,
        recipient: &Recipient,
        offer_type: OfferType,
    ) -> Result<CallId, EngineError> {
        self.record(EngineCall::StartOutgoingCall {
            recipient: recipient.id,
            offer_type,
        })?;
        Ok(CallId(1000 + self.next_id()))
    }

    fn received_offer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        offer_type: OfferType,
        _payload: &Opaque,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ReceivedOffer {
            call_id,
            device: remote_device,
            offer_type,
        })
    }

    fn received_answer(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        _payload: &Opaque,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ReceivedAnswer {
            call_id,
            device: remote_device,
        })
    }

    fn received_ice_candidates(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
        candidates: &[IceCandidate],
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ReceivedIceCandidates {
            call_id,
            device: remote_device,
            candidates: candidates.to_vec(),
        })
    }

    fn received_hangup(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ReceivedHangup {
            call_id,
            device: remote_device,
        })
    }

    fn received_busy(
        &mut self,
        call_id: CallId,
        remote_device: DeviceId,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::ReceivedBusy {
            call_id,
            device: remote_device,
        })
    }

    fn proceed(&mut self, params: ProceedParams<'_>) -> Result<(), EngineError> {
        self.record(EngineCall::Proceed {
            call_id: params.call_id,
            hide_ip: params.hide_ip,
            enable_video: params.enable_video,
            servers: params.ice_servers.to_vec(),
        })
    }

    fn accept_call(&mut self, call_id: CallId) -> Result<(), EngineError> {
        self.record(EngineCall::AcceptCall(call_id))
    }

    fn hangup(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Hangup)
    }

    fn set_audio_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.record(EngineCall::SetAudioEnabled(enabled))
    }

    fn set_video_enabled(&mut self, call_id: CallId, enabled: bool) -> Result<(), EngineError> {
        self.record(EngineCall::SetVideoEnabled { call_id, enabled })
    }

    fn create_group_call(&mut self, group_id: &GroupId) -> Result<GroupCallHandle, EngineError> {
        self.record(EngineCall::CreateGroupCall(group_id.clone()))?;
        Ok(GroupCallHandle::new(self.next_id(), group_id.clone()))
    }

    fn connect(&mut self, call: &GroupCallHandle) -> Result<(), EngineError> {
        self.record(EngineCall::Connect(call.raw()))
    }

    fn join(&mut self, call: &GroupCallHandle) -> Result<(), EngineError> {
        self.record(EngineCall::Join(call.raw()))
    }

    fn disconnect(&mut self, call: GroupCallHandle) -> Result<(), EngineError> {
        self.record(EngineCall::Disconnect(call.raw()))
    }

    fn set_outgoing_audio_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SetOutgoingAudioMuted {
            handle: call.raw(),
            muted,
        })
    }

    fn set_outgoing_video_muted(
        &mut self,
        call: &GroupCallHandle,
        muted: bool,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SetOutgoingVideoMuted {
            handle: call.raw(),
            muted,
        })
    }

    fn set_bandwidth_mode(
        &mut self,
        call: &GroupCallHandle,
        mode: BandwidthMode,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SetBandwidthMode {
            handle: call.raw(),
            mode,
        })
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Directory backed by a fixed map; unknown ids resolve like [`UuidDirectory`]
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    members: HashMap<Uuid, Recipient>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service_id: Uuid, recipient: Recipient) -> Self {
        self.members.insert(service_id, recipient);
        self
    }
}

impl RecipientDirectory for StaticDirectory {
    fn resolve(&self, service_id: Uuid) -> Recipient {
        self.members
            .get(&service_id)
            .cloned()
            .unwrap_or_else(|| UuidDirectory.resolve(service_id))
    }
}

// ============================================================================
// Recording collaborators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub recipient: Recipient,
    pub message: SignalingMessage,
    pub destination: Destination,
}

/// Transport that records sends, optionally failing every one of them
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<RecordedMessage>>,
    failure: Option<SendFailure>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failure: SendFailure) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(failure),
        }
    }

    pub fn sent(&self) -> Vec<RecordedMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        recipient: &Recipient,
        message: &SignalingMessage,
        destination: Destination,
    ) -> Result<(), SendFailure> {
        self.sent.lock().unwrap().push(RecordedMessage {
            recipient: recipient.clone(),
            message: message.clone(),
            destination,
        });
        self.failure.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub peer: RecipientId,
    pub kind: CallKind,
    pub had_video: bool,
    pub at: Option<DateTime<Utc>>,
}

/// In-memory call log for testing
#[derive(Default)]
pub struct InMemoryCallLog {
    entries: Mutex<Vec<HistoryRecord>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl InMemoryCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call log whose writes always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Writes requested so far, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> Vec<HistoryRecord> {
        self.entries.lock().unwrap().clone()
    }

    fn insert(&self, record: HistoryRecord) -> Result<(), String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("call log unavailable".to_string());
        }
        self.entries.lock().unwrap().push(record);
        Ok(())
    }
}

#[async_trait]
impl CallLog for InMemoryCallLog {
    async fn insert_received_call(
        &self,
        peer: RecipientId,
        had_video: bool,
    ) -> Result<(), String> {
        self.insert(HistoryRecord {
            peer,
            kind: CallKind::Received,
            had_video,
            at: None,
        })
    }

    async fn insert_missed_call(
        &self,
        peer: RecipientId,
        at: DateTime<Utc>,
        had_video: bool,
    ) -> Result<(), String> {
        self.insert(HistoryRecord {
            peer,
            kind: CallKind::Missed,
            had_video,
            at: Some(at),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Phone(PhoneState),
    Audio(AudioCommand),
}

#[derive(Default)]
pub struct RecordingDeviceControls {
    events: Mutex<Vec<DeviceEvent>>,
}

impl RecordingDeviceControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn phone_states(&self) -> Vec<PhoneState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::Phone(state) => Some(state),
                DeviceEvent::Audio(_) => None,
            })
            .collect()
    }

    pub fn audio_commands(&self) -> Vec<AudioCommand> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::Audio(command) => Some(command),
                DeviceEvent::Phone(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeviceControls for RecordingDeviceControls {
    async fn update_phone_state(&self, state: PhoneState) {
        self.events.lock().unwrap().push(DeviceEvent::Phone(state));
    }

    async fn configure_audio(&self, command: AudioCommand) {
        self.events.lock().unwrap().push(DeviceEvent::Audio(command));
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

type MockRuntime =
    CallRuntime<Arc<RecordingTransport>, Arc<InMemoryCallLog>, Arc<RecordingDeviceControls>>;

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub handle: RuntimeHandle,
    pub engine: MockEngine,
    pub transport: Arc<RecordingTransport>,
    pub call_log: Arc<InMemoryCallLog>,
    pub devices: Arc<RecordingDeviceControls>,
    events: broadcast::Receiver<RuntimeEvent>,
    latest: Option<Arc<CallSnapshot>>,
    runtime_task: tokio::task::JoinHandle<Result<(), RuntimeError>>,
}

impl TestRuntime {
    /// Create a test runtime builder with recording mocks
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }

    pub async fn send(&self, action: Action) {
        self.handle
            .send(action)
            .await
            .expect("runtime stopped before action was queued");
    }

    /// Wait until every queued action and its effects have run
    pub async fn flush(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.handle.flush())
            .await
            .expect("flush timed out")
            .expect("runtime stopped during flush");
    }

    /// Latest snapshot published so far
    pub fn snapshot(&mut self) -> Arc<CallSnapshot> {
        while let Ok(event) = self.events.try_recv() {
            if let RuntimeEvent::Snapshot(snapshot) = event {
                self.latest = Some(snapshot);
            }
        }
        self.latest.clone().expect("no snapshot published yet")
    }

    /// Wait for a snapshot in `mode`, panicking after `timeout`
    pub async fn wait_for_mode(&mut self, mode: Mode, timeout: Duration) -> Arc<CallSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for mode {mode:?}"));
            match event {
                Ok(RuntimeEvent::Snapshot(snapshot)) => {
                    self.latest = Some(Arc::clone(&snapshot));
                    if snapshot.mode == mode {
                        return snapshot;
                    }
                }
                Ok(RuntimeEvent::Fatal { message }) => {
                    panic!("runtime failed while waiting for {mode:?}: {message}")
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("runtime stopped while waiting for {mode:?}")
                }
            }
        }
    }

    /// Wait for the runtime to report a fatal error and return its message
    pub async fn wait_for_fatal(&mut self, timeout: Duration) -> String {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for fatal error");
            match event {
                Ok(RuntimeEvent::Fatal { message }) => return message,
                Ok(RuntimeEvent::Snapshot(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("runtime stopped without a fatal error")
                }
            }
        }
    }

    /// Wait for the runtime loop to exit
    pub async fn join(self) -> Result<(), RuntimeError> {
        drop(self.handle);
        self.runtime_task.await.expect("runtime task panicked")
    }
}

pub struct TestRuntimeBuilder {
    engine: MockEngine,
    directory: StaticDirectory,
    transport: RecordingTransport,
    call_log: InMemoryCallLog,
    state: Option<ServiceState>,
    config: CallConfig,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            engine: MockEngine::new(),
            directory: StaticDirectory::new(),
            transport: RecordingTransport::new(),
            call_log: InMemoryCallLog::new(),
            state: None,
            config: CallConfig::default(),
        }
    }

    pub fn with_engine(mut self, engine: MockEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Resolve `service_id` to `recipient` in the directory
    pub fn with_member(mut self, service_id: Uuid, recipient: Recipient) -> Self {
        self.directory = self.directory.with(service_id, recipient);
        self
    }

    pub fn with_send_failure(mut self, failure: SendFailure) -> Self {
        self.transport = RecordingTransport::failing(failure);
        self
    }

    pub fn with_failing_call_log(mut self) -> Self {
        self.call_log = InMemoryCallLog::failing();
        self
    }

    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn always_relay(mut self) -> Self {
        self.config.always_relay = true;
        self
    }

    pub fn build(self) -> TestRuntime {
        let transport = Arc::new(self.transport);
        let call_log = Arc::new(self.call_log);
        let devices = Arc::new(RecordingDeviceControls::new());

        let (mut runtime, handle): (MockRuntime, RuntimeHandle) = CallRuntime::new(
            &self.config,
            Box::new(self.engine.clone()),
            Arc::new(self.directory),
            Arc::clone(&transport),
            Arc::clone(&call_log),
            Arc::clone(&devices),
        );
        if let Some(state) = self.state {
            runtime = runtime.with_state(state);
        }

        // Subscribe before the loop starts so the startup snapshot is seen
        let events = handle.subscribe();
        let runtime_task = tokio::spawn(runtime.run());

        TestRuntime {
            handle,
            engine: self.engine,
            transport,
            call_log,
            devices,
            events,
            latest: None,
            runtime_task,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_engine_scripted_failure() {
        let mut engine = MockEngine::new().fail_on("join", EngineError::rejected("full"));
        let observer = engine.clone();

        let handle = engine.create_group_call(&GroupId::new(vec![1])).unwrap();
        engine.connect(&handle).unwrap();
        assert!(engine.join(&handle).is_err());
        engine.disconnect(handle).unwrap();

        assert_eq!(observer.count("join"), 1);
        assert_eq!(
            observer.calls().last().map(EngineCall::name),
            Some("disconnect")
        );
    }

    #[test]
    fn test_static_directory_falls_back_to_uuid() {
        let known = Uuid::from_u64_pair(1, 1);
        let directory = StaticDirectory::new().with(known, person(50));
        assert_eq!(directory.resolve(known), person(50));
        assert_eq!(
            directory.resolve(Uuid::from_u64_pair(9, 9)).id,
            RecipientId(9)
        );
    }

    #[tokio::test]
    async fn test_always_relay_hides_ip_for_contacts() {
        let mut rt = TestRuntime::new().always_relay().build();
        rt.send(Action::ReceivedOffer {
            call_id: CallId(3),
            remote_device: DeviceId(1),
            sender: person(2),
            offer_type: OfferType::Audio,
            payload: Opaque(vec![1]),
        })
        .await;
        rt.send(Action::TurnServerUpdate {
            ice_servers: Vec::new(),
        })
        .await;
        rt.flush().await;

        assert_eq!(rt.snapshot().mode, Mode::Incoming);
        assert!(rt.engine.calls().contains(&EngineCall::Proceed {
            call_id: CallId(3),
            hide_ip: true,
            enable_video: false,
            servers: Vec::new(),
        }));
    }
}
