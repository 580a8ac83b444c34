// ============================================================================
// File: packages/vmhost/src/test_support.rs
// ----------------------------------------------------------------------------
// In-process VM service used by the lifecycle and data-sync tests.
// ============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::config::{RemoteConfig, VmConfig};
use crate::lifecycle::{
    ControllerOptions, DeathReason, EventSink, LifecycleController, RemoteError, RemoteErrorKind,
    RemoteEvent, RemoteResult, RemoteVm, VirtualizationService, VmCallback, VmState, VsockStream,
};
use crate::platform::HostCapabilities;

pub(crate) const TEST_CID: u32 = 2049;

fn ready<T: Send + 'static>(value: T) -> AsyncTask<T> {
    AsyncTaskBuilder::new(async move { value }).spawn()
}

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Package file plus a config that points at it
pub(crate) fn test_config() -> (NamedTempFile, VmConfig) {
    let apk = NamedTempFile::new().expect("temp apk");
    let config = config_for(apk.path());
    (apk, config)
}

pub(crate) fn config_for(apk: &Path) -> VmConfig {
    VmConfig::builder()
        .with_apk_path(apk)
        .with_payload_binary_path("bin/payload")
        .with_protected_vm(false)
        .with_num_cpus(2)
        .build_for(&HostCapabilities::new(true, true, 8))
        .expect("valid test config")
}

/// Scriptable guest
#[derive(Debug)]
pub(crate) struct FakeVm {
    sink: Mutex<Option<EventSink>>,
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, RemoteErrorKind>>,
    auto_boot: AtomicBool,
    die_on_stop: AtomicBool,
    balloon: AtomicU64,
    guest_tx: mpsc::UnboundedSender<(u32, DuplexStream)>,
    guest_rx: Mutex<Option<mpsc::UnboundedReceiver<(u32, DuplexStream)>>>,
    console_name: Mutex<Option<String>>,
}

impl FakeVm {
    pub(crate) fn new() -> Arc<Self> {
        let (guest_tx, guest_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            sink: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            auto_boot: AtomicBool::new(true),
            die_on_stop: AtomicBool::new(true),
            balloon: AtomicU64::new(0),
            guest_tx,
            guest_rx: Mutex::new(Some(guest_rx)),
            console_name: Mutex::new(None),
        })
    }

    pub(crate) fn set_auto_boot(&self, on: bool) {
        self.auto_boot.store(on, Ordering::SeqCst);
    }

    pub(crate) fn set_die_on_stop(&self, on: bool) {
        self.die_on_stop.store(on, Ordering::SeqCst);
    }

    /// Make every later `operation` call fail with `kind`
    pub(crate) fn fail(&self, operation: &'static str, kind: RemoteErrorKind) {
        self.failures.lock().expect("failures").insert(operation, kind);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls").clone()
    }

    pub(crate) fn console_name(&self) -> Option<String> {
        self.console_name.lock().expect("console").clone()
    }

    /// Guest-side ends of every vsock connection the host opens
    pub(crate) fn guest_connections(&self) -> mpsc::UnboundedReceiver<(u32, DuplexStream)> {
        self.guest_rx
            .lock()
            .expect("guest rx")
            .take()
            .expect("guest connections taken twice")
    }

    /// Push an event as the VM service would
    pub(crate) fn emit(&self, event: RemoteEvent) -> bool {
        match self.sink.lock().expect("sink").as_ref() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }

    fn record(&self, operation: &'static str) -> RemoteResult<()> {
        self.calls.lock().expect("calls").push(operation);
        match self.failures.lock().expect("failures").get(operation) {
            Some(kind) => Err(RemoteError::new(*kind, format!("{operation} refused"))),
            None => Ok(()),
        }
    }
}

impl RemoteVm for FakeVm {
    fn cid(&self) -> u32 {
        TEST_CID
    }

    fn state(&self) -> AsyncTask<RemoteResult<VmState>> {
        ready(self.record("get_state").map(|()| VmState::Running))
    }

    fn register_callback(&self, sink: EventSink) -> AsyncTask<RemoteResult<()>> {
        let result = self.record("register_callback");
        if result.is_ok() {
            *self.sink.lock().expect("sink") = Some(sink);
        }
        ready(result)
    }

    fn start(&self) -> AsyncTask<RemoteResult<()>> {
        let result = self.record("start");
        if result.is_ok() && self.auto_boot.load(Ordering::SeqCst) {
            self.emit(RemoteEvent::Booted);
        }
        ready(result)
    }

    fn stop(&self) -> AsyncTask<RemoteResult<()>> {
        let result = self.record("stop");
        if result.is_ok() && self.die_on_stop.load(Ordering::SeqCst) {
            self.emit(RemoteEvent::Died {
                reason: DeathReason::Shutdown,
            });
        }
        ready(result)
    }

    fn suspend(&self) -> AsyncTask<RemoteResult<()>> {
        ready(self.record("suspend"))
    }

    fn resume(&self) -> AsyncTask<RemoteResult<()>> {
        ready(self.record("resume"))
    }

    fn memory_balloon(&self) -> AsyncTask<RemoteResult<u64>> {
        let result = self
            .record("get_memory_balloon")
            .map(|()| self.balloon.load(Ordering::SeqCst));
        ready(result)
    }

    fn set_memory_balloon(&self, bytes: u64) -> AsyncTask<RemoteResult<()>> {
        let result = self.record("set_memory_balloon");
        if result.is_ok() {
            self.balloon.store(bytes, Ordering::SeqCst);
        }
        ready(result)
    }

    fn connect_vsock(&self, port: u32) -> AsyncTask<RemoteResult<VsockStream>> {
        let result = self.record("connect_vsock").map(|()| {
            let (host, guest) = tokio::io::duplex(64 * 1024);
            let _ = self.guest_tx.send((port, guest));
            Box::new(host) as VsockStream
        });
        ready(result)
    }

    fn set_host_console_name(&self, name: String) -> AsyncTask<RemoteResult<()>> {
        let result = self.record("set_host_console_name");
        if result.is_ok() {
            *self.console_name.lock().expect("console") = Some(name);
        }
        ready(result)
    }
}

/// Service handing out one [`FakeVm`]
#[derive(Debug)]
pub(crate) struct FakeService {
    caps: HostCapabilities,
    vm: Arc<FakeVm>,
    fail_create: Mutex<Option<RemoteErrorKind>>,
    requests: Mutex<Vec<RemoteConfig>>,
}

impl FakeService {
    pub(crate) fn new(vm: Arc<FakeVm>) -> Arc<Self> {
        Self::with_caps(vm, HostCapabilities::new(true, true, 8))
    }

    pub(crate) fn with_caps(vm: Arc<FakeVm>, caps: HostCapabilities) -> Arc<Self> {
        Arc::new(Self {
            caps,
            vm,
            fail_create: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn fail_create(&self, kind: RemoteErrorKind) {
        *self.fail_create.lock().expect("fail_create") = Some(kind);
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }

    pub(crate) fn last_task_profiles(&self) -> Option<Vec<String>> {
        self.requests
            .lock()
            .expect("requests")
            .last()
            .map(|config| config.task_profiles.clone())
    }
}

impl VirtualizationService for FakeService {
    fn capabilities(&self) -> HostCapabilities {
        self.caps
    }

    fn create_vm(&self, config: RemoteConfig) -> AsyncTask<RemoteResult<Arc<dyn RemoteVm>>> {
        let result = match *self.fail_create.lock().expect("fail_create") {
            Some(kind) => Err(RemoteError::new(kind, "no VM for you")),
            None => {
                self.requests.lock().expect("requests").push(config);
                Ok(Arc::clone(&self.vm) as Arc<dyn RemoteVm>)
            }
        };
        ready(result)
    }
}

/// Controller over a fresh fake VM, not yet started
pub(crate) async fn controller_with(
    options: ControllerOptions,
) -> (NamedTempFile, Arc<FakeVm>, Arc<FakeService>, LifecycleController) {
    init_logging();
    let (apk, config) = test_config();
    let vm = FakeVm::new();
    let service = FakeService::new(Arc::clone(&vm));
    let controller = LifecycleController::create(service.clone(), config, options)
        .await
        .expect("create controller");
    (apk, vm, service, controller)
}

/// Controller whose VM has booted and whose boot notifications were delivered
pub(crate) async fn running_controller() -> (NamedTempFile, Arc<FakeVm>, LifecycleController) {
    let (apk, vm, _service, controller) = controller_with(ControllerOptions::new()).await;
    let boot = Arc::new(RecordingCallback::default());
    controller.register_callback(boot.clone());
    controller.start().await.expect("start");
    assert_eq!(boot.wait_for_transitions(2).await.len(), 2, "boot not delivered");
    controller.clear_callbacks();
    (apk, vm, controller)
}

/// Observer that records everything it sees
#[derive(Debug, Default)]
pub(crate) struct RecordingCallback {
    pub(crate) transitions: Mutex<Vec<(VmState, VmState)>>,
    pub(crate) events: Mutex<Vec<String>>,
}

impl RecordingCallback {
    pub(crate) fn transitions(&self) -> Vec<(VmState, VmState)> {
        self.transitions.lock().expect("transitions").clone()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().expect("events").clone()
    }

    /// Poll until `count` transitions were recorded
    pub(crate) async fn wait_for_transitions(&self, count: usize) -> Vec<(VmState, VmState)> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let seen = self.transitions();
            if seen.len() >= count || tokio::time::Instant::now() >= deadline {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl VmCallback for RecordingCallback {
    fn on_state_changed(&self, from: VmState, to: VmState) {
        self.transitions.lock().expect("transitions").push((from, to));
    }

    fn on_payload_ready(&self) {
        self.events.lock().expect("events").push("payload_ready".into());
    }

    fn on_payload_finished(&self, exit_code: i32) {
        self.events
            .lock()
            .expect("events")
            .push(format!("payload_finished:{exit_code}"));
    }

    fn on_error(&self, code: i32, message: &str) {
        self.events
            .lock()
            .expect("events")
            .push(format!("error:{code}:{message}"));
    }

    fn on_died(&self, reason: DeathReason) {
        self.events
            .lock()
            .expect("events")
            .push(format!("died:{reason:?}"));
    }
}
