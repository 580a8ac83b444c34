// ============================================================================
// File: packages/vmhost/src/lifecycle/controller.rs
// ----------------------------------------------------------------------------
// LifecycleController: sole owner of one remote VM handle.
// ============================================================================

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::config::VmConfig;

use super::callback::{run_delivery, Observers, VmCallback};
use super::errors::{RemoteErrorKind, RemoteResult, VmError, VmResult};
use super::options::ControllerOptions;
use super::service::{EventSink, RemoteVm, VirtualizationService, VsockStream};
use super::state::{SessionState, VmState};

/// Await a remote call, folding a crashed request task into `Internal`
async fn await_remote<T>(
    operation: &'static str,
    task: AsyncTask<RemoteResult<T>>,
) -> VmResult<T> {
    match task.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            log::warn!("remote {operation} failed: {err}");
            Err(VmError::remote(operation, err))
        }
        Err(join_err) => {
            log::error!("remote {operation} task failed: {join_err}");
            Err(VmError::RemoteFailure {
                operation,
                kind: RemoteErrorKind::Internal,
                message: join_err.to_string(),
            })
        }
    }
}

/// Best-effort stop of a VM that no session will own
async fn release_vm(vm: &dyn RemoteVm) {
    let cid = vm.cid();
    match await_remote("stop", vm.stop()).await {
        Ok(()) => log::info!("vm {cid}: released after failed setup"),
        Err(err) => log::error!("vm {cid}: could not release after failed setup: {err}"),
    }
}

/// Stateful owner of a single VM session
///
/// Holds the remote VM handle for its whole lifetime; nothing else in the
/// process addresses the VM directly. Request methods may be called from any
/// task and block for the duration of the remote call. State-change
/// notifications are delivered on a separate per-session task.
pub struct LifecycleController {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    config: VmConfig,
    options: ControllerOptions,
    vm: Arc<dyn RemoteVm>,
    cid: u32,
    state: Arc<SessionState>,
    observers: Observers,
    delivery: AsyncTask<()>,
}

impl LifecycleController {
    /// Ask `service` to allocate a VM for `config`
    ///
    /// Nothing is allocated locally unless the service accepts the request.
    /// With `auto_start` set the VM is started before this returns. If setup
    /// fails after the service allocated a VM, that VM is stopped before the
    /// error is returned.
    pub async fn create(
        service: Arc<dyn VirtualizationService>,
        config: VmConfig,
        options: ControllerOptions,
    ) -> VmResult<Self> {
        config.check_host(&service.capabilities())?;
        let remote_config = config.to_remote_config()?;

        let vm = match service.create_vm(remote_config).await {
            Ok(Ok(vm)) => vm,
            Ok(Err(err)) => {
                log::error!("VM creation rejected: {err}");
                return Err(VmError::CreationFailed {
                    kind: err.kind,
                    message: err.message,
                });
            }
            Err(join_err) => {
                return Err(VmError::CreationFailed {
                    kind: RemoteErrorKind::Internal,
                    message: join_err.to_string(),
                });
            }
        };
        let cid = vm.cid();

        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(delivery_tx.clone());
        if let Err(err) = await_remote("register_callback", vm.register_callback(sink)).await {
            release_vm(vm.as_ref()).await;
            return Err(VmError::CreationFailed {
                kind: err.remote_kind().unwrap_or(RemoteErrorKind::Internal),
                message: err.to_string(),
            });
        }

        if let Some(name) = &options.console_name {
            let task = vm.set_host_console_name(name.clone());
            if let Err(err) = await_remote("set_host_console_name", task).await {
                log::warn!("vm {cid}: console name not applied: {err}");
            }
        }

        let state = Arc::new(SessionState::new(delivery_tx));
        let observers: Observers = Arc::new(RwLock::new(Vec::new()));
        let delivery = AsyncTaskBuilder::new(run_delivery(
            cid,
            delivery_rx,
            Arc::clone(&state),
            Arc::clone(&observers),
        ))
        .spawn();

        let controller = Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            options,
            vm,
            cid,
            state,
            observers,
            delivery,
        };
        log::info!(
            "vm {cid}: session {} created (protected={}, cpus={})",
            controller.session_id,
            controller.config.is_protected_vm(),
            controller.config.num_cpus()
        );

        if controller.options.auto_start {
            if let Err(err) = controller.start().await {
                release_vm(controller.vm.as_ref()).await;
                return Err(err);
            }
        }

        Ok(controller)
    }

    /// Start a VM that has not been started yet
    ///
    /// Returns once the service accepted the request; the session moves to
    /// RUNNING when the boot-complete event arrives.
    pub async fn start(&self) -> VmResult<()> {
        self.state
            .compare_and_set(VmState::NotStarted, VmState::Starting)
            .map_err(|state| VmError::IllegalStateTransition {
                operation: "start",
                state,
            })?;

        if let Err(err) = await_remote("start", self.vm.start()).await {
            let _ = self.state.compare_and_set(VmState::Starting, VmState::Dead);
            return Err(err);
        }
        Ok(())
    }

    /// Pause a running VM
    pub async fn suspend(&self) -> VmResult<()> {
        self.pause_or_resume("suspend", VmState::Running, VmState::Suspended)
            .await
    }

    /// Continue a suspended VM
    pub async fn resume(&self) -> VmResult<()> {
        self.pause_or_resume("resume", VmState::Suspended, VmState::Running)
            .await
    }

    async fn pause_or_resume(
        &self,
        operation: &'static str,
        from: VmState,
        to: VmState,
    ) -> VmResult<()> {
        let state = self.state.current();
        if state != from {
            return Err(VmError::IllegalStateTransition { operation, state });
        }

        let task = if to == VmState::Suspended {
            self.vm.suspend()
        } else {
            self.vm.resume()
        };
        await_remote(operation, task).await?;

        if let Err(current) = self.state.compare_and_set(from, to) {
            log::warn!(
                "vm {}: {operation} acknowledged but session is now {current}",
                self.cid
            );
        }
        Ok(())
    }

    /// Stop the VM and wait for the service to confirm termination
    ///
    /// Moves to STOPPING immediately. If no terminal event arrives within the
    /// configured grace period the session is forced to DEAD and
    /// `LifecycleInconsistency` is returned. Every caller that sees the
    /// session end DEAD instead of STOPPED gets that error.
    pub async fn stop(&self) -> VmResult<VmState> {
        let (previous, _) = self
            .state
            .transition(|state| (!state.is_terminal()).then_some(VmState::Stopping))
            .or_else(|state| {
                if state == VmState::Stopping {
                    Ok((VmState::Stopping, VmState::Stopping))
                } else {
                    Err(VmError::IllegalStateTransition {
                        operation: "stop",
                        state,
                    })
                }
            })?;

        if previous != VmState::Stopping {
            if let Err(err) = await_remote("stop", self.vm.stop()).await {
                self.force_dead();
                return Err(err);
            }
        }

        let mut rx = self.state.subscribe();
        let grace = self.options.stop_grace_period;
        let confirmed = tokio::time::timeout(grace, async {
            rx.wait_for(|state| state.is_terminal()).await.map(|state| *state)
        })
        .await;

        match confirmed {
            Ok(Ok(VmState::Dead)) => {
                let details = format!("vm {} ended {} while stopping", self.cid, VmState::Dead);
                log::error!("{details}");
                Err(VmError::LifecycleInconsistency { details })
            }
            Ok(Ok(state)) => Ok(state),
            _ => {
                self.force_dead();
                let details = format!(
                    "vm {} did not confirm stop within {:?}; session forced to {}",
                    self.cid,
                    grace,
                    VmState::Dead
                );
                log::error!("{details}");
                Err(VmError::LifecycleInconsistency { details })
            }
        }
    }

    fn force_dead(&self) {
        let _ = self
            .state
            .transition(|state| (!state.is_terminal()).then_some(VmState::Dead));
    }

    /// Open a new vsock connection to `port` on the guest
    ///
    /// Every call yields an independent stream. The controller does not cap
    /// the number of concurrent connections; the service may.
    pub async fn connect_vsock(&self, port: u32) -> VmResult<VsockStream> {
        let state = self.state.current();
        if state != VmState::Running {
            return Err(VmError::NotRunning { state });
        }
        log::debug!("vm {}: connecting vsock port {port}", self.cid);
        await_remote("connect_vsock", self.vm.connect_vsock(port)).await
    }

    /// Current balloon size in bytes, read from the service every time
    pub async fn memory_balloon(&self) -> VmResult<u64> {
        await_remote("get_memory_balloon", self.vm.memory_balloon()).await
    }

    /// Set the balloon size in bytes
    pub async fn set_memory_balloon(&self, bytes: u64) -> VmResult<()> {
        await_remote("set_memory_balloon", self.vm.set_memory_balloon(bytes)).await
    }

    /// State according to the service, bypassing the local session state
    pub async fn remote_state(&self) -> VmResult<VmState> {
        await_remote("get_state", self.vm.state()).await
    }

    /// Add an observer; it sees every notification delivered after this call
    pub fn register_callback(&self, callback: Arc<dyn VmCallback>) {
        match self.observers.write() {
            Ok(mut guard) => guard.push(callback),
            Err(poisoned) => poisoned.into_inner().push(callback),
        }
    }

    /// Remove every observer
    pub fn clear_callbacks(&self) {
        match self.observers.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Snapshot of the session state; may be stale as soon as it returns
    pub fn state(&self) -> VmState {
        self.state.current()
    }

    /// Watch the session state
    pub fn subscribe(&self) -> watch::Receiver<VmState> {
        self.state.subscribe()
    }

    /// Wait until the session state satisfies `predicate`
    pub async fn wait_for_state<P>(&self, predicate: P) -> VmResult<VmState>
    where
        P: FnMut(&VmState) -> bool,
    {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(predicate)
            .await
            .map(|state| *state)
            .map_err(|_| VmError::LifecycleInconsistency {
                details: format!("vm {}: state channel closed", self.cid),
            })?;
        Ok(state)
    }

    pub fn cid(&self) -> u32 {
        self.cid
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("session_id", &self.session_id)
            .field("cid", &self.cid)
            .field("state", &self.state.current())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if !self.state.current().is_terminal() {
            log::debug!("vm {}: controller dropped while live", self.cid);
            self.delivery.abort();
        }
    }
}
