// ============================================================================
// File: packages/vmhost/src/lifecycle/state.rs
// ----------------------------------------------------------------------------
// Session state machine and the shared state cell.
//
//   NOT_STARTED -> STARTING -> RUNNING <-> SUSPENDED
//   STARTING -> DEAD                        (start failure)
//   any non-terminal -> STOPPING -> STOPPED (explicit stop)
//   any non-terminal -> DEAD                (unexpected termination)
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use super::callback::Delivery;

/// Lifecycle state of a VM session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmState {
    NotStarted,
    Starting,
    Running,
    Suspended,
    Stopping,
    /// Terminated through an explicit stop
    Stopped,
    /// Terminated abnormally
    Dead,
}

impl VmState {
    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, VmState::Stopped | VmState::Dead)
    }

    /// State reached when `event` arrives in this state, if any
    pub fn on_event(self, event: &RemoteEvent) -> Option<VmState> {
        match (self, event) {
            (VmState::Starting, RemoteEvent::Booted) => Some(VmState::Running),
            (VmState::Stopping, RemoteEvent::Died { .. }) => Some(VmState::Stopped),
            (state, RemoteEvent::Died { .. }) if !state.is_terminal() => Some(VmState::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VmState::NotStarted => "NOT_STARTED",
            VmState::Starting => "STARTING",
            VmState::Running => "RUNNING",
            VmState::Suspended => "SUSPENDED",
            VmState::Stopping => "STOPPING",
            VmState::Stopped => "STOPPED",
            VmState::Dead => "DEAD",
        };
        f.write_str(name)
    }
}

/// Why the VM service says a VM terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathReason {
    /// Guest shut itself down
    Shutdown,
    /// Host killed the VM
    Killed,
    /// Guest kernel or payload crashed
    Crash,
    /// Guest reported an unrecoverable error
    Error,
    /// Guest requested a reboot, which is not supported
    Reboot,
    /// VM never finished booting
    StartFailed,
    /// VM service or hypervisor failed
    Infrastructure,
    Unknown,
}

/// Asynchronous notification emitted by the VM service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Guest finished booting
    Booted,
    PayloadStarted,
    PayloadReady,
    PayloadFinished { exit_code: i32 },
    Error { code: i32, message: String },
    Died { reason: DeathReason },
}

/// The session's single state cell
///
/// Every change is a compare-and-set under the watch lock, and the matching
/// state-change notification is queued under that same lock so observers
/// see changes in exactly the order they were applied.
#[derive(Debug)]
pub(crate) struct SessionState {
    tx: watch::Sender<VmState>,
    delivery: mpsc::UnboundedSender<Delivery>,
}

impl SessionState {
    pub(crate) fn new(delivery: mpsc::UnboundedSender<Delivery>) -> Self {
        let (tx, _rx) = watch::channel(VmState::NotStarted);
        Self { tx, delivery }
    }

    pub(crate) fn current(&self) -> VmState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<VmState> {
        self.tx.subscribe()
    }

    /// Apply `next` to the current state
    ///
    /// Returns `(from, to)` when the state changed, or the observed state
    /// when `next` declined to move it.
    pub(crate) fn transition<F>(&self, next: F) -> Result<(VmState, VmState), VmState>
    where
        F: FnOnce(VmState) -> Option<VmState>,
    {
        let mut observed = VmState::NotStarted;
        let mut changed = None;

        self.tx.send_if_modified(|state| {
            observed = *state;
            match next(*state) {
                Some(to) if to != *state => {
                    let from = *state;
                    *state = to;
                    let _ = self.delivery.send(Delivery::StateChanged { from, to });
                    changed = Some((from, to));
                    true
                }
                _ => false,
            }
        });

        changed.ok_or(observed)
    }

    /// Move `from` to `to`, failing if the state is no longer `from`
    pub(crate) fn compare_and_set(&self, from: VmState, to: VmState) -> Result<(), VmState> {
        self.transition(|state| (state == from).then_some(to))
            .map(|_| ())
    }
}
