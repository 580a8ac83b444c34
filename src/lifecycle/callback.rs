// ============================================================================
// File: packages/vmhost/src/lifecycle/callback.rs
// ----------------------------------------------------------------------------
// Observer trait and the per-session delivery flow.
//
// One task per session drains a single queue holding both remote events
// and state-change notifications, so observers run serialized, in order,
// and never on a task that is issuing lifecycle requests.
// ============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use super::state::{DeathReason, RemoteEvent, SessionState, VmState};

/// Observer of one VM session
///
/// Methods run on the session's delivery task. A slow observer delays
/// every later notification for the session.
pub trait VmCallback: Send + Sync {
    fn on_state_changed(&self, _from: VmState, _to: VmState) {}

    fn on_payload_started(&self) {}

    fn on_payload_ready(&self) {}

    fn on_payload_finished(&self, _exit_code: i32) {}

    fn on_error(&self, _code: i32, _message: &str) {}

    fn on_died(&self, _reason: DeathReason) {}
}

/// Registered observers of a session
pub(crate) type Observers = Arc<RwLock<Vec<Arc<dyn VmCallback>>>>;

/// Item on a session's delivery queue
#[derive(Debug)]
pub(crate) enum Delivery {
    /// Event from the VM service, not yet applied
    Remote(RemoteEvent),
    /// A state change that has already been applied
    StateChanged { from: VmState, to: VmState },
}

/// Drain the delivery queue until the session ends
///
/// Returns after the terminal state change has been delivered and the
/// queue is empty, or when every sender is gone.
pub(crate) async fn run_delivery(
    cid: u32,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    state: Arc<SessionState>,
    observers: Observers,
) {
    while let Some(item) = rx.recv().await {
        let terminal = deliver(cid, item, &state, &observers);
        if terminal {
            while let Ok(item) = rx.try_recv() {
                deliver(cid, item, &state, &observers);
            }
            break;
        }
    }
    log::debug!("vm {cid}: delivery flow finished");
}

fn deliver(cid: u32, item: Delivery, state: &SessionState, observers: &Observers) -> bool {
    match item {
        Delivery::StateChanged { from, to } => {
            log::info!("vm {cid}: {from} -> {to}");
            notify(observers, |observer| observer.on_state_changed(from, to));
            to.is_terminal()
        }
        Delivery::Remote(event) => {
            log::debug!("vm {cid}: remote event {event:?}");
            if let Err(current) = state.transition(|current| current.on_event(&event)) {
                if matches!(event, RemoteEvent::Booted | RemoteEvent::Died { .. }) {
                    log::warn!("vm {cid}: ignoring {event:?} in state {current}");
                }
            }
            dispatch_event(observers, &event);
            false
        }
    }
}

fn dispatch_event(observers: &Observers, event: &RemoteEvent) {
    match event {
        RemoteEvent::Booted => {}
        RemoteEvent::PayloadStarted => notify(observers, |o| o.on_payload_started()),
        RemoteEvent::PayloadReady => notify(observers, |o| o.on_payload_ready()),
        RemoteEvent::PayloadFinished { exit_code } => {
            notify(observers, |o| o.on_payload_finished(*exit_code))
        }
        RemoteEvent::Error { code, message } => notify(observers, |o| o.on_error(*code, message)),
        RemoteEvent::Died { reason } => notify(observers, |o| o.on_died(*reason)),
    }
}

fn notify<F>(observers: &Observers, f: F)
where
    F: Fn(&dyn VmCallback),
{
    let snapshot: Vec<Arc<dyn VmCallback>> = match observers.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };

    for observer in snapshot {
        if panic::catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
            log::error!("vm observer panicked; continuing delivery");
        }
    }
}
