//! Displayed panel state: observed service state, control lock, and the
//! enablement/labels of the three lifecycle controls.
//!
//! All mutation goes through [`Display::apply`]; every change is published on
//! a watch channel so presentation layers can repaint.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::state::{LifecycleAction, ServiceState};

/// Label shown on the control whose action is in flight.
pub const BUSY_LABEL: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlView {
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub start: ControlView,
    pub stop: ControlView,
    pub restart: ControlView,
}

impl Controls {
    fn settled(state: ServiceState) -> Self {
        let view = |action: LifecycleAction| ControlView {
            label: action.label().to_string(),
            enabled: action.enabled_in(state),
        };
        Self {
            start: view(LifecycleAction::Start),
            stop: view(LifecycleAction::Stop),
            restart: view(LifecycleAction::Restart),
        }
    }

    fn locked(busy: LifecycleAction) -> Self {
        let view = |action: LifecycleAction| ControlView {
            label: if action == busy {
                BUSY_LABEL.to_string()
            } else {
                action.label().to_string()
            },
            enabled: false,
        };
        Self {
            start: view(LifecycleAction::Start),
            stop: view(LifecycleAction::Stop),
            restart: view(LifecycleAction::Restart),
        }
    }

    pub fn get(&self, action: LifecycleAction) -> &ControlView {
        match action {
            LifecycleAction::Start => &self.start,
            LifecycleAction::Stop => &self.stop,
            LifecycleAction::Restart => &self.restart,
        }
    }
}

/// What a presentation layer paints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub state: ServiceState,
    /// Control lock: true while a convergence cycle is in flight.
    pub locked: bool,
    pub busy: Option<LifecycleAction>,
    pub controls: Controls,
    /// Set when the last action could not be delivered; cleared by the next cycle.
    pub last_error: Option<String>,
    /// Bumped each time a cycle takes the lock.
    pub cycle: u64,
}

impl PanelSnapshot {
    fn settled(state: ServiceState, last_error: Option<String>, cycle: u64) -> Self {
        Self {
            state,
            locked: false,
            busy: None,
            controls: Controls::settled(state),
            last_error,
            cycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// Oracle reading taken while `cycle` was current. Dropped while the lock
    /// is held or once another cycle has started since the query went out.
    Observed { state: ServiceState, cycle: u64 },
    /// Take the control lock for `action`. Refused if already held.
    Begin(LifecycleAction),
    /// Release the lock with the cycle's final reading.
    Finish {
        state: ServiceState,
        error: Option<String>,
    },
}

/// Shared handle to the displayed state. Cheap to clone.
#[derive(Clone)]
pub struct Display {
    tx: Arc<watch::Sender<PanelSnapshot>>,
}

impl Display {
    pub fn new(initial: ServiceState) -> Self {
        let (tx, _) = watch::channel(PanelSnapshot::settled(initial, None, 0));
        Self { tx: Arc::new(tx) }
    }

    /// Apply one update atomically. Returns whether the snapshot changed.
    ///
    /// For `Begin` a `false` return means the lock was already held.
    pub fn apply(&self, update: DisplayUpdate) -> bool {
        self.tx.send_if_modified(|snap| match update {
            DisplayUpdate::Observed { state, cycle } => {
                if snap.locked || snap.cycle != cycle || snap.state == state {
                    return false;
                }
                snap.state = state;
                snap.controls = Controls::settled(state);
                true
            }
            DisplayUpdate::Begin(action) => {
                if snap.locked {
                    return false;
                }
                snap.locked = true;
                snap.cycle += 1;
                snap.busy = Some(action);
                snap.controls = Controls::locked(action);
                snap.last_error = None;
                true
            }
            DisplayUpdate::Finish { state, error } => {
                let next = PanelSnapshot::settled(state, error, snap.cycle);
                if *snap == next {
                    return false;
                }
                *snap = next;
                true
            }
        })
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> ServiceState {
        self.tx.borrow().state
    }

    pub fn is_locked(&self) -> bool {
        self.tx.borrow().locked
    }

    /// Current cycle number; capture it before querying and hand it back in `Observed`.
    pub fn cycle(&self) -> u64 {
        self.tx.borrow().cycle
    }

    /// Receiver that wakes on every change.
    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.tx.subscribe()
    }
}
